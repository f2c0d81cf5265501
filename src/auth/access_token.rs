use chrono::{DateTime, Duration, Utc};

use crate::core::types::{AccessToken, RefreshToken, Scope};

/// Form body posted to the provider token endpoint.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "grant_type")]
pub enum TokenRequest<'a> {
    #[serde(rename = "authorization_code")]
    AuthorizationCode {
        client_id: &'a str,
        client_secret: &'a str,
        redirect_uri: &'a str,
        code: &'a str,
        code_verifier: &'a str,
    },
    #[serde(rename = "refresh_token")]
    RefreshToken {
        client_id: &'a str,
        client_secret: &'a str,
        refresh_token: &'a str,
    },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub api_domain: Option<String>,
}

impl AccessTokenResponse {
    /// A negative lifetime, or one that runs past the end of the calendar,
    /// cannot be honoured and makes the grant unusable.
    pub fn has_valid_lifetime(&self, now: DateTime<Utc>) -> bool {
        match self.expires_in {
            None => true,
            Some(secs) => {
                secs >= 0
                    && Duration::try_seconds(secs)
                        .and_then(|lifetime| now.checked_add_signed(lifetime))
                        .is_some()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct AccessTokenErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl AccessTokenErrorResponse {
    /// `invalid_code` is what Zoho answers for revoked or unknown grants.
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self.error.as_str(), "invalid_grant" | "invalid_code")
    }
}

/// Some providers answer a rejected grant with `200 OK` and an error body,
/// so the body shape decides the outcome, not only the status.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum TokenEndpointResponse {
    Granted(AccessTokenResponse),
    Rejected(AccessTokenErrorResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_code_request_is_form_encoded_with_grant_type() {
        let body = serde_urlencoded::to_string(TokenRequest::AuthorizationCode {
            client_id: "cid",
            client_secret: "secret",
            redirect_uri: "https://hr.example.com/oauthredirect",
            code: "ABC",
            code_verifier: "V",
        })
        .unwrap();

        assert!(body.starts_with("grant_type=authorization_code&"));
        assert!(body.contains("code=ABC"));
        assert!(body.contains("code_verifier=V"));
        assert!(body.contains("redirect_uri=https%3A%2F%2Fhr.example.com%2Foauthredirect"));
    }

    #[test]
    fn refresh_request_is_form_encoded_with_grant_type() {
        let body = serde_urlencoded::to_string(TokenRequest::RefreshToken {
            client_id: "cid",
            client_secret: "secret",
            refresh_token: "R",
        })
        .unwrap();

        assert_eq!(
            body,
            "grant_type=refresh_token&client_id=cid&client_secret=secret&refresh_token=R"
        );
    }

    #[test]
    fn success_body_parses_as_granted() {
        let body = r#"{"access_token":"A","refresh_token":"R","expires_in":3600,
            "token_type":"Bearer","api_domain":"https://www.zohoapis.com"}"#;
        match serde_json::from_str::<TokenEndpointResponse>(body).unwrap() {
            TokenEndpointResponse::Granted(r) => {
                assert_eq!(r.access_token.secret(), "A");
                assert_eq!(r.refresh_token.unwrap().secret(), "R");
                assert_eq!(r.expires_in, Some(3600));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lifetime_must_fit_the_calendar() {
        let now = Utc::now();
        let parse = |expires_in: &str| -> AccessTokenResponse {
            serde_json::from_str(&format!(
                r#"{{"access_token":"A","expires_in":{}}}"#,
                expires_in
            ))
            .unwrap()
        };

        assert!(parse("3600").has_valid_lifetime(now));
        assert!(!parse("-1").has_valid_lifetime(now));
        assert!(!parse(&i64::MAX.to_string()).has_valid_lifetime(now));
        assert!(!parse("100000000000000").has_valid_lifetime(now));
    }

    #[test]
    fn error_body_parses_as_rejected() {
        let body = r#"{"error":"invalid_code"}"#;
        match serde_json::from_str::<TokenEndpointResponse>(body).unwrap() {
            TokenEndpointResponse::Rejected(e) => assert!(e.is_invalid_grant()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
