use crate::auth::AccessTokenErrorResponse;
use crate::db::StoreError;

/// Every way an authorization attempt or a token operation can end badly.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("state parameter is missing or does not match the stored value")]
    InvalidState,
    #[error("callback carried no authorization code")]
    MissingCode,
    #[error("no PKCE verifier is stored for this session")]
    MissingVerifier,
    #[error("provider denied the authorization request: {error}")]
    AccessDenied {
        error: String,
        description: Option<String>,
    },
    /// `status` is `None` when no HTTP response arrived; `transport` then
    /// holds the network error.
    #[error("token exchange failed (status {status:?}): {body}")]
    TokenExchangeFailed {
        status: Option<u16>,
        body: String,
        #[source]
        transport: Option<reqwest::Error>,
    },
    #[error("token refresh rejected with status {status}: {body}")]
    RefreshFailed { status: u16, body: String },
    #[error("no token record; authorization is required")]
    NotConnected,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("secure random source failed: {0}")]
    Entropy(#[from] rand::Error),
    #[error("could not encode authorization request: {0}")]
    Encoding(#[from] serde_urlencoded::ser::Error),
}

impl AuthError {
    /// Error body sent by the provider, when it is a standard OAuth error.
    pub fn provider_error(&self) -> Option<AccessTokenErrorResponse> {
        match self {
            Self::TokenExchangeFailed { body, .. } | Self::RefreshFailed { body, .. } => {
                serde_json::from_str(body).ok()
            }
            _ => None,
        }
    }

    /// Timeouts and connection failures; the caller may try again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e)
            | Self::TokenExchangeFailed {
                transport: Some(e), ..
            } => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Errors that mean "the credentials used were rejected by the provider".
pub trait InvalidGrant {
    fn is_invalid_grant(&self) -> bool;
}

impl InvalidGrant for AuthError {
    fn is_invalid_grant(&self) -> bool {
        let unauthorized = match self {
            Self::TokenExchangeFailed { status, .. } => *status == Some(401),
            Self::RefreshFailed { status, .. } => *status == 401,
            _ => return false,
        };
        unauthorized
            || self
                .provider_error()
                .map(|e| e.is_invalid_grant())
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_grant_is_read_from_provider_body() {
        let err = AuthError::RefreshFailed {
            status: 200,
            body: r#"{"error":"invalid_code"}"#.to_string(),
        };
        assert!(err.is_invalid_grant());
        assert_eq!(err.provider_error().unwrap().error, "invalid_code");

        let err = AuthError::RefreshFailed {
            status: 400,
            body: r#"{"error":"invalid_client"}"#.to_string(),
        };
        assert!(!err.is_invalid_grant());
    }

    #[test]
    fn non_json_body_is_kept_for_diagnostics() {
        let err = AuthError::TokenExchangeFailed {
            status: Some(502),
            body: "<html>bad gateway</html>".to_string(),
            transport: None,
        };
        assert!(err.provider_error().is_none());
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn rejected_exchange_is_not_retryable() {
        let err = AuthError::TokenExchangeFailed {
            status: Some(401),
            body: String::new(),
            transport: None,
        };
        assert!(err.is_invalid_grant());
        assert!(!err.is_retryable());
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        assert!(!AuthError::InvalidState.is_retryable());
        assert!(!AuthError::MissingVerifier.is_invalid_grant());
    }
}
