use url::Url;

use crate::auth::pkce;
use crate::core::types::{AuthCode, ClientId, CsrfState, RedirectUri, ResponseType, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Asks the provider to issue a refresh token.
    Offline,
}

/// Query of the provider authorization endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthorizationRequest {
    pub client_id: ClientId,
    pub response_type: ResponseType,
    pub redirect_uri: RedirectUri,
    pub scope: Scope,
    pub state: CsrfState,
    pub code_challenge: String,
    pub code_challenge_method: pkce::Transformation,
    pub access_type: AccessType,
}

impl AuthorizationRequest {
    pub fn new(
        client_id: ClientId,
        redirect_uri: RedirectUri,
        scope: Scope,
        state: CsrfState,
        challenge: pkce::Challenge,
    ) -> Self {
        Self {
            client_id,
            response_type: ResponseType::Code,
            redirect_uri,
            scope,
            state,
            code_challenge: challenge.code,
            code_challenge_method: challenge.method,
            access_type: AccessType::Offline,
        }
    }

    pub fn to_url(&self, endpoint: &Url) -> Result<Url, serde_urlencoded::ser::Error> {
        append_params(endpoint.clone(), self)
    }
}

/// Query the provider sends back to the redirect URI.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CallbackQuery {
    pub code: Option<AuthCode>,
    pub state: Option<CsrfState>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub fn append_params(
    mut url: Url,
    params: impl serde::Serialize,
) -> Result<Url, serde_urlencoded::ser::Error> {
    let new_qs = serde_urlencoded::to_string(params)?;
    let pairs = form_urlencoded::parse(new_qs.as_bytes());
    url.query_pairs_mut().extend_pairs(pairs);
    Ok(url)
}
