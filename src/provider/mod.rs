//! Client side of the authorization-code flow with PKCE.
//!
//! A flow for one browser session moves through [`FlowPhase`]:
//! `initiate` stores a fresh state and verifier and hands back the provider
//! URL; `handle_callback` checks the returned state, exchanges the code with
//! the stored verifier and persists the resulting [`TokenRecord`]. The stored
//! state and verifier are destroyed whichever way the callback ends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{event, Level};
use url::Url;

use crate::auth::{
    pkce, AccessTokenResponse, AuthError, AuthorizationRequest, CallbackQuery, FlowStore,
    PendingFlow, StoredFlow, TokenEndpointResponse, TokenRequest, TokenStore,
};
use crate::core::models::{stamp_after, ConnectionStatus, FlowPhase, TokenRecord};
use crate::core::types::{
    AuthCode, ClientId, ClientSecret, CsrfState, Expire, Expiry, RedirectUri, Scope, SessionId,
    SessionKey,
};
use crate::db::StoreError;
use crate::util::{hash::SessionHasher, random::FromRandom};

mod token;

pub use token::EXPIRY_SKEW_SECS;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub redirect_uri: RedirectUri,
    pub scope: Scope,
    pub authorize_url: Url,
    pub token_url: Url,
    pub flow_ttl: chrono::Duration,
    pub http_timeout: Duration,
}

impl ProviderConfig {
    /// Zoho-style layout: `<accounts>/oauth/v2/auth` and `<accounts>/oauth/v2/token`.
    pub fn from_accounts_url(
        accounts_url: &str,
        client_id: ClientId,
        client_secret: ClientSecret,
        redirect_uri: RedirectUri,
        scope: Scope,
    ) -> Result<Self, url::ParseError> {
        let base = Url::parse(accounts_url)?;
        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            scope,
            authorize_url: base.join("/oauth/v2/auth")?,
            token_url: base.join("/oauth/v2/token")?,
            flow_ttl: chrono::Duration::seconds(PendingFlow::EXPIRES_IN_SECS),
            http_timeout: Duration::from_secs(30),
        })
    }
}

/// Outcome of one call to the token endpoint that reached the provider.
enum Grant {
    Granted(AccessTokenResponse),
    Rejected { status: u16, body: String },
}

pub struct OAuth2Client {
    config: ProviderConfig,
    http: reqwest::Client,
    hasher: SessionHasher,
    flows: Arc<dyn FlowStore>,
    tokens: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for OAuth2Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Client")
            .field("client_id", &self.config.client_id)
            .field("token_url", &self.config.token_url.as_str())
            .finish()
    }
}

fn storage_failure(context: &'static str) -> impl FnOnce(StoreError) -> AuthError {
    move |e| {
        event!(Level::ERROR, error = %e, context, "Storage write failed");
        AuthError::StorageUnavailable(e)
    }
}

fn transport_failure(context: &'static str) -> impl FnOnce(reqwest::Error) -> AuthError {
    move |e| {
        event!(
            Level::ERROR,
            error = %e,
            timeout = e.is_timeout(),
            context,
            "Request to provider failed"
        );
        AuthError::Transport(e)
    }
}

impl OAuth2Client {
    pub fn new(
        config: ProviderConfig,
        flows: Arc<dyn FlowStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            hasher: SessionHasher::with_secret_key(String::new()),
            flows,
            tokens,
        })
    }

    pub fn with_session_secret(mut self, secret: String) -> Self {
        self.hasher = SessionHasher::with_secret_key(secret);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn session_key(&self, session: &SessionId) -> SessionKey {
        self.hasher.key(session)
    }

    /// Starts a flow for `session` and returns the provider URL to redirect to.
    ///
    /// Any flow already in flight for the session is replaced.
    #[tracing::instrument(skip_all)]
    pub async fn initiate(&self, session: &SessionId) -> Result<Url, AuthError> {
        let key = self.session_key(session);

        match self.flows.clean_up().await {
            Ok(0) => {}
            Ok(removed) => event!(Level::DEBUG, removed, "Purged expired flows"),
            Err(e) => event!(Level::WARN, error = %e, "Could not purge expired flows"),
        }

        let (verifier, challenge) = pkce::generate()?;
        let state = CsrfState::from_random();
        let expiry = Expiry::after(Utc::now(), self.config.flow_ttl);

        self.flows
            .store_flow(&key, &state, &verifier, expiry)
            .await
            .map_err(storage_failure("storing flow"))?;

        let url = AuthorizationRequest::new(
            self.config.client_id.clone(),
            self.config.redirect_uri.clone(),
            self.config.scope.clone(),
            state,
            challenge,
        )
        .to_url(&self.config.authorize_url)?;

        event!(
            Level::INFO,
            phase = %FlowPhase::AwaitingProviderRedirect,
            "Authorization request issued"
        );
        Ok(url)
    }

    /// Completes the flow of `session` from the provider redirect.
    #[tracing::instrument(skip_all)]
    pub async fn handle_callback(
        &self,
        session: &SessionId,
        query: CallbackQuery,
    ) -> Result<TokenRecord, AuthError> {
        let key = self.session_key(session);
        let result = self.complete_flow(&key, query).await;

        if let Err(e) = self.flows.clear(&key).await {
            event!(Level::WARN, error = %e, "Could not destroy flow state");
        }

        match &result {
            Ok(_) => event!(Level::INFO, phase = %FlowPhase::Authenticated, "Mailbox connected"),
            Err(e) => event!(
                Level::WARN,
                phase = %FlowPhase::Failed,
                error = %e,
                retryable = e.is_retryable(),
                "Authorization callback failed"
            ),
        }
        result
    }

    async fn complete_flow(
        &self,
        key: &SessionKey,
        query: CallbackQuery,
    ) -> Result<TokenRecord, AuthError> {
        let stored = self.flows.retrieve_flow(key).await.unwrap_or_else(|e| {
            event!(Level::ERROR, error = %e, "Could not read stored flow");
            StoredFlow::default()
        });

        match (stored.state, query.state) {
            (Some(stored), Some(received)) if !received.0.is_empty() && stored == received => {}
            _ => return Err(AuthError::InvalidState),
        }

        if let Some(error) = query.error {
            return Err(AuthError::AccessDenied {
                error,
                description: query.error_description,
            });
        }

        let code = query
            .code
            .filter(|c| !c.0.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let verifier = stored.verifier.ok_or(AuthError::MissingVerifier)?;

        event!(Level::DEBUG, phase = %FlowPhase::TokenExchangeInFlight, "Exchanging code");
        let response = self.exchange_code(&code, &verifier).await?;

        let previous = self.retrieve_tokens().await.map(|p| p.created_at);
        let record = TokenRecord::from_response(response, stamp_after(previous, Utc::now()));
        if let Some(granted) = &record.scope {
            if !granted.contains_all(&self.config.scope) {
                event!(Level::WARN, %granted, "Provider granted fewer scopes than requested");
            }
        }
        self.tokens
            .store_tokens(&record)
            .await
            .map_err(storage_failure("storing tokens"))?;
        Ok(record)
    }

    async fn exchange_code(
        &self,
        code: &AuthCode,
        verifier: &pkce::Verifier,
    ) -> Result<AccessTokenResponse, AuthError> {
        let form = TokenRequest::AuthorizationCode {
            client_id: &self.config.client_id.0,
            client_secret: &self.config.client_secret.0,
            redirect_uri: &self.config.redirect_uri.0,
            code: &code.0,
            code_verifier: verifier.secret(),
        };

        let grant = self.request_token(&form).await.map_err(|e| {
            event!(
                Level::ERROR,
                error = %e,
                timeout = e.is_timeout(),
                "Code exchange did not reach the provider"
            );
            AuthError::TokenExchangeFailed {
                status: None,
                body: e.to_string(),
                transport: Some(e),
            }
        })?;

        match grant {
            Grant::Granted(response) => Ok(response),
            Grant::Rejected { status, body } => {
                event!(Level::WARN, status, %body, "Provider rejected authorization code");
                Err(AuthError::TokenExchangeFailed {
                    status: Some(status),
                    body,
                    transport: None,
                })
            }
        }
    }

    async fn request_token(&self, form: &TokenRequest<'_>) -> Result<Grant, reqwest::Error> {
        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            if let Ok(TokenEndpointResponse::Granted(granted)) = serde_json::from_str(&body) {
                if granted.has_valid_lifetime(Utc::now()) {
                    return Ok(Grant::Granted(granted));
                }
                event!(Level::WARN, expires_in = ?granted.expires_in, "Unusable token lifetime");
            }
        }

        Ok(Grant::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// The current record; unreadable storage counts as "not connected".
    pub async fn retrieve_tokens(&self) -> Option<TokenRecord> {
        self.tokens.retrieve_tokens().await.unwrap_or_else(|e| {
            event!(Level::ERROR, error = %e, "Could not read token record");
            None
        })
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        self.retrieve_tokens()
            .await
            .as_ref()
            .map(ConnectionStatus::from)
            .unwrap_or_else(ConnectionStatus::disconnected)
    }

    pub async fn phase(&self, session: &SessionId) -> FlowPhase {
        let key = self.session_key(session);
        let pending = matches!(self.flows.get_stored_state(&key).await, Ok(Some(_)));

        if pending {
            FlowPhase::AwaitingCallback
        } else if self.retrieve_tokens().await.is_some() {
            FlowPhase::Authenticated
        } else {
            FlowPhase::Idle
        }
    }

    pub async fn disconnect(&self) -> Result<(), AuthError> {
        self.tokens
            .delete_tokens()
            .await
            .map_err(storage_failure("deleting tokens"))?;
        event!(Level::INFO, "Token record deleted");
        Ok(())
    }

    /// Deletes expired flows of every session.
    pub async fn purge_flows(&self) -> Result<usize, AuthError> {
        self.flows
            .clean_up()
            .await
            .map_err(storage_failure("purging flows"))
    }
}
