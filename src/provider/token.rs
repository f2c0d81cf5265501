use std::future::Future;

use chrono::{Duration, Utc};
use tracing::{event, Level};

use crate::auth::{AuthError, InvalidGrant, TokenRequest};
use crate::core::models::TokenRecord;
use crate::core::types::{AccessToken, RefreshToken};

use super::{storage_failure, transport_failure, Grant, OAuth2Client};

/// A token this close to its expiry is refreshed before being handed out.
pub const EXPIRY_SKEW_SECS: i64 = 60;

impl OAuth2Client {
    /// Trades `refresh_token` for a new access token and makes the result
    /// the current record.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &RefreshToken) -> Result<AccessToken, AuthError> {
        let form = TokenRequest::RefreshToken {
            client_id: &self.config.client_id.0,
            client_secret: &self.config.client_secret.0,
            refresh_token: refresh_token.secret(),
        };

        match self
            .request_token(&form)
            .await
            .map_err(transport_failure("refresh_token grant"))?
        {
            Grant::Granted(response) => {
                let previous = self.retrieve_tokens().await;
                let record =
                    TokenRecord::refreshed(response, refresh_token, previous.as_ref(), Utc::now());
                self.tokens
                    .store_tokens(&record)
                    .await
                    .map_err(storage_failure("storing refreshed tokens"))?;

                event!(
                    Level::INFO,
                    rotated = previous
                        .and_then(|p| p.refresh_token)
                        .map(|old| Some(&old) != record.refresh_token.as_ref())
                        .unwrap_or(false),
                    "Access token refreshed"
                );
                Ok(record.access_token)
            }
            Grant::Rejected { status, body } => {
                event!(Level::WARN, status, %body, "Provider rejected refresh token");
                Err(AuthError::RefreshFailed { status, body })
            }
        }
    }

    /// Refreshes using the refresh token of the current record.
    pub async fn refresh_current(&self) -> Result<AccessToken, AuthError> {
        let record = self.retrieve_tokens().await.ok_or(AuthError::NotConnected)?;
        let refresh_token = record.refresh_token.ok_or(AuthError::NotConnected)?;
        self.refresh(&refresh_token).await
    }

    /// A usable access token, refreshed first when it is about to expire.
    pub async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let record = self.retrieve_tokens().await.ok_or(AuthError::NotConnected)?;

        if !record.is_expired(Utc::now(), Duration::seconds(EXPIRY_SKEW_SECS)) {
            return Ok(record.access_token);
        }

        event!(Level::DEBUG, "Access token expired, refreshing");
        match record.refresh_token {
            Some(refresh_token) => self.refresh(&refresh_token).await,
            None => Err(AuthError::NotConnected),
        }
    }

    /// Runs `op` with the current access token. When the provider rejects
    /// the token, refreshes once and runs `op` again; a second failure is
    /// returned as is.
    pub async fn with_token_refresh<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: InvalidGrant + From<AuthError>,
    {
        let token = self.access_token().await?;

        match op(token).await {
            Err(e) if e.is_invalid_grant() => {
                event!(Level::INFO, "Access token rejected, refreshing once");
                let token = self.refresh_current().await?;
                op(token).await
            }
            other => other,
        }
    }
}
