use async_trait::async_trait;

use crate::core::models::TokenRecord;
use crate::core::types::{CsrfState, Expire, Expiry, SessionKey};
use crate::db::StoreError;

pub mod access_token;
pub mod authorization;
pub mod error;
pub mod pkce;

pub use access_token::*;
pub use authorization::*;
pub use error::{AuthError, InvalidGrant};

/// Default lifetime of a stored state and verifier.
pub struct PendingFlow;

impl Expire for PendingFlow {
    const EXPIRES_IN_SECS: i64 = 15 * 60;
}

/// Everything stored for one session's flow, read in a single operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredFlow {
    pub state: Option<CsrfState>,
    pub verifier: Option<pkce::Verifier>,
}

/// Session-scoped storage for the anti-CSRF state and the PKCE verifier of
/// the one authorization attempt in flight for that session.
///
/// Writes overwrite: starting a second attempt for a session invalidates the
/// first. Reads never return entries whose expiry has passed.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn store_state(
        &self,
        session: &SessionKey,
        state: &CsrfState,
        expiry: Expiry,
    ) -> Result<(), StoreError>;
    async fn get_stored_state(&self, session: &SessionKey) -> Result<Option<CsrfState>, StoreError>;
    async fn store_code_verifier(
        &self,
        session: &SessionKey,
        verifier: &pkce::Verifier,
        expiry: Expiry,
    ) -> Result<(), StoreError>;
    async fn retrieve_code_verifier(
        &self,
        session: &SessionKey,
    ) -> Result<Option<pkce::Verifier>, StoreError>;
    /// Writes the state and the verifier of one attempt together, so no
    /// reader ever pairs the state of one attempt with the verifier of another.
    async fn store_flow(
        &self,
        session: &SessionKey,
        state: &CsrfState,
        verifier: &pkce::Verifier,
        expiry: Expiry,
    ) -> Result<(), StoreError>;
    async fn retrieve_flow(&self, session: &SessionKey) -> Result<StoredFlow, StoreError>;
    /// Destroys both entries of the session.
    async fn clear(&self, session: &SessionKey) -> Result<(), StoreError>;
    /// Deletes expired entries of all sessions, returning how many went.
    async fn clean_up(&self) -> Result<usize, StoreError>;
}

/// Durable home of the single current [`TokenRecord`].
///
/// `store_tokens` replaces the record atomically; readers see either the old
/// or the new record, never a mix.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn store_tokens(&self, record: &TokenRecord) -> Result<(), StoreError>;
    async fn retrieve_tokens(&self) -> Result<Option<TokenRecord>, StoreError>;
    async fn delete_tokens(&self) -> Result<(), StoreError>;
}
