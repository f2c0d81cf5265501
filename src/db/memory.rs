use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::auth::{pkce, FlowStore, StoredFlow, TokenStore};
use crate::core::models::TokenRecord;
use crate::core::types::{CsrfState, Expiry, SessionKey};

use super::models::FlowEntryKind;
use super::StoreError;

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    flows: Mutex<HashMap<(SessionKey, FlowEntryKind), (String, Expiry)>>,
    tokens: RwLock<Option<TokenRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn put_entry(
        &self,
        session: &SessionKey,
        kind: FlowEntryKind,
        value: String,
        expiry: Expiry,
    ) -> Result<(), StoreError> {
        let mut flows = self.flows.lock().map_err(|_| StoreError::Poisoned)?;
        flows.insert((session.clone(), kind), (value, expiry));
        Ok(())
    }

    fn get_entry(
        &self,
        session: &SessionKey,
        kind: FlowEntryKind,
    ) -> Result<Option<String>, StoreError> {
        let flows = self.flows.lock().map_err(|_| StoreError::Poisoned)?;
        let now = Utc::now();
        Ok(flows
            .get(&(session.clone(), kind))
            .filter(|(_, expiry)| !expiry.has_passed(now))
            .map(|(value, _)| value.clone()))
    }
}

#[async_trait]
impl FlowStore for MemoryStore {
    async fn store_state(
        &self,
        session: &SessionKey,
        state: &CsrfState,
        expiry: Expiry,
    ) -> Result<(), StoreError> {
        self.put_entry(session, FlowEntryKind::State, state.0.clone(), expiry)
    }

    async fn get_stored_state(&self, session: &SessionKey) -> Result<Option<CsrfState>, StoreError> {
        Ok(self.get_entry(session, FlowEntryKind::State)?.map(CsrfState))
    }

    async fn store_code_verifier(
        &self,
        session: &SessionKey,
        verifier: &pkce::Verifier,
        expiry: Expiry,
    ) -> Result<(), StoreError> {
        self.put_entry(
            session,
            FlowEntryKind::CodeVerifier,
            verifier.secret().to_string(),
            expiry,
        )
    }

    async fn retrieve_code_verifier(
        &self,
        session: &SessionKey,
    ) -> Result<Option<pkce::Verifier>, StoreError> {
        Ok(self
            .get_entry(session, FlowEntryKind::CodeVerifier)?
            .map(pkce::Verifier::new))
    }

    async fn store_flow(
        &self,
        session: &SessionKey,
        state: &CsrfState,
        verifier: &pkce::Verifier,
        expiry: Expiry,
    ) -> Result<(), StoreError> {
        let mut flows = self.flows.lock().map_err(|_| StoreError::Poisoned)?;
        flows.insert(
            (session.clone(), FlowEntryKind::State),
            (state.0.clone(), expiry),
        );
        flows.insert(
            (session.clone(), FlowEntryKind::CodeVerifier),
            (verifier.secret().to_string(), expiry),
        );
        Ok(())
    }

    async fn retrieve_flow(&self, session: &SessionKey) -> Result<StoredFlow, StoreError> {
        let flows = self.flows.lock().map_err(|_| StoreError::Poisoned)?;
        let now = Utc::now();
        let live = |kind| {
            flows
                .get(&(session.clone(), kind))
                .filter(|(_, expiry)| !expiry.has_passed(now))
                .map(|(value, _)| value.clone())
        };
        Ok(StoredFlow {
            state: live(FlowEntryKind::State).map(CsrfState),
            verifier: live(FlowEntryKind::CodeVerifier).map(pkce::Verifier::new),
        })
    }

    async fn clear(&self, session: &SessionKey) -> Result<(), StoreError> {
        let mut flows = self.flows.lock().map_err(|_| StoreError::Poisoned)?;
        flows.retain(|(key, _), _| key != session);
        Ok(())
    }

    async fn clean_up(&self) -> Result<usize, StoreError> {
        let mut flows = self.flows.lock().map_err(|_| StoreError::Poisoned)?;
        let now = Utc::now();
        let before = flows.len();
        flows.retain(|_, (_, expiry)| !expiry.has_passed(now));
        Ok(before - flows.len())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn store_tokens(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().map_err(|_| StoreError::Poisoned)?;
        *tokens = Some(record.clone());
        Ok(())
    }

    async fn retrieve_tokens(&self) -> Result<Option<TokenRecord>, StoreError> {
        let tokens = self.tokens.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tokens.clone())
    }

    async fn delete_tokens(&self) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().map_err(|_| StoreError::Poisoned)?;
        *tokens = None;
        Ok(())
    }
}
