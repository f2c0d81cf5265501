use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{event, Level};

use crate::auth::{pkce, FlowStore, StoredFlow, TokenStore};
use crate::core::models::TokenRecord;
use crate::core::types::{CsrfState, Expiry, SessionKey};

use super::models::{FlowEntry, FlowEntryKind, StoredTokens, CURRENT_TOKENS_ID};
use super::schema;
use super::StoreError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug)]
struct Pragmas {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for Pragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL;",
            self.busy_timeout.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// SQLite-backed flow and token store.
#[derive(Clone)]
pub struct DbStore {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl DbStore {
    pub fn acquire(uri: &str) -> Result<Self, StoreError> {
        let pool = Pool::builder()
            .max_size(8)
            .connection_customizer(Box::new(Pragmas {
                busy_timeout: Duration::from_secs(5),
            }))
            .build(ConnectionManager::new(uri))?;
        Ok(Self { pool })
    }

    /// Applies pending embedded migrations, returning how many ran.
    pub fn migrate(&self) -> Result<usize, StoreError> {
        let mut conn = self.pool.get()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        event!(Level::INFO, count = applied.len(), "Ran migrations");
        Ok(applied.len())
    }

    async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }

    async fn put_entry(
        &self,
        session: &SessionKey,
        kind: FlowEntryKind,
        value: String,
        expiry: Expiry,
    ) -> Result<(), StoreError> {
        use schema::authorization_flows::dsl::authorization_flows;

        let entry = FlowEntry {
            session_key: session.0.clone(),
            kind: kind.as_str().to_string(),
            value,
            invalid_after: expiry.into(),
        };

        self.run(move |conn| {
            diesel::replace_into(authorization_flows)
                .values(&entry)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get_entry(
        &self,
        session: &SessionKey,
        kind: FlowEntryKind,
    ) -> Result<Option<String>, StoreError> {
        use schema::authorization_flows::dsl::{self, authorization_flows};

        let key = session.0.clone();
        let now = Utc::now().timestamp();

        self.run(move |conn| {
            let value = authorization_flows
                .find((key.as_str(), kind.as_str()))
                .filter(dsl::invalid_after.gt(now))
                .select(dsl::value)
                .first::<String>(conn)
                .optional()?;
            Ok(value)
        })
        .await
    }
}

impl Debug for DbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbStore").finish()
    }
}

#[async_trait]
impl FlowStore for DbStore {
    async fn store_state(
        &self,
        session: &SessionKey,
        state: &CsrfState,
        expiry: Expiry,
    ) -> Result<(), StoreError> {
        self.put_entry(session, FlowEntryKind::State, state.0.clone(), expiry)
            .await
    }

    async fn get_stored_state(&self, session: &SessionKey) -> Result<Option<CsrfState>, StoreError> {
        let value = self.get_entry(session, FlowEntryKind::State).await?;
        Ok(value.map(CsrfState))
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
        .await
    }

    async fn retrieve_code_verifier(
        &self,
        session: &SessionKey,
    ) -> Result<Option<pkce::Verifier>, StoreError> {
        let value = self.get_entry(session, FlowEntryKind::CodeVerifier).await?;
        Ok(value.map(pkce::Verifier::new))
    }

    async fn store_flow(
        &self,
        session: &SessionKey,
        state: &CsrfState,
        verifier: &pkce::Verifier,
        expiry: Expiry,
    ) -> Result<(), StoreError> {
        use schema::authorization_flows::dsl::authorization_flows;

        let entry = |kind: FlowEntryKind, value: String| FlowEntry {
            session_key: session.0.clone(),
            kind: kind.as_str().to_string(),
            value,
            invalid_after: expiry.into(),
        };
        let entries = vec![
            entry(FlowEntryKind::State, state.0.clone()),
            entry(FlowEntryKind::CodeVerifier, verifier.secret().to_string()),
        ];

        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                for entry in &entries {
                    diesel::replace_into(authorization_flows)
                        .values(entry)
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn retrieve_flow(&self, session: &SessionKey) -> Result<StoredFlow, StoreError> {
        use schema::authorization_flows::dsl::{self, authorization_flows};

        let key = session.0.clone();
        let now = Utc::now().timestamp();

        let rows = self
            .run(move |conn| {
                let rows = authorization_flows
                    .filter(dsl::session_key.eq(key))
                    .filter(dsl::invalid_after.gt(now))
                    .select((dsl::kind, dsl::value))
                    .load::<(String, String)>(conn)?;
                Ok(rows)
            })
            .await?;

        let mut flow = StoredFlow::default();
        for (kind, value) in rows {
            if kind == FlowEntryKind::State.as_str() {
                flow.state = Some(CsrfState(value));
            } else if kind == FlowEntryKind::CodeVerifier.as_str() {
                flow.verifier = Some(pkce::Verifier::new(value));
            }
        }
        Ok(flow)
    }

    async fn clear(&self, session: &SessionKey) -> Result<(), StoreError> {
        use schema::authorization_flows::dsl::{self, authorization_flows};

        let key = session.0.clone();
        self.run(move |conn| {
            diesel::delete(authorization_flows.filter(dsl::session_key.eq(key))).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn clean_up(&self) -> Result<usize, StoreError> {
        use schema::authorization_flows::dsl::{self, authorization_flows};

        let now = Utc::now().timestamp();
        self.run(move |conn| {
            let removed =
                diesel::delete(authorization_flows.filter(dsl::invalid_after.le(now)))
                    .execute(conn)?;
            Ok(removed)
        })
        .await
    }
}

#[async_trait]
impl TokenStore for DbStore {
    async fn store_tokens(&self, record: &TokenRecord) -> Result<(), StoreError> {
        use schema::oauth_tokens::dsl::oauth_tokens;

        let row = StoredTokens {
            id: CURRENT_TOKENS_ID,
            record: serde_json::to_string(record)?,
            updated_at: Utc::now().timestamp(),
        };

        self.run(move |conn| {
            diesel::replace_into(oauth_tokens).values(&row).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn retrieve_tokens(&self) -> Result<Option<TokenRecord>, StoreError> {
        use schema::oauth_tokens::dsl::{self, oauth_tokens};

        let raw = self
            .run(|conn| {
                let raw = oauth_tokens
                    .find(CURRENT_TOKENS_ID)
                    .select(dsl::record)
                    .first::<String>(conn)
                    .optional()?;
                Ok(raw)
            })
            .await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn delete_tokens(&self) -> Result<(), StoreError> {
        use schema::oauth_tokens::dsl::oauth_tokens;

        self.run(|conn| {
            diesel::delete(oauth_tokens).execute(conn)?;
            Ok(())
        })
        .await
    }
}
