use diesel::prelude::*;

use super::schema::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowEntryKind {
    State,
    CodeVerifier,
}

impl FlowEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::CodeVerifier => "code_verifier",
        }
    }
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = authorization_flows)]
pub struct FlowEntry {
    pub session_key: String,
    pub kind: String,
    pub value: String,
    pub invalid_after: i64,
}

/// Only row id ever written to `oauth_tokens`.
pub const CURRENT_TOKENS_ID: i32 = 1;

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = oauth_tokens)]
pub struct StoredTokens {
    pub id: i32,
    pub record: String,
    pub updated_at: i64,
}
