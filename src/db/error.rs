#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("query: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("migration: {0}")]
    Migration(String),
    #[error("malformed stored record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage task: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("store lock poisoned")]
    Poisoned,
}
