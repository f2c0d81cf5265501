mod error;
mod memory;
mod sqlite;

pub mod models;
pub mod schema;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::{DbStore, MIGRATIONS};
