//! Repository Module
//!
//! Provides CRUD operations for the SurrealDB tables.

pub mod customer;
pub mod order;
pub mod product;
pub mod user;

// Re-exports
pub use customer::CustomerRepository;
pub use order::OrderRepository;
pub use product::ProductRepository;
pub use user::UserRepository;

use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        let msg = err.to_string();
        // Unique index violations surface as "already contains"
        if msg.contains("already contains") {
            RepoError::Duplicate(msg)
        } else {
            RepoError::Database(msg)
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

// =============================================================================
// ID Convention: API 全程使用 "table:id" 字符串，纯 id 也接受
// =============================================================================

/// Strip the "table:" prefix from an id if present
pub fn strip_table_prefix<'a>(table: &str, id: &'a str) -> &'a str {
    id.strip_prefix(table)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(id)
}

/// Build a RecordId for `table` from either "table:id" or bare "id"
pub fn make_record_id(table: &str, id: &str) -> RecordId {
    RecordId::from_table_key(table, strip_table_prefix(table, id))
}

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_table_prefix() {
        assert_eq!(strip_table_prefix("product", "product:abc"), "abc");
        assert_eq!(strip_table_prefix("product", "abc"), "abc");
        // 不误剥其他表前缀
        assert_eq!(strip_table_prefix("product", "customer:abc"), "customer:abc");
    }
}
