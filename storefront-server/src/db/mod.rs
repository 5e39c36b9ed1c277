//! Database Module
//!
//! Owns the embedded SurrealDB instance and the schema definitions.

pub mod models;
pub mod repository;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, RocksDb};

use crate::utils::AppError;

/// Schema definitions applied at startup.
///
/// Tables are schemaless; uniqueness constraints (username, email,
/// national_id, barcode, line identity) are enforced by unique indexes.
const SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
DEFINE INDEX IF NOT EXISTS user_username ON TABLE user FIELDS username UNIQUE;

DEFINE TABLE IF NOT EXISTS customer SCHEMALESS;
DEFINE INDEX IF NOT EXISTS customer_email ON TABLE customer FIELDS email UNIQUE;
DEFINE INDEX IF NOT EXISTS customer_national_id ON TABLE customer FIELDS national_id UNIQUE;

DEFINE TABLE IF NOT EXISTS product SCHEMALESS;
DEFINE INDEX IF NOT EXISTS product_barcode ON TABLE product FIELDS barcode UNIQUE;

DEFINE TABLE IF NOT EXISTS order SCHEMALESS;

DEFINE TABLE IF NOT EXISTS order_line SCHEMALESS;
DEFINE INDEX IF NOT EXISTS order_line_identity ON TABLE order_line FIELDS order_id, product_id UNIQUE;
"#;

/// Database service — owns the embedded SurrealDB connection
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open (or create) the embedded database at `db_path` and apply the schema
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        let db: Surreal<Db> = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        db.use_ns("storefront")
            .use_db("main")
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;

        Self::define_schema(&db).await?;

        tracing::info!("Database connection established (embedded SurrealDB, RocksDB)");

        Ok(Self { db })
    }

    async fn define_schema(db: &Surreal<Db>) -> Result<(), AppError> {
        db.query(SCHEMA)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply schema: {e}")))?
            .check()
            .map_err(|e| AppError::database(format!("Failed to apply schema: {e}")))?;
        tracing::info!("Database schema applied");
        Ok(())
    }
}
