//! # Database Error Types
//!
//! Error types for storage operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)     ValidationError (buho-core)            │
//! │       │                               │                                 │
//! │       ▼                               ▼                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├──► single-record call: returned as Err                         │
//! │       └──► batch call: folded into BulkResult.errors                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use buho_core::{RecordErrorKind, ValidationError};
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found where one was required (pre-order promotion, mark for sync).
    ///
    /// Plain lookups return `Ok(None)` instead.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Primary key or UNIQUE index violation.
    ///
    /// ## When This Occurs
    /// - `create` with a key that already exists
    /// - The same key twice inside one `replace_all` batch
    #[error("Duplicate {field}: '{value}' already exists")]
    DuplicateKey { field: String, value: String },

    /// Foreign key constraint violation (order_items → orders).
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The record failed validation before reaching the engine.
    #[error("Invalid record: {0}")]
    Validation(#[from] ValidationError),

    /// `update` on a record without a usable key.
    #[error("{entity} has no {field}; cannot update by key")]
    NotReady { entity: String, field: String },

    /// Promotion created the regular order but could not delete the pre-order.
    ///
    /// Both records now exist; the caller decides whether to retry the delete.
    #[error("Pre-order {pre_order_id} promoted to order {order_id} but not removed: {message}")]
    PromotionPartial {
        pre_order_id: i64,
        order_id: i64,
        message: String,
    },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created or opened
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema creation or migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Stored or supplied JSON could not be decoded/encoded.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a DuplicateKey error.
    pub fn duplicate(field: impl Into<String>, value: impl ToString) -> Self {
        DbError::DuplicateKey {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn not_ready(entity: impl Into<String>, field: impl Into<String>) -> Self {
        DbError::NotReady {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DbError::DuplicateKey { .. })
    }

    /// Category used when this error is reported for one record of a batch.
    pub fn record_kind(&self) -> RecordErrorKind {
        match self {
            DbError::Validation(_) => RecordErrorKind::Validation,
            DbError::DuplicateKey { .. } => RecordErrorKind::DuplicateKey,
            DbError::InvalidJson(_) => RecordErrorKind::Malformed,
            _ => RecordErrorKind::Storage,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // PRIMARY KEY on rowid tables reports the same message
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::DuplicateKey {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::InvalidJson(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_mapping() {
        assert_eq!(
            DbError::duplicate("sku", "A1").record_kind(),
            RecordErrorKind::DuplicateKey
        );
        assert_eq!(
            DbError::from(ValidationError::required("sku")).record_kind(),
            RecordErrorKind::Validation
        );
        assert_eq!(
            DbError::QueryFailed("x".into()).record_kind(),
            RecordErrorKind::Storage
        );
    }

    #[test]
    fn test_promotion_partial_message_names_both_ids() {
        let err = DbError::PromotionPartial {
            pre_order_id: 10,
            order_id: 11,
            message: "locked".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("10") && text.contains("11"));
    }
}
