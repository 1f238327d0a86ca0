//! # Persistence Errors
//!
//! Error types for the persistence layer, wrapping sqlx and stored-data
//! conversion failures.

use thiserror::Error;

/// SQLite primary/extended result codes meaning "try again later"
const BUSY_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    // === Conversion errors ===
    #[error("Invalid stored value: {field} = {value}")]
    InvalidColumn { field: String, value: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // === Configuration errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_column(field: &str, value: impl ToString) -> Self {
        Self::InvalidColumn {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Turn a unique-index failure into `UniqueViolation`, pass anything else through
    pub fn from_insert(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::UniqueViolation(format!("{}: {}", what, db.message()))
            }
            _ => Self::Database(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::UniqueViolation(_) => true,
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Unique violation whose message names `column` (e.g. `credentials.pin_code`)
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        match self {
            Self::UniqueViolation(msg) => msg.contains(column),
            Self::Database(sqlx::Error::Database(db)) => {
                db.is_unique_violation() && db.message().contains(column)
            }
            _ => false,
        }
    }

    /// Whether the store was busy (locked by another writer) and the
    /// operation can be retried as a whole
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => {
                db.code()
                    .as_deref()
                    .map_or(false, |code| BUSY_CODES.contains(&code))
                    || db.message().contains("database is locked")
            }
            Self::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}
