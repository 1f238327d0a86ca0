//! Engine layer errors

use billbank_core::{Amount, Role};
use thiserror::Error;

/// Errors surfaced by transfer, provisioning and credential operations
#[derive(Debug, Error)]
pub enum EngineError {
    // === Transfer errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Insufficient funds in {account_id}: required {required}, available {available}")]
    InsufficientFunds {
        account_id: String,
        required: Amount,
        available: Amount,
    },

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("No pending transaction for account {account_id} with key {key}")]
    NoPendingTransaction { account_id: String, key: String },

    // === Provisioning errors ===
    #[error("PIN allocation exhausted after {attempts} attempts")]
    PinAllocationExhausted { attempts: u32 },

    #[error("Unknown actor: {0}")]
    UnknownActor(String),

    #[error("Actor already exists: {0}")]
    ActorExists(String),

    #[error("Role conflict for {role}: {reason}")]
    RoleConflict { role: Role, reason: String },

    // === Configuration errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Wrapped errors ===
    #[error("Persistence error: {0}")]
    Persistence(#[from] billbank_persistence::PersistenceError),

    #[error("Core error: {0}")]
    Core(#[from] billbank_core::CoreError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Commit/rollback of a unit of work surface raw sqlx errors
impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.into())
    }
}

impl EngineError {
    pub fn insufficient_funds(account_id: &str, required: Amount, available: Amount) -> Self {
        Self::InsufficientFunds {
            account_id: account_id.to_string(),
            required,
            available,
        }
    }

    pub fn role_conflict(role: Role, reason: impl Into<String>) -> Self {
        Self::RoleConflict {
            role,
            reason: reason.into(),
        }
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::InsufficientFunds { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Persistence(e) if e.is_unique_violation())
    }

    /// Store locked by a concurrent writer; the whole unit may be retried
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Persistence(e) if e.is_busy())
    }
}
