//! # Error Module
//!
//! Domain errors for Billbank, built with thiserror.

use crate::transaction::TransactionStatus;
use thiserror::Error;

/// Core domain errors.
///
/// Validation failures only; nothing here is related to infrastructure.
#[derive(Debug, Error)]
pub enum CoreError {
    // === Money errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unsupported currency scale: {0} decimals")]
    UnsupportedScale(u32),

    // === Credential errors ===
    #[error("PIN code out of range: {0}")]
    InvalidPinCode(i64),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    // === Transaction errors ===
    #[error("Invalid authorization key: {0:?}")]
    InvalidAuthorizationKey(String),

    #[error("Invalid transaction transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Cannot transfer to the same account: {0}")]
    SameAccountTransfer(String),

    // === Validation errors ===
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether this error rejects a monetary amount
    pub fn is_invalid_amount(&self) -> bool {
        matches!(self, CoreError::InvalidAmount(_))
    }

    /// Whether this error is an illegal state change
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, CoreError::InvalidTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidTransition {
            from: TransactionStatus::Confirmed,
            to: TransactionStatus::Abandoned,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transaction transition: confirmed -> abandoned"
        );

        let err = CoreError::InvalidPinCode(1_000_000);
        assert_eq!(err.to_string(), "PIN code out of range: 1000000");
    }

    #[test]
    fn test_error_checks() {
        assert!(CoreError::InvalidAmount("0".to_string()).is_invalid_amount());
        assert!(!CoreError::InvalidRole("x".to_string()).is_invalid_amount());

        let err = CoreError::InvalidTransition {
            from: TransactionStatus::Abandoned,
            to: TransactionStatus::Confirmed,
        };
        assert!(err.is_invalid_transition());
    }
}
