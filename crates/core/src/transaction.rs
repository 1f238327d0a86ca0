//! # Transaction Module
//!
//! A `Transaction` is one transfer attempt between two accounts, tagged with
//! the authorization key of the logical operation it belongs to.
//!
//! ```text
//!              confirm
//!   Pending ───────────► Confirmed   (balance moved exactly once)
//!      │
//!      └───────────────► Abandoned   (balance never moved)
//!              abandon
//! ```

use crate::error::{CoreError, CoreResult};
use crate::locale::Locale;
use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MAX_KEY_LEN: usize = 64;

/// Tag identifying a logical one-time operation (e.g. `WELCOME5`).
///
/// Distinct from the transaction id: many transactions may carry the same
/// key, at most one of them per recipient may be confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthorizationKey(String);

impl AuthorizationKey {
    /// Keys are 1-64 characters of `[A-Za-z0-9_-]`
    pub fn new(key: &str) -> CoreResult<Self> {
        let key = key.trim();
        let valid = !key.is_empty()
            && key.len() <= MAX_KEY_LEN
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if !valid {
            return Err(CoreError::InvalidAuthorizationKey(key.to_string()));
        }
        Ok(Self(key.to_string()))
    }

    /// Wrap a built-in key literal. Literals must already satisfy `new`.
    pub fn from_static(key: &'static str) -> Self {
        debug_assert!(Self::new(key).is_ok(), "invalid built-in key {}", key);
        Self(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AuthorizationKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<AuthorizationKey> for String {
    fn from(key: AuthorizationKey) -> Self {
        key.0
    }
}

impl fmt::Display for AuthorizationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Created, balance not moved yet
    Pending,
    /// Terminal, balance moved exactly once
    Confirmed,
    /// Terminal, balance never moved
    Abandoned,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Abandoned => "abandoned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "confirmed" => Some(TransactionStatus::Confirmed),
            "abandoned" => Some(TransactionStatus::Abandoned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Only Pending may move, and only to a terminal state
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Confirmed)
                | (TransactionStatus::Pending, TransactionStatus::Abandoned)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub source_account_id: String,
    pub recipient_account_id: String,
    pub amount: Amount,
    /// Display label
    pub title: String,
    pub authorization_key: AuthorizationKey,
    pub status: TransactionStatus,
    pub locale: Locale,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a new Pending transaction
    pub fn pending(
        source_account_id: &str,
        recipient_account_id: &str,
        amount: Amount,
        title: &str,
        authorization_key: AuthorizationKey,
        locale: Locale,
    ) -> CoreResult<Self> {
        amount.ensure_positive()?;

        if source_account_id == recipient_account_id {
            return Err(CoreError::SameAccountTransfer(source_account_id.to_string()));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            source_account_id: source_account_id.to_string(),
            recipient_account_id: recipient_account_id.to_string(),
            amount,
            title: title.trim().to_string(),
            authorization_key,
            status: TransactionStatus::Pending,
            locale,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move to `next`, enforcing the state machine
    pub fn transition(&mut self, next: TransactionStatus, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TransactionStatus::Confirmed
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} -> {} amount {} key {}",
            self.id,
            self.status,
            self.source_account_id,
            self.recipient_account_id,
            self.amount,
            self.authorization_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> AuthorizationKey {
        AuthorizationKey::new(s).unwrap()
    }

    #[test]
    fn test_authorization_key_validation() {
        assert_eq!(key(" PROMO10 ").as_str(), "PROMO10");
        assert!(AuthorizationKey::new("WELCOME-5_x").is_ok());
        assert!(AuthorizationKey::new("").is_err());
        assert!(AuthorizationKey::new("has space").is_err());
        assert!(AuthorizationKey::new(&"K".repeat(65)).is_err());
    }

    #[test]
    fn test_pending_transaction() {
        let tx = Transaction::pending(
            "acc-src",
            "acc-dst",
            Amount::from_minor(1000),
            "Create an account",
            key("PROMO10"),
            Locale::En,
        )
        .unwrap();

        assert!(tx.is_pending());
        assert_eq!(tx.created_at, tx.updated_at);
    }

    #[test]
    fn test_pending_rejects_non_positive_amount() {
        let err = Transaction::pending(
            "acc-src",
            "acc-dst",
            Amount::ZERO,
            "x",
            key("K"),
            Locale::En,
        )
        .unwrap_err();
        assert!(err.is_invalid_amount());
    }

    #[test]
    fn test_pending_rejects_self_transfer() {
        let err = Transaction::pending(
            "acc-1",
            "acc-1",
            Amount::from_minor(1),
            "x",
            key("K"),
            Locale::En,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::SameAccountTransfer(_)));
    }

    #[test]
    fn test_state_machine() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Abandoned));
        assert!(!Confirmed.can_transition_to(Abandoned));
        assert!(!Abandoned.can_transition_to(Confirmed));
        assert!(!Pending.can_transition_to(Pending));

        assert!(!Pending.is_terminal());
        assert!(Confirmed.is_terminal());
        assert!(Abandoned.is_terminal());
    }

    #[test]
    fn test_transition_is_final() {
        let mut tx = Transaction::pending(
            "a",
            "b",
            Amount::from_minor(5),
            "Thank you for registering! :)",
            key("WELCOME5"),
            Locale::En,
        )
        .unwrap();

        tx.transition(TransactionStatus::Confirmed, Utc::now()).unwrap();
        assert!(tx.is_confirmed());

        let err = tx
            .transition(TransactionStatus::Abandoned, Utc::now())
            .unwrap_err();
        assert!(err.is_invalid_transition());
        assert!(tx.is_confirmed());
    }
}
