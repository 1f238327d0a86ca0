//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables, plus the DDL that creates
//! them. Money is stored as INTEGER minor units.

use crate::error::{PersistenceError, PersistenceResult};
use billbank_core::{
    Account, Actor, ActorCredential, Amount, AuthorizationKey, Locale, PinCode, Role,
    Transaction, TransactionStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full schema. Every statement is idempotent.
///
/// The partial unique indexes are the durable form of the invariants the
/// engine pre-checks optimistically: one ROOT credential, and one confirmed
/// transaction per (recipient, authorization key).
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS actors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    id TEXT PRIMARY KEY,
    actor_id TEXT NOT NULL UNIQUE REFERENCES actors(id),
    role TEXT NOT NULL CHECK (role IN ('root', 'admin', 'user')),
    pin_code INTEGER NOT NULL UNIQUE CHECK (pin_code BETWEEN 1 AND 999999),
    last_successful_logged_date TEXT,
    last_failed_logged_date TEXT,
    last_present_logged_date TEXT,
    last_logout_date TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS ux_credentials_single_root
    ON credentials(role) WHERE role = 'root';

CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL UNIQUE REFERENCES actors(id),
    balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    source_account_id TEXT NOT NULL REFERENCES accounts(id),
    recipient_account_id TEXT NOT NULL REFERENCES accounts(id),
    amount INTEGER NOT NULL CHECK (amount > 0),
    title TEXT NOT NULL,
    authorization_key TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'confirmed', 'abandoned')),
    locale TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_transactions_source_key
    ON transactions(source_account_id, authorization_key, status);

CREATE INDEX IF NOT EXISTS ix_transactions_status_created
    ON transactions(status, created_at);

CREATE UNIQUE INDEX IF NOT EXISTS ux_transactions_confirmed_key
    ON transactions(recipient_account_id, authorization_key) WHERE status = 'confirmed';

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    sender_id TEXT NOT NULL REFERENCES actors(id),
    recipient_id TEXT NOT NULL REFERENCES actors(id),
    authorization_key TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (recipient_id, name)
);

CREATE TABLE IF NOT EXISTS message_templates (
    message_id TEXT NOT NULL REFERENCES messages(id),
    locale TEXT NOT NULL,
    subject TEXT NOT NULL,
    content TEXT NOT NULL,
    actions TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (message_id, locale)
);
"#;

/// Row type for `actors`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ActorRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for `credentials`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CredentialRow {
    pub id: String,
    pub actor_id: String,
    pub role: String,
    pub pin_code: i64,
    pub last_successful_logged_date: Option<DateTime<Utc>>,
    pub last_failed_logged_date: Option<DateTime<Utc>>,
    pub last_present_logged_date: Option<DateTime<Utc>>,
    pub last_logout_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row type for `accounts`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: String,
    pub owner_id: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

/// Row type for `transactions`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: String,
    pub source_account_id: String,
    pub recipient_account_id: String,
    pub amount: i64,
    pub title: String,
    pub authorization_key: String,
    pub status: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for `messages`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub name: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub authorization_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row type for `message_templates`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct MessageTemplateRow {
    pub message_id: String,
    pub locale: String,
    pub subject: String,
    pub content: String,
    /// JSON array of strings
    pub actions: String,
}

// === Conversion implementations ===

impl From<&Actor> for ActorRow {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id.clone(),
            name: actor.name.clone(),
            email: actor.email.clone(),
            created_at: actor.created_at,
        }
    }
}

impl From<ActorRow> for Actor {
    fn from(row: ActorRow) -> Self {
        Actor {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<CredentialRow> for ActorCredential {
    type Error = PersistenceError;

    fn try_from(row: CredentialRow) -> PersistenceResult<Self> {
        let role = Role::from_str(&row.role)
            .ok_or_else(|| PersistenceError::invalid_column("credentials.role", &row.role))?;
        let pin_code = PinCode::new(row.pin_code)
            .map_err(|_| PersistenceError::invalid_column("credentials.pin_code", row.pin_code))?;

        Ok(ActorCredential {
            id: row.id,
            actor_id: row.actor_id,
            role,
            pin_code,
            last_successful_logged_date: row.last_successful_logged_date,
            last_failed_logged_date: row.last_failed_logged_date,
            last_present_logged_date: row.last_present_logged_date,
            last_logout_date: row.last_logout_date,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = PersistenceError;

    fn try_from(row: AccountRow) -> PersistenceResult<Self> {
        if row.balance < 0 {
            return Err(PersistenceError::invalid_column("accounts.balance", row.balance));
        }
        Ok(Account {
            id: row.id,
            owner_id: row.owner_id,
            balance: Amount::from_minor(row.balance),
            created_at: row.created_at,
        })
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> PersistenceResult<Self> {
        let status = TransactionStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_column("transactions.status", &row.status))?;
        let locale = Locale::parse(&row.locale)
            .map_err(|_| PersistenceError::invalid_column("transactions.locale", &row.locale))?;
        let authorization_key = AuthorizationKey::new(&row.authorization_key).map_err(|_| {
            PersistenceError::invalid_column("transactions.authorization_key", &row.authorization_key)
        })?;

        Ok(Transaction {
            id: row.id,
            source_account_id: row.source_account_id,
            recipient_account_id: row.recipient_account_id,
            amount: Amount::from_minor(row.amount),
            title: row.title,
            authorization_key,
            status,
            locale,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential_row(role: &str, pin_code: i64) -> CredentialRow {
        CredentialRow {
            id: "cred-1".to_string(),
            actor_id: "actor-1".to_string(),
            role: role.to_string(),
            pin_code,
            last_successful_logged_date: None,
            last_failed_logged_date: None,
            last_present_logged_date: None,
            last_logout_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_credential_row_conversion() {
        let cred = ActorCredential::try_from(credential_row("admin", 1234)).unwrap();
        assert_eq!(cred.role, Role::Admin);
        assert_eq!(cred.pin_code.value(), 1234);
    }

    #[test]
    fn test_credential_row_rejects_bad_values() {
        let err = ActorCredential::try_from(credential_row("auditor", 1234)).unwrap_err();
        assert!(err.to_string().contains("credentials.role"));

        let err = ActorCredential::try_from(credential_row("user", 0)).unwrap_err();
        assert!(err.to_string().contains("credentials.pin_code"));
    }

    #[test]
    fn test_transaction_row_rejects_unknown_status() {
        let now = Utc::now();
        let row = TransactionRow {
            id: "tx-1".to_string(),
            source_account_id: "a".to_string(),
            recipient_account_id: "b".to_string(),
            amount: 10,
            title: "t".to_string(),
            authorization_key: "PROMO10".to_string(),
            status: "reversed".to_string(),
            locale: "en".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(Transaction::try_from(row).is_err());
    }
}
