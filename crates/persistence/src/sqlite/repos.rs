//! Repository implementations for SQLite
//!
//! Every function runs exactly one statement against any
//! `SqliteExecutor`, so callers can pass the pool for standalone reads or
//! `&mut *tx` to run inside a unit of work.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use billbank_core::{
    Account, Actor, ActorCredential, Amount, AuthorizationKey, PinCode, Role, Transaction,
    TransactionStatus,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteExecutor, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Actor Repository
// ============================================================================

/// Repository for the `actors` table
pub struct ActorRepo;

impl ActorRepo {
    pub async fn insert(executor: impl SqliteExecutor<'_>, actor: &Actor) -> PersistenceResult<()> {
        sqlx::query("INSERT INTO actors (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(&actor.id)
            .bind(&actor.name)
            .bind(&actor.email)
            .bind(actor.created_at)
            .execute(executor)
            .await
            .map_err(|e| PersistenceError::from_insert(e, "actors.email"))?;
        Ok(())
    }

    pub async fn get_by_id(executor: impl SqliteExecutor<'_>, id: &str) -> PersistenceResult<Actor> {
        sqlx::query_as::<_, ActorRow>("SELECT * FROM actors WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .map(Actor::from)
            .ok_or_else(|| PersistenceError::not_found("Actor", id))
    }

    /// Lookup by (already normalised) e-mail
    pub async fn find_by_email(
        executor: impl SqliteExecutor<'_>,
        email: &str,
    ) -> PersistenceResult<Option<Actor>> {
        let row = sqlx::query_as::<_, ActorRow>("SELECT * FROM actors WHERE email = ?")
            .bind(email)
            .fetch_optional(executor)
            .await?;
        Ok(row.map(Actor::from))
    }

    pub async fn count(executor: impl SqliteExecutor<'_>) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM actors")
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Credential Repository
// ============================================================================

/// Repository for the `credentials` table
pub struct CredentialRepo;

impl CredentialRepo {
    /// Insert a credential. A duplicate PIN code or a second ROOT surfaces as
    /// `UniqueViolation`.
    pub async fn insert(
        executor: impl SqliteExecutor<'_>,
        credential: &ActorCredential,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (id, actor_id, role, pin_code, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.actor_id)
        .bind(credential.role.as_str())
        .bind(i64::from(credential.pin_code))
        .bind(credential.created_at)
        .execute(executor)
        .await
        .map_err(|e| PersistenceError::from_insert(e, "credentials"))?;
        Ok(())
    }

    pub async fn get_by_actor_id(
        executor: impl SqliteExecutor<'_>,
        actor_id: &str,
    ) -> PersistenceResult<ActorCredential> {
        sqlx::query_as::<_, CredentialRow>("SELECT * FROM credentials WHERE actor_id = ?")
            .bind(actor_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Credential", actor_id))?
            .try_into()
    }

    pub async fn find_by_pin(
        executor: impl SqliteExecutor<'_>,
        pin_code: PinCode,
    ) -> PersistenceResult<Option<ActorCredential>> {
        sqlx::query_as::<_, CredentialRow>("SELECT * FROM credentials WHERE pin_code = ?")
            .bind(i64::from(pin_code))
            .fetch_optional(executor)
            .await?
            .map(ActorCredential::try_from)
            .transpose()
    }

    pub async fn pin_exists(
        executor: impl SqliteExecutor<'_>,
        pin_code: PinCode,
    ) -> PersistenceResult<bool> {
        let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM credentials WHERE pin_code = ?)")
            .bind(i64::from(pin_code))
            .fetch_one(executor)
            .await?;
        Ok(row.0 != 0)
    }

    /// Earliest-created credential holding `role`
    pub async fn find_first_by_role(
        executor: impl SqliteExecutor<'_>,
        role: Role,
    ) -> PersistenceResult<Option<ActorCredential>> {
        sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM credentials WHERE role = ? ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(role.as_str())
        .fetch_optional(executor)
        .await?
        .map(ActorCredential::try_from)
        .transpose()
    }

    pub async fn count_by_role(executor: impl SqliteExecutor<'_>, role: Role) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM credentials WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }

    pub async fn update_role(
        executor: impl SqliteExecutor<'_>,
        actor_id: &str,
        role: Role,
    ) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE credentials SET role = ? WHERE actor_id = ?")
            .bind(role.as_str())
            .bind(actor_id)
            .execute(executor)
            .await
            .map_err(|e| PersistenceError::from_insert(e, "credentials.role"))?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Credential", actor_id));
        }
        Ok(())
    }

    /// Persist the login bookkeeping dates of `credential`
    pub async fn update_login_dates(
        executor: impl SqliteExecutor<'_>,
        credential: &ActorCredential,
    ) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE credentials SET
                last_successful_logged_date = ?,
                last_failed_logged_date = ?,
                last_present_logged_date = ?,
                last_logout_date = ?
            WHERE id = ?
            "#,
        )
        .bind(credential.last_successful_logged_date)
        .bind(credential.last_failed_logged_date)
        .bind(credential.last_present_logged_date)
        .bind(credential.last_logout_date)
        .bind(&credential.id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Credential", &credential.id));
        }
        Ok(())
    }
}

// ============================================================================
// Account Repository
// ============================================================================

/// Repository for the `accounts` table
pub struct AccountRepo;

impl AccountRepo {
    pub async fn insert(executor: impl SqliteExecutor<'_>, account: &Account) -> PersistenceResult<()> {
        sqlx::query("INSERT INTO accounts (id, owner_id, balance, created_at) VALUES (?, ?, ?, ?)")
            .bind(&account.id)
            .bind(&account.owner_id)
            .bind(account.balance.minor())
            .bind(account.created_at)
            .execute(executor)
            .await
            .map_err(|e| PersistenceError::from_insert(e, "accounts.owner_id"))?;
        Ok(())
    }

    pub async fn find_by_id(
        executor: impl SqliteExecutor<'_>,
        id: &str,
    ) -> PersistenceResult<Option<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    pub async fn get_by_id(executor: impl SqliteExecutor<'_>, id: &str) -> PersistenceResult<Account> {
        Self::find_by_id(executor, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Account", id))
    }

    pub async fn find_by_owner(
        executor: impl SqliteExecutor<'_>,
        owner_id: &str,
    ) -> PersistenceResult<Option<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_optional(executor)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    /// Add `amount` only if the balance stays within i64.
    /// Returns false if the account is missing or the sum would overflow.
    pub async fn credit(
        executor: impl SqliteExecutor<'_>,
        id: &str,
        amount: Amount,
    ) -> PersistenceResult<bool> {
        let result =
            sqlx::query("UPDATE accounts SET balance = balance + ? WHERE id = ? AND balance <= ?")
                .bind(amount.minor())
                .bind(id)
                .bind(i64::MAX.saturating_sub(amount.minor()))
                .execute(executor)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Subtract `amount` only if the balance stays non-negative.
    /// Returns false if the account is missing or cannot cover the amount.
    pub async fn debit(
        executor: impl SqliteExecutor<'_>,
        id: &str,
        amount: Amount,
    ) -> PersistenceResult<bool> {
        let result =
            sqlx::query("UPDATE accounts SET balance = balance - ? WHERE id = ? AND balance >= ?")
                .bind(amount.minor())
                .bind(id)
                .bind(amount.minor())
                .execute(executor)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn count(executor: impl SqliteExecutor<'_>) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

/// Repository for the `transactions` table
pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn insert(executor: impl SqliteExecutor<'_>, tx: &Transaction) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, source_account_id, recipient_account_id, amount, title,
                authorization_key, status, locale, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.source_account_id)
        .bind(&tx.recipient_account_id)
        .bind(tx.amount.minor())
        .bind(&tx.title)
        .bind(tx.authorization_key.as_str())
        .bind(tx.status.as_str())
        .bind(tx.locale.as_str())
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(executor)
        .await
        .map_err(|e| PersistenceError::from_insert(e, "transactions"))?;
        Ok(())
    }

    pub async fn find_by_id(
        executor: impl SqliteExecutor<'_>,
        id: &str,
    ) -> PersistenceResult<Option<Transaction>> {
        sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    pub async fn get_by_id(executor: impl SqliteExecutor<'_>, id: &str) -> PersistenceResult<Transaction> {
        Self::find_by_id(executor, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Transaction", id))
    }

    /// The confirmed transaction for (recipient, key), if any
    pub async fn find_confirmed(
        executor: impl SqliteExecutor<'_>,
        recipient_account_id: &str,
        key: &AuthorizationKey,
    ) -> PersistenceResult<Option<Transaction>> {
        sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE recipient_account_id = ? AND authorization_key = ? AND status = 'confirmed'
            "#,
        )
        .bind(recipient_account_id)
        .bind(key.as_str())
        .fetch_optional(executor)
        .await?
        .map(Transaction::try_from)
        .transpose()
    }

    /// Most recent Pending transaction for (source, key)
    pub async fn find_latest_pending(
        executor: impl SqliteExecutor<'_>,
        source_account_id: &str,
        key: &AuthorizationKey,
    ) -> PersistenceResult<Option<Transaction>> {
        sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE source_account_id = ? AND authorization_key = ? AND status = 'pending'
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(source_account_id)
        .bind(key.as_str())
        .fetch_optional(executor)
        .await?
        .map(Transaction::try_from)
        .transpose()
    }

    /// Touch a Pending row so the enclosing unit of work holds the write
    /// lock before reading anything. Returns false if the row is no longer
    /// Pending.
    pub async fn claim_pending(
        executor: impl SqliteExecutor<'_>,
        id: &str,
        now: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result =
            sqlx::query("UPDATE transactions SET updated_at = ? WHERE id = ? AND status = 'pending'")
                .bind(now)
                .bind(id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Compare-and-set the status. Returns false if the row was not in `from`.
    ///
    /// Moving a row to Confirmed while another row already holds the
    /// confirmed slot for the same (recipient, key) fails with
    /// `UniqueViolation`.
    pub async fn transition(
        executor: impl SqliteExecutor<'_>,
        id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        now: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result =
            sqlx::query("UPDATE transactions SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(to.as_str())
                .bind(now)
                .bind(id)
                .bind(from.as_str())
                .execute(executor)
                .await
                .map_err(|e| PersistenceError::from_insert(e, "transactions.confirmed_key"))?;
        Ok(result.rows_affected() == 1)
    }

    /// Pending rows created before `cutoff`, oldest first
    pub async fn list_stale_pending(
        executor: impl SqliteExecutor<'_>,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> PersistenceResult<Vec<Transaction>> {
        sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE status = 'pending' AND created_at < ?
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(executor)
        .await?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
    }

    /// All transactions touching an account, newest first
    pub async fn list_by_account(
        executor: impl SqliteExecutor<'_>,
        account_id: &str,
    ) -> PersistenceResult<Vec<Transaction>> {
        sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE source_account_id = ? OR recipient_account_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(account_id)
        .bind(account_id)
        .fetch_all(executor)
        .await?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
    }

    /// Count rows for (recipient, key) in `status`
    pub async fn count_for_recipient(
        executor: impl SqliteExecutor<'_>,
        recipient_account_id: &str,
        key: &AuthorizationKey,
        status: TransactionStatus,
    ) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE recipient_account_id = ? AND authorization_key = ? AND status = ?
            "#,
        )
        .bind(recipient_account_id)
        .bind(key.as_str())
        .bind(status.as_str())
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    pub async fn count_by_status(
        executor: impl SqliteExecutor<'_>,
        status: TransactionStatus,
    ) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Message Repository
// ============================================================================

/// Repository for `messages` and `message_templates`
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a message header. A second message with the same name for the
    /// same recipient surfaces as `UniqueViolation`.
    pub async fn insert(executor: impl SqliteExecutor<'_>, message: &MessageRow) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, name, sender_id, recipient_id, authorization_key, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.name)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(&message.authorization_key)
        .bind(message.created_at)
        .execute(executor)
        .await
        .map_err(|e| PersistenceError::from_insert(e, "messages.recipient_name"))?;
        Ok(())
    }

    pub async fn insert_template(
        executor: impl SqliteExecutor<'_>,
        template: &MessageTemplateRow,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO message_templates (message_id, locale, subject, content, actions)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.message_id)
        .bind(&template.locale)
        .bind(&template.subject)
        .bind(&template.content)
        .bind(&template.actions)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find_by_recipient_and_name(
        executor: impl SqliteExecutor<'_>,
        recipient_id: &str,
        name: &str,
    ) -> PersistenceResult<Option<MessageRow>> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE recipient_id = ? AND name = ?",
        )
        .bind(recipient_id)
        .bind(name)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn templates(
        executor: impl SqliteExecutor<'_>,
        message_id: &str,
    ) -> PersistenceResult<Vec<MessageTemplateRow>> {
        let rows = sqlx::query_as::<_, MessageTemplateRow>(
            "SELECT * FROM message_templates WHERE message_id = ? ORDER BY locale",
        )
        .bind(message_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Default time a statement waits on a locked database before failing.
/// Bounds how long the atomic confirm unit can block.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection options shared by every pool: WAL, foreign keys, busy timeout
pub fn connect_options(database_url: &str) -> PersistenceResult<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(DEFAULT_BUSY_TIMEOUT);
    Ok(options)
}

/// Create a connection pool
pub async fn create_pool(
    options: SqliteConnectOptions,
    max_connections: u32,
) -> PersistenceResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Open (creating if needed) a database and apply the schema
pub async fn init_database(database_url: &str) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(connect_options(database_url)?, 8).await?;
    create_schema(&pool).await?;
    Ok(pool)
}
