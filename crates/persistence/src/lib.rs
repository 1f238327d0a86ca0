//! # Billbank Persistence
//!
//! SQLite store for actors, credentials, accounts, transactions and messages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Database                          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐  │
//! │  │  SqlitePool  │   │    Schema    │   │    Repos     │  │
//! │  │ (WAL, busy)  │   │ (constraints)│   │  (queries)   │  │
//! │  └──────────────┘   └──────────────┘   └──────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories are stateless and accept any `SqliteExecutor`, so the same
//! query runs against the pool or inside a unit of work:
//!
//! ```rust,ignore
//! use billbank_persistence::{AccountRepo, Database, TransactionRepo};
//!
//! let db = Database::open("billbank.db").await?;
//!
//! let mut tx = db.begin().await?;
//! if TransactionRepo::claim_pending(&mut *tx, &id, now).await? {
//!     AccountRepo::debit(&mut *tx, &source, amount).await?;
//!     AccountRepo::credit(&mut *tx, &recipient, amount).await?;
//! }
//! tx.commit().await?;
//! ```

pub mod error;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::{
    connect_options, create_pool, create_schema, init_database, AccountRepo, ActorRepo,
    CredentialRepo, MessageRepo, TransactionRepo,
};
pub use sqlite::schema::{
    AccountRow, ActorRow, CredentialRow, MessageRow, MessageTemplateRow, TransactionRow,
};

use sqlx::{Sqlite, SqlitePool};
use std::path::Path;

/// Open unit of work. Dropping it without `commit` rolls back.
pub type UnitOfWork = sqlx::Transaction<'static, Sqlite>;

const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Database facade - owns the pool and the schema lifecycle
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) a database file and apply the schema
    pub async fn open<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let url = format!("sqlite://{}", path.as_ref().display());
        Self::connect(&url).await
    }

    /// Connect with a full SQLite URL and apply the schema
    pub async fn connect(database_url: &str) -> PersistenceResult<Self> {
        let options = connect_options(database_url)?;
        let pool = create_pool(options, DEFAULT_MAX_CONNECTIONS).await?;
        create_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (schema must already exist)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a unit of work
    pub async fn begin(&self) -> PersistenceResult<UnitOfWork> {
        Ok(self.pool.begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
