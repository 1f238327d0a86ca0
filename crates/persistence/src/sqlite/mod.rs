//! SQLite persistence module
//!
//! Repository pattern for SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    connect_options, create_pool, create_schema, init_database, AccountRepo, ActorRepo,
    CredentialRepo, MessageRepo, TransactionRepo, DEFAULT_BUSY_TIMEOUT,
};
pub use schema::{
    AccountRow, ActorRow, CredentialRow, MessageRow, MessageTemplateRow, TransactionRow, SCHEMA,
};
