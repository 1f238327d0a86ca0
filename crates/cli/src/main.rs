//! Billbank CLI - provisioning, transfers and reconciliation
//!
//! Usage:
//! ```bash
//! billbank init
//! billbank register "Alice" alice@example.com
//! billbank transfer alice@example.com bob@example.com 12.50 --key RENT-01
//! billbank confirm <transaction-id>
//! billbank reconcile --policy abandon
//! billbank balance alice@example.com
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod db;

use commands::{actor, transfer};

/// Billbank - idempotent, role-funded transfers over SQLite
#[derive(Parser)]
#[command(name = "billbank")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, default_value = "data/billbank.db", global = true)]
    pub db: PathBuf,

    /// Engine config (JSON); built-in defaults when omitted
    #[arg(long, env = "BILLBANK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// E-mail of the ROOT seed actor
    #[arg(long, env = "BANK_ROOT_EMAIL", global = true)]
    pub root_email: Option<String>,

    /// E-mail of the ADMIN seed actor
    #[arg(long, env = "BANK_AUTHOR_EMAIL", global = true)]
    pub author_email: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the schema and the ROOT/ADMIN seed actors
    Init,

    /// Register an actor and grant its one-time benefits
    Register {
        name: String,
        email: String,
        #[arg(long, default_value = "user")]
        role: RoleArg,
        /// Opening balance in major units
        #[arg(long, default_value = "0")]
        opening_balance: Decimal,
    },

    /// Re-run the one-time benefits for an actor's account
    Trigger { email: String },

    /// Transfer between two actors' accounts
    Transfer {
        from: String,
        to: String,
        /// Amount in major units
        amount: Decimal,
        /// Authorization key of the logical operation
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "Transfer")]
        title: String,
        #[arg(long, default_value = "en")]
        locale: LocaleArg,
        /// Only create the Pending transaction
        #[arg(long)]
        no_confirm: bool,
    },

    /// Confirm a Pending transaction
    Confirm { transaction_id: String },

    /// Abandon a Pending transaction
    Abandon { transaction_id: String },

    /// Settle stale Pending transactions
    Reconcile {
        /// Override the configured staleness threshold
        #[arg(long)]
        older_than_secs: Option<u64>,
        #[arg(long)]
        policy: Option<PolicyArg>,
    },

    /// Authenticate with e-mail and PIN
    Login { email: String, pin: i64 },

    /// Record a logout
    Logout { email: String },

    /// Change an actor's role
    Role { email: String, role: RoleArg },

    /// Show an actor's balance and transactions
    Balance {
        email: String,
        #[arg(long)]
        json: bool,
    },

    /// Show database status
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Root,
    Admin,
    User,
}

impl RoleArg {
    pub fn to_core(self) -> billbank_core::Role {
        match self {
            RoleArg::Root => billbank_core::Role::Root,
            RoleArg::Admin => billbank_core::Role::Admin,
            RoleArg::User => billbank_core::Role::User,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LocaleArg {
    En,
    De,
    Pl,
}

impl LocaleArg {
    pub fn to_core(self) -> billbank_core::Locale {
        match self {
            LocaleArg::En => billbank_core::Locale::En,
            LocaleArg::De => billbank_core::Locale::De,
            LocaleArg::Pl => billbank_core::Locale::Pl,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Retry,
    Abandon,
}

impl PolicyArg {
    pub fn to_engine(self) -> billbank_engine::ReconcilePolicy {
        match self {
            PolicyArg::Retry => billbank_engine::ReconcilePolicy::Retry,
            PolicyArg::Abandon => billbank_engine::ReconcilePolicy::Abandon,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Some(parent) = cli.db.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    if let Commands::Status = cli.command {
        return db::show_status(&cli.db).await;
    }

    let session = db::open(&cli).await?;

    match cli.command {
        Commands::Init => actor::init(&session).await?,
        Commands::Register {
            name,
            email,
            role,
            opening_balance,
        } => actor::register(&session, &name, &email, role, opening_balance).await?,
        Commands::Trigger { email } => actor::trigger(&session, &email).await?,
        Commands::Transfer {
            from,
            to,
            amount,
            key,
            title,
            locale,
            no_confirm,
        } => {
            let request = transfer::TransferRequest {
                from,
                to,
                amount,
                key,
                title,
                locale: locale.to_core(),
                confirm: !no_confirm,
            };
            transfer::transfer(&session, request).await?
        }
        Commands::Confirm { transaction_id } => transfer::confirm(&session, &transaction_id).await?,
        Commands::Abandon { transaction_id } => transfer::abandon(&session, &transaction_id).await?,
        Commands::Reconcile {
            older_than_secs,
            policy,
        } => transfer::reconcile(&session, older_than_secs, policy).await?,
        Commands::Login { email, pin } => actor::login(&session, &email, pin).await?,
        Commands::Logout { email } => actor::logout(&session, &email).await?,
        Commands::Role { email, role } => actor::change_role(&session, &email, role).await?,
        Commands::Balance { email, json } => actor::balance(&session, &email, json).await?,
        Commands::Status => db::show_status(&cli.db).await?,
    }

    session.close().await;
    Ok(())
}
