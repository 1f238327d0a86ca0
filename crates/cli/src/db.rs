//! Database and engine wiring for CLI commands

use anyhow::{Context, Result};
use billbank_core::{Role, TransactionStatus};
use billbank_engine::{EngineConfig, ServiceContext, StoreNotifier};
use billbank_persistence::{AccountRepo, ActorRepo, CredentialRepo, Database, TransactionRepo};
use std::path::Path;

use crate::Cli;

/// Everything a command needs: the engine context and the message sink
pub struct Session {
    pub ctx: ServiceContext,
    pub notifier: StoreNotifier,
}

impl Session {
    pub fn decimals(&self) -> u32 {
        self.ctx.config().currency_decimals
    }

    pub async fn close(&self) {
        self.ctx.db().close().await;
    }
}

/// Load the engine config, applying seed e-mail overrides from the command line
pub fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(email) = &cli.root_email {
        config.seed.root.email = email.clone();
    }
    if let Some(email) = &cli.author_email {
        config.seed.admin.email = email.clone();
    }

    config.validate().context("Invalid engine config")?;
    Ok(config)
}

/// Open (creating if missing) the database and build a session
pub async fn open(cli: &Cli) -> Result<Session> {
    let config = load_config(cli)?;
    let db = Database::open(&cli.db)
        .await
        .with_context(|| format!("Failed to open database {}", cli.db.display()))?;

    Ok(Session {
        notifier: StoreNotifier::new(db.clone()),
        ctx: ServiceContext::new(db, config),
    })
}

/// Show database status
pub async fn show_status(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        println!("Database not found: {}", db_path.display());
        println!("Run 'billbank init' to create it.");
        return Ok(());
    }

    let db = Database::open(db_path).await?;
    let pool = db.pool();

    let actors = ActorRepo::count(pool).await?;
    let roots = CredentialRepo::count_by_role(pool, Role::Root).await?;
    let admins = CredentialRepo::count_by_role(pool, Role::Admin).await?;
    let accounts = AccountRepo::count(pool).await?;
    let pending = TransactionRepo::count_by_status(pool, TransactionStatus::Pending).await?;
    let confirmed = TransactionRepo::count_by_status(pool, TransactionStatus::Confirmed).await?;
    let abandoned = TransactionRepo::count_by_status(pool, TransactionStatus::Abandoned).await?;

    println!("Database Status");
    println!("===============");
    println!("Path:         {}", db_path.display());
    println!("Actors:       {} (root: {}, admin: {})", actors, roots, admins);
    println!("Accounts:     {}", accounts);
    println!("Transactions:");
    println!("  pending:    {}", pending);
    println!("  confirmed:  {}", confirmed);
    println!("  abandoned:  {}", abandoned);

    db.close().await;
    Ok(())
}
