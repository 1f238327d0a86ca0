//! Transfer commands - two-phase transfers and reconciliation

use anyhow::{Context, Result};
use billbank_core::{AuthorizationKey, Locale, Transaction};
use billbank_engine::{ServiceContext, TransferDetails, TransferEngine, TransferOutcome, TransferSource};
use chrono::Utc;
use rust_decimal::Decimal;

use super::resolve;
use crate::db::Session;
use crate::PolicyArg;

pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub key: String,
    pub title: String,
    pub locale: Locale,
    /// Confirm right away; otherwise leave the row Pending
    pub confirm: bool,
}

pub async fn transfer(session: &Session, request: TransferRequest) -> Result<()> {
    let (source, source_account) = resolve(session, &request.from).await?;
    let (_, recipient_account) = resolve(session, &request.to).await?;
    let key = AuthorizationKey::new(&request.key)?;

    let details = TransferDetails {
        recipient_account_id: recipient_account.id,
        amount: session.ctx.config().to_minor(request.amount)?,
        title: request.title,
        locale: request.locale,
    };
    let engine = TransferEngine::new(&session.ctx);

    if !request.confirm {
        let tx = engine
            .create(&source_account.id, &details, &key)
            .await
            .context("Failed to create transaction")?;
        println!("Created pending transaction {}", tx.id);
        return Ok(());
    }

    match engine
        .make_transfer(details, TransferSource::Actor(source.id), &key)
        .await
        .context("Transfer failed")?
    {
        TransferOutcome::Confirmed(tx) => print_transaction(session, &tx),
        TransferOutcome::AlreadySatisfied => {
            println!("Key {} already satisfied for {}; nothing moved.", key, request.to)
        }
        TransferOutcome::SourceUnavailable => println!("Source account unavailable."),
    }
    Ok(())
}

pub async fn confirm(session: &Session, transaction_id: &str) -> Result<()> {
    let tx = TransferEngine::new(&session.ctx)
        .confirm_transaction(transaction_id)
        .await
        .with_context(|| format!("Failed to confirm {}", transaction_id))?;
    print_transaction(session, &tx);
    Ok(())
}

pub async fn abandon(session: &Session, transaction_id: &str) -> Result<()> {
    let tx = TransferEngine::new(&session.ctx)
        .abandon(transaction_id)
        .await
        .with_context(|| format!("Failed to abandon {}", transaction_id))?;
    print_transaction(session, &tx);
    Ok(())
}

pub async fn reconcile(
    session: &Session,
    older_than_secs: Option<u64>,
    policy: Option<PolicyArg>,
) -> Result<()> {
    let mut config = session.ctx.config().clone();
    if let Some(secs) = older_than_secs {
        config.reconcile.stale_after_secs = secs;
    }
    if let Some(policy) = policy {
        config.reconcile.policy = policy.to_engine();
    }
    let ctx = ServiceContext::new(session.ctx.db().clone(), config);

    let report = TransferEngine::new(&ctx).reconcile_stale(Utc::now()).await?;
    println!("Reconciliation");
    println!("  scanned:   {}", report.scanned);
    println!("  confirmed: {}", report.confirmed);
    println!("  abandoned: {}", report.abandoned);
    println!("  failed:    {}", report.failed);
    Ok(())
}

fn print_transaction(session: &Session, tx: &Transaction) {
    println!("Transaction {}", tx.id);
    println!("  {} -> {}", tx.source_account_id, tx.recipient_account_id);
    println!("  Amount: {}", tx.amount.to_major(session.decimals()));
    println!("  Key:    {}", tx.authorization_key);
    println!("  Status: {}", tx.status);
}
