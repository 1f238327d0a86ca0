//! Actor commands - seeding, registration, credentials and balances

use anyhow::{bail, Context, Result};
use billbank_core::PinCode;
use billbank_engine::{
    seed_system_actors, CredentialService, LifecycleTrigger, MessageOutcome, NewActor,
    RegistrationService, TransferOutcome, TriggerReport,
};
use billbank_persistence::TransactionRepo;
use rust_decimal::Decimal;

use super::resolve;
use crate::db::Session;
use crate::RoleArg;

/// Create the seed ROOT and ADMIN actors
pub async fn init(session: &Session) -> Result<()> {
    let report = seed_system_actors(&session.ctx)
        .await
        .context("Failed to seed system actors")?;

    for provisioned in &report.created {
        println!(
            "Created {} {} <{}> (PIN {}, balance {})",
            provisioned.credential.role,
            provisioned.actor.name,
            provisioned.actor.email,
            provisioned.credential.pin_code,
            provisioned.account.balance.to_major(session.decimals())
        );
    }
    for email in &report.existing {
        println!("Already present: {}", email);
    }
    println!("Database ready.");
    Ok(())
}

pub async fn register(
    session: &Session,
    name: &str,
    email: &str,
    role: RoleArg,
    opening_balance: Decimal,
) -> Result<()> {
    let request = NewActor::user(name, email)
        .with_role(role.to_core())
        .with_opening_balance(session.ctx.config().to_minor(opening_balance)?);

    let provisioned = RegistrationService::new(&session.ctx, &session.notifier)
        .register(request)
        .await
        .with_context(|| format!("Failed to register {}", email))?;

    println!("Registered {} <{}>", provisioned.actor.name, provisioned.actor.email);
    println!("  Actor:   {}", provisioned.actor.id);
    println!("  Account: {}", provisioned.account.id);
    println!("  Role:    {}", provisioned.credential.role);
    println!("  PIN:     {}", provisioned.credential.pin_code);
    Ok(())
}

/// Re-run the lifecycle benefits for an existing account
pub async fn trigger(session: &Session, email: &str) -> Result<()> {
    let (_, account) = resolve(session, email).await?;
    let report = LifecycleTrigger::new(&session.ctx, &session.notifier)
        .on_account_created(&account)
        .await?;
    print_report(session, &report);
    Ok(())
}

fn print_report(session: &Session, report: &TriggerReport) {
    if report.excluded {
        println!("Excluded identity: no benefits granted.");
        return;
    }

    for benefit in &report.benefits {
        match &benefit.outcome {
            Ok(TransferOutcome::Confirmed(tx)) => println!(
                "  {:<10} granted {}",
                benefit.key,
                tx.amount.to_major(session.decimals())
            ),
            Ok(TransferOutcome::AlreadySatisfied) => {
                println!("  {:<10} already granted", benefit.key)
            }
            Ok(TransferOutcome::SourceUnavailable) => {
                println!("  {:<10} skipped, no funding actor", benefit.key)
            }
            Err(e) => println!("  {:<10} failed: {}", benefit.key, e),
        }
    }

    match &report.message {
        Some(Ok(MessageOutcome::Sent(id))) => println!("  welcome message sent ({})", id),
        Some(Ok(MessageOutcome::AlreadySent)) => println!("  welcome message already sent"),
        Some(Ok(MessageOutcome::SenderUnavailable)) => {
            println!("  welcome message skipped, no sender")
        }
        Some(Err(e)) => println!("  welcome message failed: {}", e),
        None => {}
    }
    println!(
        "{} granted, {} failed",
        report.confirmed(),
        report.failures()
    );
}

pub async fn login(session: &Session, email: &str, pin: i64) -> Result<()> {
    let pin = PinCode::new(pin)?;
    match CredentialService::new(&session.ctx)
        .authenticate(email, pin)
        .await?
    {
        Some(credential) => {
            println!("Logged in as {} ({})", email, credential.role);
            Ok(())
        }
        None => bail!("Wrong PIN for {}", email),
    }
}

pub async fn logout(session: &Session, email: &str) -> Result<()> {
    let (actor, _) = resolve(session, email).await?;
    CredentialService::new(&session.ctx)
        .record_logout(&actor.id)
        .await?;
    println!("Logged out {}", actor.email);
    Ok(())
}

pub async fn change_role(session: &Session, email: &str, role: RoleArg) -> Result<()> {
    let (actor, _) = resolve(session, email).await?;
    let credential = CredentialService::new(&session.ctx)
        .update_role(&actor.id, role.to_core())
        .await
        .with_context(|| format!("Failed to change role of {}", actor.email))?;
    println!("{} is now {}", actor.email, credential.role);
    Ok(())
}

pub async fn balance(session: &Session, email: &str, json: bool) -> Result<()> {
    let (actor, account) = resolve(session, email).await?;
    let transactions = TransactionRepo::list_by_account(session.ctx.pool(), &account.id).await?;

    if json {
        let out = serde_json::json!({
            "actor": actor,
            "account": account,
            "transactions": transactions,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let decimals = session.decimals();
    println!("{} <{}>", actor.name, actor.email);
    println!("Account: {}", account.id);
    println!("Balance: {}", account.balance.to_major(decimals));

    if transactions.is_empty() {
        return Ok(());
    }
    println!();
    println!("{:<36}  {:>12}  {:<10}  {:<10}  Title", "ID", "Amount", "Key", "Status");
    for tx in transactions {
        let signed = if tx.recipient_account_id == account.id {
            tx.amount.to_major(decimals)
        } else {
            -tx.amount.to_major(decimals)
        };
        println!(
            "{:<36}  {:>12}  {:<10}  {:<10}  {}",
            tx.id, signed, tx.authorization_key, tx.status, tx.title
        );
    }
    Ok(())
}
