//! TransferEngine - the create → confirm lifecycle
//!
//! ```text
//!   make_transfer(details, source, key)
//!     │
//!     ├─ ledger hit for (recipient, key)? ──────────► AlreadySatisfied
//!     ├─ resolve source (actor or role) ── none ────► SourceUnavailable
//!     ├─ create      → Pending row
//!     └─ confirm_transaction (one unit of work)
//!          claim row → re-check ledger → debit → credit → mark Confirmed
//! ```
//!
//! A crash between create and confirm leaves a Pending orphan;
//! `reconcile_stale` sweeps those.

use crate::accounts::AccountStore;
use crate::config::ReconcilePolicy;
use crate::error::{EngineError, EngineResult};
use crate::ledger::AuthorizationKeyLedger;
use crate::roles::RoleResolver;
use crate::services::ServiceContext;
use billbank_core::{
    Account, Amount, AuthorizationKey, CoreError, Locale, Role, Transaction, TransactionStatus,
};
use billbank_persistence::{AccountRepo, TransactionRepo};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// What to move, and where
#[derive(Debug, Clone)]
pub struct TransferDetails {
    pub recipient_account_id: String,
    pub amount: Amount,
    pub title: String,
    pub locale: Locale,
}

/// Who funds a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSource {
    /// The account owned by this actor
    Actor(String),
    /// The account of whoever currently holds this role
    Role(Role),
}

#[derive(Debug, Clone)]
pub enum TransferOutcome {
    Confirmed(Transaction),
    /// (recipient, key) was already confirmed; nothing moved
    AlreadySatisfied,
    /// No actor holds the source role; nothing moved
    SourceUnavailable,
}

impl TransferOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// Result of one reconciliation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub confirmed: usize,
    pub abandoned: usize,
    /// Rows left Pending because the sweep hit an error
    pub failed: usize,
}

pub struct TransferEngine<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TransferEngine<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Persist a Pending transaction. Moves no balance.
    pub async fn create(
        &self,
        source_account_id: &str,
        details: &TransferDetails,
        key: &AuthorizationKey,
    ) -> EngineResult<Transaction> {
        if !details.amount.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "transfer amount must be positive: {}",
                details.amount
            )));
        }

        let accounts = AccountStore::new(self.ctx);
        for account_id in [source_account_id, details.recipient_account_id.as_str()] {
            if !accounts.exists(account_id).await? {
                return Err(EngineError::UnknownAccount(account_id.to_string()));
            }
        }

        let transaction = Transaction::pending(
            source_account_id,
            &details.recipient_account_id,
            details.amount,
            &details.title,
            key.clone(),
            details.locale,
        )?;
        TransactionRepo::insert(self.ctx.pool(), &transaction).await?;

        debug!(
            transaction_id = %transaction.id,
            source = %source_account_id,
            recipient = %details.recipient_account_id,
            key = %key,
            amount = %details.amount,
            "transaction created"
        );
        Ok(transaction)
    }

    /// Confirm the most recent Pending transaction of `source` tagged `key`
    pub async fn confirm(
        &self,
        source_account_id: &str,
        key: &AuthorizationKey,
    ) -> EngineResult<Transaction> {
        let pending = TransactionRepo::find_latest_pending(self.ctx.pool(), source_account_id, key)
            .await?
            .ok_or_else(|| EngineError::NoPendingTransaction {
                account_id: source_account_id.to_string(),
                key: key.to_string(),
            })?;
        self.confirm_transaction(&pending.id).await
    }

    /// Confirm one transaction by id.
    ///
    /// Returns the row in its final state: Confirmed, or Abandoned if another
    /// row already holds the confirmed slot for (recipient, key). Calling it
    /// on a row that is already final returns that row unchanged.
    /// `InsufficientFunds` leaves the row Pending.
    pub async fn confirm_transaction(&self, transaction_id: &str) -> EngineResult<Transaction> {
        let retry = self.ctx.config().confirm_retry;
        let mut attempt = 1;

        loop {
            match self.try_confirm(transaction_id).await {
                Err(e) if e.is_busy() && attempt < retry.max_attempts => {
                    let delay = retry.delay(attempt);
                    warn!(
                        transaction_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "store busy during confirm, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_confirm(&self, transaction_id: &str) -> EngineResult<Transaction> {
        let now = Utc::now();
        let mut tx = self.ctx.db().begin().await?;

        // Write first: the claim takes the store's write lock, so competing
        // confirms serialise here instead of racing past the ledger check.
        if !TransactionRepo::claim_pending(&mut *tx, transaction_id, now).await? {
            tx.rollback().await?;
            return self.load(transaction_id).await;
        }

        let mut transaction = TransactionRepo::get_by_id(&mut *tx, transaction_id).await?;

        if let Some(existing) = TransactionRepo::find_confirmed(
            &mut *tx,
            &transaction.recipient_account_id,
            &transaction.authorization_key,
        )
        .await?
        {
            TransactionRepo::transition(
                &mut *tx,
                transaction_id,
                TransactionStatus::Pending,
                TransactionStatus::Abandoned,
                now,
            )
            .await?;
            tx.commit().await?;
            transaction.transition(TransactionStatus::Abandoned, now)?;

            warn!(
                transaction_id,
                confirmed_id = %existing.id,
                key = %transaction.authorization_key,
                "key already confirmed for recipient, transaction abandoned"
            );
            return Ok(transaction);
        }

        // Any error from here on drops `tx`, rolling back the claim too
        let source =
            AccountStore::debit(&mut *tx, &transaction.source_account_id, transaction.amount)
                .await?;
        let recipient =
            AccountStore::credit(&mut *tx, &transaction.recipient_account_id, transaction.amount)
                .await?;

        match TransactionRepo::transition(
            &mut *tx,
            transaction_id,
            TransactionStatus::Pending,
            TransactionStatus::Confirmed,
            now,
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                tx.rollback().await?;
                return self.load(transaction_id).await;
            }
            Err(e) if e.is_unique_violation() => {
                // Another engine confirmed the same (recipient, key) first
                tx.rollback().await?;
                return self.abandon(transaction_id).await;
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;
        transaction.transition(TransactionStatus::Confirmed, now)?;

        info!(
            transaction_id,
            key = %transaction.authorization_key,
            amount = %transaction.amount,
            source = %source.id,
            source_balance = %source.balance,
            recipient = %recipient.id,
            recipient_balance = %recipient.balance,
            "transfer confirmed"
        );
        Ok(transaction)
    }

    /// Create then confirm. The ledger is consulted first so a satisfied
    /// (recipient, key) does no work at all.
    pub async fn make_transfer(
        &self,
        details: TransferDetails,
        source: TransferSource,
        key: &AuthorizationKey,
    ) -> EngineResult<TransferOutcome> {
        let ledger = AuthorizationKeyLedger::new(self.ctx);
        if ledger.is_satisfied(&details.recipient_account_id, key).await? {
            debug!(recipient = %details.recipient_account_id, key = %key, "already satisfied, skipping");
            return Ok(TransferOutcome::AlreadySatisfied);
        }

        let source_account = match self.resolve_source(&source).await? {
            Some(account) => account,
            None => {
                debug!(source = ?source, key = %key, "no source actor, skipping");
                return Ok(TransferOutcome::SourceUnavailable);
            }
        };

        let transaction = self.create(&source_account.id, &details, key).await?;
        let transaction = self.confirm_transaction(&transaction.id).await?;

        match transaction.status {
            TransactionStatus::Confirmed => Ok(TransferOutcome::Confirmed(transaction)),
            _ => Ok(TransferOutcome::AlreadySatisfied),
        }
    }

    /// Pending → Abandoned. Abandoning an abandoned row is a no-op; a
    /// confirmed row cannot be abandoned.
    pub async fn abandon(&self, transaction_id: &str) -> EngineResult<Transaction> {
        let moved = TransactionRepo::transition(
            self.ctx.pool(),
            transaction_id,
            TransactionStatus::Pending,
            TransactionStatus::Abandoned,
            Utc::now(),
        )
        .await?;

        let transaction = self.load(transaction_id).await?;
        match transaction.status {
            TransactionStatus::Abandoned => {
                if moved {
                    info!(transaction_id, key = %transaction.authorization_key, "transaction abandoned");
                }
                Ok(transaction)
            }
            status => Err(CoreError::InvalidTransition {
                from: status,
                to: TransactionStatus::Abandoned,
            }
            .into()),
        }
    }

    /// Settle every Pending row created before `now - stale_after_secs`
    pub async fn reconcile_stale(&self, now: DateTime<Utc>) -> EngineResult<ReconcileReport> {
        let config = self.ctx.config().reconcile;
        let cutoff = now - Duration::seconds(config.stale_after_secs as i64);
        let stale =
            TransactionRepo::list_stale_pending(self.ctx.pool(), cutoff, config.batch_size as i64)
                .await?;

        let mut report = ReconcileReport {
            scanned: stale.len(),
            ..Default::default()
        };

        for transaction in stale {
            let result = match config.policy {
                ReconcilePolicy::Retry => match self.confirm_transaction(&transaction.id).await {
                    Err(e) if e.is_insufficient_funds() => {
                        debug!(transaction_id = %transaction.id, "source cannot cover stale row");
                        self.abandon(&transaction.id).await
                    }
                    other => other,
                },
                ReconcilePolicy::Abandon => self.abandon(&transaction.id).await,
            };

            match result {
                Ok(settled) if settled.is_confirmed() => report.confirmed += 1,
                Ok(_) => report.abandoned += 1,
                Err(e) => {
                    warn!(transaction_id = %transaction.id, error = %e, "could not reconcile stale transaction");
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                confirmed = report.confirmed,
                abandoned = report.abandoned,
                failed = report.failed,
                "reconciliation sweep finished"
            );
        }
        Ok(report)
    }

    async fn resolve_source(&self, source: &TransferSource) -> EngineResult<Option<Account>> {
        let owner_id = match source {
            TransferSource::Actor(actor_id) => actor_id.clone(),
            TransferSource::Role(role) => {
                match RoleResolver::new(self.ctx).find_by_single_role(*role).await? {
                    Some(credential) => credential.actor_id,
                    None => return Ok(None),
                }
            }
        };

        let account = AccountRepo::find_by_owner(self.ctx.pool(), &owner_id)
            .await?
            .ok_or_else(|| EngineError::UnknownAccount(format!("owner {}", owner_id)))?;
        Ok(Some(account))
    }

    async fn load(&self, transaction_id: &str) -> EngineResult<Transaction> {
        TransactionRepo::find_by_id(self.ctx.pool(), transaction_id)
            .await?
            .ok_or_else(|| EngineError::UnknownTransaction(transaction_id.to_string()))
    }
}
