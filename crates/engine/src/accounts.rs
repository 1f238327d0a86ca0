//! AccountStore - balance reads and the two balance mutations
//!
//! `credit` and `debit` only accept a connection, never the pool: they run
//! inside the unit of work that also moves the transaction state.

use crate::error::{EngineError, EngineResult};
use crate::services::ServiceContext;
use billbank_core::{Account, Amount};
use billbank_persistence::AccountRepo;
use sqlx::SqliteConnection;

pub struct AccountStore<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AccountStore<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Account owned by `owner_id`
    pub async fn get_account(&self, owner_id: &str) -> EngineResult<Account> {
        AccountRepo::find_by_owner(self.ctx.pool(), owner_id)
            .await?
            .ok_or_else(|| EngineError::UnknownAccount(format!("owner {}", owner_id)))
    }

    pub async fn get_by_id(&self, account_id: &str) -> EngineResult<Account> {
        AccountRepo::find_by_id(self.ctx.pool(), account_id)
            .await?
            .ok_or_else(|| EngineError::UnknownAccount(account_id.to_string()))
    }

    pub async fn exists(&self, account_id: &str) -> EngineResult<bool> {
        Ok(AccountRepo::find_by_id(self.ctx.pool(), account_id)
            .await?
            .is_some())
    }

    /// Add `amount` to the balance. A sum past i64 is `InvalidAmount`.
    pub(crate) async fn credit(
        conn: &mut SqliteConnection,
        account_id: &str,
        amount: Amount,
    ) -> EngineResult<Account> {
        let amount = positive(amount)?;
        if !AccountRepo::credit(&mut *conn, account_id, amount).await? {
            let account = AccountRepo::find_by_id(&mut *conn, account_id)
                .await?
                .ok_or_else(|| EngineError::UnknownAccount(account_id.to_string()))?;
            return Err(EngineError::InvalidAmount(format!(
                "credit of {} overflows balance {} of {}",
                amount, account.balance, account_id
            )));
        }
        Ok(AccountRepo::get_by_id(&mut *conn, account_id).await?)
    }

    /// Subtract `amount` only if the balance stays non-negative
    pub(crate) async fn debit(
        conn: &mut SqliteConnection,
        account_id: &str,
        amount: Amount,
    ) -> EngineResult<Account> {
        let amount = positive(amount)?;
        if !AccountRepo::debit(&mut *conn, account_id, amount).await? {
            let account = AccountRepo::find_by_id(&mut *conn, account_id)
                .await?
                .ok_or_else(|| EngineError::UnknownAccount(account_id.to_string()))?;
            return Err(EngineError::insufficient_funds(
                account_id,
                amount,
                account.balance,
            ));
        }
        Ok(AccountRepo::get_by_id(&mut *conn, account_id).await?)
    }
}

fn positive(amount: Amount) -> EngineResult<Amount> {
    if amount.is_positive() {
        Ok(amount)
    } else {
        Err(EngineError::InvalidAmount(format!(
            "amount must be positive: {}",
            amount
        )))
    }
}
