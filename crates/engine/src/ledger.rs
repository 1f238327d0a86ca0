//! AuthorizationKeyLedger - the (recipient, key) index over transactions
//!
//! A hit here lets callers skip redundant work. It is not what guarantees
//! at-most-once: that is the confirm unit of work plus the partial unique
//! index on confirmed rows.

use crate::error::EngineResult;
use crate::services::ServiceContext;
use billbank_core::{AuthorizationKey, Transaction};
use billbank_persistence::TransactionRepo;

pub struct AuthorizationKeyLedger<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AuthorizationKeyLedger<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// The confirmed transaction for (recipient, key), if any
    pub async fn find_confirmed(
        &self,
        recipient_account_id: &str,
        key: &AuthorizationKey,
    ) -> EngineResult<Option<Transaction>> {
        Ok(TransactionRepo::find_confirmed(self.ctx.pool(), recipient_account_id, key).await?)
    }

    pub async fn is_satisfied(
        &self,
        recipient_account_id: &str,
        key: &AuthorizationKey,
    ) -> EngineResult<bool> {
        Ok(self.find_confirmed(recipient_account_id, key).await?.is_some())
    }
}
