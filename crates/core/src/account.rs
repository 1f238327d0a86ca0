//! # Account Module
//!
//! An `Account` (a "bill") holds one actor's balance. Accounts are 1:1 with
//! actors and are created together with them.

use crate::error::{CoreError, CoreResult};
use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub owner_id: String,
    /// Never negative
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open an account for `owner_id` with a non-negative opening balance
    pub fn open(owner_id: &str, opening_balance: Amount) -> CoreResult<Self> {
        if opening_balance.is_negative() {
            return Err(CoreError::InvalidAmount(format!(
                "opening balance cannot be negative: {}",
                opening_balance
            )));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            balance: opening_balance,
            created_at: Utc::now(),
        })
    }

    /// Whether a debit of `amount` would keep the balance non-negative
    pub fn can_cover(&self, amount: Amount) -> bool {
        self.balance
            .checked_sub(amount)
            .map_or(false, |rest| !rest.is_negative())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Account {} (owner: {}, balance: {})",
            self.id, self.owner_id, self.balance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_account() {
        let account = Account::open("actor-1", Amount::ZERO).unwrap();
        assert_eq!(account.owner_id, "actor-1");
        assert!(account.balance.is_zero());
    }

    #[test]
    fn test_open_rejects_negative_balance() {
        let err = Account::open("actor-1", Amount::from_minor(-1)).unwrap_err();
        assert!(err.is_invalid_amount());
    }

    #[test]
    fn test_can_cover() {
        let account = Account::open("actor-1", Amount::from_minor(100)).unwrap();
        assert!(account.can_cover(Amount::from_minor(100)));
        assert!(account.can_cover(Amount::from_minor(1)));
        assert!(!account.can_cover(Amount::from_minor(150)));
    }
}
