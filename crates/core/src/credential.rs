//! # Credential Module
//!
//! `ActorCredential` is the authentication record of an actor: its role,
//! its PIN code and the login bookkeeping timestamps.

use crate::actor::Role;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Short numeric login code, unique among credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PinCode(u32);

impl PinCode {
    /// Smallest allocatable code
    pub const MIN: u32 = 1;
    /// Largest allocatable code (6-digit space)
    pub const MAX: u32 = 999_999;

    pub fn new(value: i64) -> CoreResult<Self> {
        if value < Self::MIN as i64 || value > Self::MAX as i64 {
            return Err(CoreError::InvalidPinCode(value));
        }
        Ok(Self(value as u32))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for PinCode {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PinCode> for i64 {
    fn from(pin: PinCode) -> Self {
        pin.0 as i64
    }
}

impl fmt::Display for PinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// Authentication record, 1:1 with an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCredential {
    pub id: String,
    pub actor_id: String,
    pub role: Role,
    pub pin_code: PinCode,
    /// Shown to the user as "last login"; lags one session behind
    pub last_successful_logged_date: Option<DateTime<Utc>>,
    pub last_failed_logged_date: Option<DateTime<Utc>>,
    /// Start of the current session
    pub last_present_logged_date: Option<DateTime<Utc>>,
    pub last_logout_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ActorCredential {
    pub fn new(actor_id: &str, role: Role, pin_code: PinCode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_id: actor_id.to_string(),
            role,
            pin_code,
            last_successful_logged_date: None,
            last_failed_logged_date: None,
            last_present_logged_date: None,
            last_logout_date: None,
            created_at: Utc::now(),
        }
    }

    /// Apply one authentication attempt.
    ///
    /// A failure only stamps `last_failed_logged_date`. The first success
    /// stamps both successful and present dates with `now`; later successes
    /// move the previous present date into `last_successful_logged_date`.
    pub fn record_login(&mut self, successful: bool, now: DateTime<Utc>) {
        if !successful {
            self.last_failed_logged_date = Some(now);
            return;
        }

        self.last_successful_logged_date = match self.last_successful_logged_date {
            None => Some(now),
            Some(_) => Some(self.last_present_logged_date.unwrap_or(now)),
        };
        self.last_present_logged_date = Some(now);
    }

    pub fn record_logout(&mut self, now: DateTime<Utc>) {
        self.last_logout_date = Some(now);
    }
}
