//! Engine configuration
//!
//! One-time benefits, the welcome message and the operational knobs are data
//! handed to the engine at construction, loaded from JSON and validated once
//! at startup.

use crate::error::{EngineError, EngineResult};
use billbank_core::{actor::normalize_email, Amount, AuthorizationKey, Locale, Role};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// A one-time credit granted to every newly created account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitDefinition {
    pub key: AuthorizationKey,
    /// Major units, e.g. `"10.00"`
    pub amount: Decimal,
    pub title: String,
    pub source_role: Role,
    #[serde(default)]
    pub locale: Locale,
}

impl BenefitDefinition {
    pub fn new(key: &str, amount: Decimal, title: &str, source_role: Role) -> EngineResult<Self> {
        Ok(Self {
            key: AuthorizationKey::new(key)?,
            amount,
            title: title.to_string(),
            source_role,
            locale: Locale::default(),
        })
    }

    pub fn amount_minor(&self, decimals: u32) -> EngineResult<Amount> {
        Ok(Amount::from_major(self.amount, decimals)?)
    }
}

/// Pre-rendered content for one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub locale: Locale,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// A notification sent once per new actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDefinition {
    pub name: String,
    pub sender_role: Role,
    #[serde(default)]
    pub authorization_key: Option<AuthorizationKey>,
    pub templates: Vec<MessageTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinConfig {
    pub max_attempts: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self { max_attempts: 1000 }
    }
}

/// Backoff around the atomic confirm unit when the store is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), doubling each time
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 20,
        }
    }
}

/// What the reconciliation sweep does with a stale Pending row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    /// Try to confirm; abandon if the source cannot cover it
    Retry,
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub stale_after_secs: u64,
    pub policy: ReconcilePolicy,
    pub batch_size: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 300,
            policy: ReconcilePolicy::Retry,
            batch_size: 500,
        }
    }
}

/// A system actor created by `init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedActor {
    pub name: String,
    pub email: String,
    /// Major units
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    pub root: SeedActor,
    pub admin: SeedActor,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            root: SeedActor {
                name: "Bank Root".to_string(),
                email: "root@billbank.local".to_string(),
                opening_balance: Decimal::new(100_000_000, 2),
            },
            admin: SeedActor {
                name: "Bank Author".to_string(),
                email: "author@billbank.local".to_string(),
                opening_balance: Decimal::new(10_000_000, 2),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub benefits: Vec<BenefitDefinition>,
    /// Identities that never receive benefits, in addition to the seeds
    pub excluded_emails: Vec<String>,
    pub welcome_message: Option<MessageDefinition>,
    pub currency_decimals: u32,
    pub pin: PinConfig,
    pub confirm_retry: RetryConfig,
    pub reconcile: ReconcileConfig,
    pub seed: SeedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            benefits: default_benefits(),
            excluded_emails: Vec::new(),
            welcome_message: Some(default_welcome_message()),
            currency_decimals: 2,
            pin: PinConfig::default(),
            confirm_retry: RetryConfig::default(),
            reconcile: ReconcileConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.currency_decimals > billbank_core::money::MAX_DECIMALS {
            return Err(invalid(format!(
                "currency_decimals {} exceeds {}",
                self.currency_decimals,
                billbank_core::money::MAX_DECIMALS
            )));
        }

        let mut keys = HashSet::new();
        for benefit in &self.benefits {
            if !keys.insert(benefit.key.as_str()) {
                return Err(invalid(format!("duplicate benefit key {}", benefit.key)));
            }
            if benefit.title.trim().is_empty() {
                return Err(invalid(format!("benefit {} has an empty title", benefit.key)));
            }
            if benefit.source_role == Role::User {
                return Err(invalid(format!(
                    "benefit {} must be funded by root or admin",
                    benefit.key
                )));
            }
            let amount = benefit
                .amount_minor(self.currency_decimals)
                .map_err(|e| invalid(format!("benefit {}: {}", benefit.key, e)))?;
            if !amount.is_positive() {
                return Err(invalid(format!("benefit {} amount must be positive", benefit.key)));
            }
        }

        if let Some(message) = &self.welcome_message {
            if message.name.trim().is_empty() {
                return Err(invalid("welcome message name is empty"));
            }
            for locale in Locale::ALL {
                let count = message.templates.iter().filter(|t| t.locale == locale).count();
                if count != 1 {
                    return Err(invalid(format!(
                        "welcome message needs exactly one {} template, found {}",
                        locale, count
                    )));
                }
            }
        }

        if self.pin.max_attempts == 0 {
            return Err(invalid("pin.max_attempts must be at least 1"));
        }
        if self.confirm_retry.max_attempts == 0 {
            return Err(invalid("confirm_retry.max_attempts must be at least 1"));
        }
        if self.reconcile.batch_size == 0 {
            return Err(invalid("reconcile.batch_size must be at least 1"));
        }

        for seed in [&self.seed.root, &self.seed.admin] {
            if seed.email.trim().is_empty() {
                return Err(invalid("seed e-mail is empty"));
            }
            Amount::from_major(seed.opening_balance, self.currency_decimals)
                .map_err(|e| invalid(format!("seed {}: {}", seed.email, e)))?;
        }

        Ok(())
    }

    /// Seed identities and configured exclusions never receive benefits
    pub fn is_excluded(&self, email: &str) -> bool {
        let email = normalize_email(email);
        normalize_email(&self.seed.root.email) == email
            || normalize_email(&self.seed.admin.email) == email
            || self
                .excluded_emails
                .iter()
                .any(|excluded| normalize_email(excluded) == email)
    }

    /// Convert a major-unit value at the configured scale
    pub fn to_minor(&self, value: Decimal) -> EngineResult<Amount> {
        Ok(Amount::from_major(value, self.currency_decimals)?)
    }
}

fn invalid(reason: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig(reason.into())
}

fn default_benefits() -> Vec<BenefitDefinition> {
    vec![
        BenefitDefinition {
            key: AuthorizationKey::from_static("PROMO10"),
            amount: Decimal::new(1000, 2),
            title: "Create an account".to_string(),
            source_role: Role::Root,
            locale: Locale::En,
        },
        BenefitDefinition {
            key: AuthorizationKey::from_static("WELCOME5"),
            amount: Decimal::new(500, 2),
            title: "Thank you for registering! :)".to_string(),
            source_role: Role::Admin,
            locale: Locale::En,
        },
    ]
}

fn default_welcome_message() -> MessageDefinition {
    let template = |locale, subject: &str, content: &str, actions: [&str; 2]| MessageTemplate {
        locale,
        subject: subject.to_string(),
        content: content.to_string(),
        actions: actions.iter().map(|a| a.to_string()).collect(),
    };

    MessageDefinition {
        name: "WELCOME_MESSAGE".to_string(),
        sender_role: Role::Admin,
        authorization_key: None,
        templates: vec![
            template(
                Locale::En,
                "Cooperation proposal",
                "Welcome to Billbank! We would love to hear your feedback.",
                ["I want to send you feedback now", "I'll do it in a moment"],
            ),
            template(
                Locale::De,
                "Kooperationsvorschlag",
                "Willkommen bei Billbank! Wir freuen uns auf Ihre Meinung.",
                [
                    "Ich möchte Ihnen jetzt eine Meinung senden",
                    "Ich werde meine Meinung gleich senden",
                ],
            ),
            template(
                Locale::Pl,
                "Propozycja współpracy",
                "Witamy w Billbank! Chętnie poznamy Twoją opinię.",
                ["Chcę przesłać opinię teraz", "Prześlę swoją opinię za chwilę"],
            ),
        ],
    }
}
