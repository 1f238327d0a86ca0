//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use billbank_core::{Account, Amount};
use billbank_engine::{
    seed_system_actors, EngineConfig, NewActor, PinGenerator, ProvisionedActor,
    ProvisioningService, ServiceContext, StoreNotifier,
};
use billbank_persistence::{AccountRepo, Database};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::Mutex;
use tempfile::TempDir;

pub struct TestBank {
    pub ctx: ServiceContext,
    pub notifier: StoreNotifier,
    // Keeps the database file alive
    _dir: TempDir,
}

impl TestBank {
    pub async fn balance(&self, account: &Account) -> Amount {
        AccountRepo::get_by_id(self.ctx.pool(), &account.id)
            .await
            .unwrap()
            .balance
    }

    pub fn major(&self, value: Decimal) -> Amount {
        self.ctx.config().to_minor(value).unwrap()
    }

    /// Provision an actor outside the registration flow (no benefits)
    pub async fn actor(&self, email: &str, balance: Decimal) -> ProvisionedActor {
        ProvisioningService::new(&self.ctx)
            .provision(NewActor::user("Test User", email).with_opening_balance(self.major(balance)))
            .await
            .unwrap()
    }
}

/// Empty bank with default config
pub async fn bank() -> TestBank {
    bank_with(EngineConfig::default()).await
}

pub async fn bank_with(config: EngineConfig) -> TestBank {
    config.validate().unwrap();
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("billbank.db")).await.unwrap();
    let notifier = StoreNotifier::new(db.clone());
    TestBank {
        ctx: ServiceContext::new(db, config),
        notifier,
        _dir: dir,
    }
}

/// Config whose ROOT and ADMIN seeds both open with 1000.00
pub fn scenario_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.seed.root.opening_balance = dec!(1000);
    config.seed.admin.opening_balance = dec!(1000);
    config
}

/// Bank with ROOT and ADMIN seeded; returns (bank, root, admin)
pub async fn seeded_bank() -> (TestBank, ProvisionedActor, ProvisionedActor) {
    seeded_bank_with(scenario_config()).await
}

pub async fn seeded_bank_with(
    config: EngineConfig,
) -> (TestBank, ProvisionedActor, ProvisionedActor) {
    let bank = bank_with(config).await;
    let mut report = seed_system_actors(&bank.ctx).await.unwrap();
    assert_eq!(report.created.len(), 2);
    let admin = report.created.pop().unwrap();
    let root = report.created.pop().unwrap();
    (bank, root, admin)
}

/// Hands out a fixed sequence of candidates, then repeats the last one
pub struct SequencePinGenerator {
    values: Mutex<VecDeque<i64>>,
    last: Mutex<i64>,
}

impl SequencePinGenerator {
    pub fn new(values: &[i64]) -> Self {
        Self {
            values: Mutex::new(values.iter().copied().collect()),
            last: Mutex::new(values.last().copied().unwrap_or(1)),
        }
    }
}

impl PinGenerator for SequencePinGenerator {
    fn generate(&self) -> i64 {
        match self.values.lock().unwrap().pop_front() {
            Some(value) => {
                *self.last.lock().unwrap() = value;
                value
            }
            None => *self.last.lock().unwrap(),
        }
    }
}
