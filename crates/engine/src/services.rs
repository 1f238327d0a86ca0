//! Service context shared by every engine component
//!
//! Components borrow a `ServiceContext` for the duration of one operation;
//! the context itself is cheap to clone and can be moved into spawned tasks.

use crate::config::EngineConfig;
use crate::pin::{PinGenerator, RandomPinGenerator};
use billbank_core::{Account, Actor, ActorCredential};
use billbank_persistence::Database;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Context for engine operations - database access plus configuration
#[derive(Clone)]
pub struct ServiceContext {
    db: Database,
    config: Arc<EngineConfig>,
    pin_generator: Arc<dyn PinGenerator>,
}

impl ServiceContext {
    /// Create a context; `config` must already be validated
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
            pin_generator: Arc::new(RandomPinGenerator),
        }
    }

    /// Replace the PIN source (deterministic sequences in tests)
    pub fn with_pin_generator(mut self, generator: Arc<dyn PinGenerator>) -> Self {
        self.pin_generator = generator;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get database pool
    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pin_generator(&self) -> &dyn PinGenerator {
        self.pin_generator.as_ref()
    }
}

/// An actor together with everything created alongside it
#[derive(Debug, Clone)]
pub struct ProvisionedActor {
    pub actor: Actor,
    pub credential: ActorCredential,
    pub account: Account,
}
