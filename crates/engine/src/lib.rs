//! # Billbank Engine
//!
//! Idempotent, role-funded transfers and the provisioning around them.
//!
//! ```text
//!  RegistrationService ──► ProvisioningService ──► PinCodeAllocator
//!          │
//!          ▼
//!   LifecycleTrigger ──► TransferEngine ──► AccountStore
//!          │                  │  │
//!          ▼                  │  └──────► AuthorizationKeyLedger
//!       Notifier              ▼
//!                        RoleResolver
//! ```
//!
//! Components borrow a [`ServiceContext`] and are constructed per operation.

pub mod accounts;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod pin;
pub mod provisioning;
pub mod roles;
pub mod services;
pub mod transfer;
pub mod trigger;

pub use accounts::AccountStore;
pub use config::{
    BenefitDefinition, EngineConfig, MessageDefinition, MessageTemplate, ReconcilePolicy,
};
pub use credentials::CredentialService;
pub use error::{EngineError, EngineResult};
pub use ledger::AuthorizationKeyLedger;
pub use notify::{Notification, Notifier, StoreNotifier};
pub use pin::{PinCodeAllocator, PinGenerator, RandomPinGenerator};
pub use provisioning::{seed_system_actors, NewActor, ProvisioningService, RegistrationService, SeedReport};
pub use roles::RoleResolver;
pub use services::{ProvisionedActor, ServiceContext};
pub use transfer::{ReconcileReport, TransferDetails, TransferEngine, TransferOutcome, TransferSource};
pub use trigger::{BenefitResult, LifecycleTrigger, MessageOutcome, TriggerReport};
