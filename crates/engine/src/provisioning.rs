//! Provisioning - actor, credential and account created as one unit
//!
//! Registration provisions first and only then dispatches the lifecycle
//! trigger, so a benefit can never roll back an account.

use crate::config::SeedActor;
use crate::error::{EngineError, EngineResult};
use crate::notify::Notifier;
use crate::pin::PinCodeAllocator;
use crate::services::{ProvisionedActor, ServiceContext};
use crate::trigger::LifecycleTrigger;
use billbank_core::{actor::normalize_email, Account, Actor, ActorCredential, Amount, Role};
use billbank_persistence::{AccountRepo, ActorRepo, CredentialRepo};
use tracing::{error, info, warn};

/// Request to create an actor
#[derive(Debug, Clone)]
pub struct NewActor {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub opening_balance: Amount,
}

impl NewActor {
    pub fn user(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            role: Role::User,
            opening_balance: Amount::ZERO,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_opening_balance(mut self, balance: Amount) -> Self {
        self.opening_balance = balance;
        self
    }
}

pub struct ProvisioningService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ProvisioningService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn provision(&self, request: NewActor) -> EngineResult<ProvisionedActor> {
        if request.name.trim().is_empty() {
            return Err(billbank_core::CoreError::ValidationError("name is empty".into()).into());
        }
        let email = normalize_email(&request.email);
        if email.is_empty() {
            return Err(billbank_core::CoreError::ValidationError("e-mail is empty".into()).into());
        }
        if ActorRepo::find_by_email(self.ctx.pool(), &email).await?.is_some() {
            return Err(EngineError::ActorExists(email));
        }
        if request.role == Role::Root
            && CredentialRepo::count_by_role(self.ctx.pool(), Role::Root).await? > 0
        {
            return Err(EngineError::role_conflict(Role::Root, "root already provisioned"));
        }

        let max_attempts = self.ctx.config().pin.max_attempts;
        for attempt in 1..=max_attempts {
            let pin_code = PinCodeAllocator::new(self.ctx).allocate().await?;
            match self.insert(&request, &email, pin_code).await {
                Err(e) if is_violation_on(&e, "credentials.pin_code") => {
                    warn!(attempt, "PIN taken concurrently, re-allocating");
                }
                result => return result,
            }
        }

        Err(EngineError::PinAllocationExhausted {
            attempts: max_attempts,
        })
    }

    async fn insert(
        &self,
        request: &NewActor,
        email: &str,
        pin_code: billbank_core::PinCode,
    ) -> EngineResult<ProvisionedActor> {
        let actor = Actor::new(&request.name, email);
        let credential = ActorCredential::new(&actor.id, request.role, pin_code);
        let account = Account::open(&actor.id, request.opening_balance)?;

        let mut tx = self.ctx.db().begin().await?;
        ActorRepo::insert(&mut *tx, &actor)
            .await
            .map_err(|e| match e {
                e if e.is_unique_violation() => EngineError::ActorExists(actor.email.clone()),
                e => e.into(),
            })?;
        CredentialRepo::insert(&mut *tx, &credential)
            .await
            .map_err(|e| match e {
                e if e.is_unique_violation_on("credentials.role") => {
                    EngineError::role_conflict(Role::Root, "root already provisioned")
                }
                e => e.into(),
            })?;
        AccountRepo::insert(&mut *tx, &account).await?;
        tx.commit().await?;

        info!(
            actor_id = %actor.id,
            email = %actor.email,
            role = %credential.role,
            account_id = %account.id,
            "actor provisioned"
        );
        Ok(ProvisionedActor {
            actor,
            credential,
            account,
        })
    }
}

fn is_violation_on(err: &EngineError, column: &str) -> bool {
    matches!(err, EngineError::Persistence(e) if e.is_unique_violation_on(column))
}

/// Provision, then grant one-time benefits
pub struct RegistrationService<'a> {
    ctx: &'a ServiceContext,
    notifier: &'a dyn Notifier,
}

impl<'a> RegistrationService<'a> {
    pub fn new(ctx: &'a ServiceContext, notifier: &'a dyn Notifier) -> Self {
        Self { ctx, notifier }
    }

    /// Errors only if the actor could not be created. Benefit failures are
    /// logged by the trigger and never returned.
    pub async fn register(&self, request: NewActor) -> EngineResult<ProvisionedActor> {
        let provisioned = ProvisioningService::new(self.ctx).provision(request).await?;

        if let Err(e) = LifecycleTrigger::new(self.ctx, self.notifier)
            .on_account_created(&provisioned.account)
            .await
        {
            error!(account_id = %provisioned.account.id, error = %e, "lifecycle trigger failed");
        }
        Ok(provisioned)
    }
}

/// Seed actors created or found by `seed_system_actors`
#[derive(Debug, Default)]
pub struct SeedReport {
    pub created: Vec<ProvisionedActor>,
    /// E-mails that already existed
    pub existing: Vec<String>,
}

/// Create the ROOT and ADMIN seed actors from config. Idempotent by e-mail.
pub async fn seed_system_actors(ctx: &ServiceContext) -> EngineResult<SeedReport> {
    let seeds = ctx.config().seed.clone();
    let mut report = SeedReport::default();

    for (seed, role) in [(&seeds.root, Role::Root), (&seeds.admin, Role::Admin)] {
        if ActorRepo::find_by_email(ctx.pool(), &normalize_email(&seed.email))
            .await?
            .is_some()
        {
            info!(email = %seed.email, role = %role, "seed actor already present");
            report.existing.push(normalize_email(&seed.email));
            continue;
        }

        let provisioned = ProvisioningService::new(ctx)
            .provision(seed_request(ctx, seed, role)?)
            .await?;
        report.created.push(provisioned);
    }

    Ok(report)
}

fn seed_request(ctx: &ServiceContext, seed: &SeedActor, role: Role) -> EngineResult<NewActor> {
    Ok(NewActor {
        name: seed.name.clone(),
        email: seed.email.clone(),
        role,
        opening_balance: ctx.config().to_minor(seed.opening_balance)?,
    })
}
