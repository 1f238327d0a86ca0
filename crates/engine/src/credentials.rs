//! Credential service - login bookkeeping and role changes

use crate::error::{EngineError, EngineResult};
use crate::services::ServiceContext;
use billbank_core::{actor::normalize_email, ActorCredential, PinCode, Role};
use billbank_persistence::{ActorRepo, CredentialRepo};
use chrono::Utc;
use tracing::{info, warn};

pub struct CredentialService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> CredentialService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn find_by_pin(&self, pin_code: PinCode) -> EngineResult<Option<ActorCredential>> {
        Ok(CredentialRepo::find_by_pin(self.ctx.pool(), pin_code).await?)
    }

    pub async fn get(&self, actor_id: &str) -> EngineResult<ActorCredential> {
        CredentialRepo::get_by_actor_id(self.ctx.pool(), actor_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    EngineError::UnknownActor(actor_id.to_string())
                } else {
                    e.into()
                }
            })
    }

    /// Check `pin_code` against the actor's credential and record the
    /// attempt. Returns the updated credential on success, `None` on a
    /// wrong PIN.
    pub async fn authenticate(
        &self,
        email: &str,
        pin_code: PinCode,
    ) -> EngineResult<Option<ActorCredential>> {
        let email = normalize_email(email);
        let actor = ActorRepo::find_by_email(self.ctx.pool(), &email)
            .await?
            .ok_or_else(|| EngineError::UnknownActor(email.clone()))?;

        let successful = self.get(&actor.id).await?.pin_code == pin_code;
        let credential = self.record_login(&actor.id, successful).await?;
        Ok(successful.then_some(credential))
    }

    /// Stamp one login attempt
    pub async fn record_login(
        &self,
        actor_id: &str,
        successful: bool,
    ) -> EngineResult<ActorCredential> {
        let mut credential = self.get(actor_id).await?;
        credential.record_login(successful, Utc::now());
        CredentialRepo::update_login_dates(self.ctx.pool(), &credential).await?;

        if successful {
            info!(actor_id, "login");
        } else {
            warn!(actor_id, "failed login");
        }
        Ok(credential)
    }

    pub async fn record_logout(&self, actor_id: &str) -> EngineResult<ActorCredential> {
        let mut credential = self.get(actor_id).await?;
        credential.record_logout(Utc::now());
        CredentialRepo::update_login_dates(self.ctx.pool(), &credential).await?;

        info!(actor_id, "logout");
        Ok(credential)
    }

    /// Administrative role change. There is always exactly one ROOT: it can
    /// be neither demoted nor duplicated.
    pub async fn update_role(&self, actor_id: &str, role: Role) -> EngineResult<ActorCredential> {
        let mut credential = self.get(actor_id).await?;
        if credential.role == role {
            return Ok(credential);
        }
        if credential.role == Role::Root {
            return Err(EngineError::role_conflict(Role::Root, "the root cannot be demoted"));
        }

        CredentialRepo::update_role(self.ctx.pool(), actor_id, role)
            .await
            .map_err(|e| {
                if e.is_unique_violation_on("credentials.role") {
                    EngineError::role_conflict(role, "root already provisioned")
                } else {
                    e.into()
                }
            })?;

        info!(actor_id, from = %credential.role, to = %role, "role changed");
        credential.role = role;
        Ok(credential)
    }
}
