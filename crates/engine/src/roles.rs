//! RoleResolver - find the credential acting for a system role

use crate::error::EngineResult;
use crate::services::ServiceContext;
use billbank_core::{ActorCredential, Role};
use billbank_persistence::CredentialRepo;
use tracing::warn;

pub struct RoleResolver<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RoleResolver<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// The credential holding `role`; `None` means "no such actor yet",
    /// which callers treat as a skip, not a failure.
    ///
    /// With several holders the earliest created one wins.
    pub async fn find_by_single_role(&self, role: Role) -> EngineResult<Option<ActorCredential>> {
        let holders = CredentialRepo::count_by_role(self.ctx.pool(), role).await?;
        if holders > 1 {
            warn!(role = %role, holders, "several credentials hold a single role, using the earliest");
        }
        Ok(CredentialRepo::find_first_by_role(self.ctx.pool(), role).await?)
    }
}
