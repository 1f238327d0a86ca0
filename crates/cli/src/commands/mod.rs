//! CLI command handlers

pub mod actor;
pub mod transfer;

use anyhow::{anyhow, Result};
use billbank_core::{actor::normalize_email, Account, Actor};
use billbank_engine::AccountStore;
use billbank_persistence::ActorRepo;

use crate::db::Session;

/// Look up an actor and its account by e-mail
pub(crate) async fn resolve(session: &Session, email: &str) -> Result<(Actor, Account)> {
    let email = normalize_email(email);
    let actor = ActorRepo::find_by_email(session.ctx.pool(), &email)
        .await?
        .ok_or_else(|| anyhow!("No actor with e-mail {}", email))?;
    let account = AccountStore::new(&session.ctx).get_account(&actor.id).await?;
    Ok((actor, account))
}
