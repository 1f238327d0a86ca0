//! LifecycleTrigger - one-time benefits for a newly created account
//!
//! Every configured benefit and the welcome message run concurrently and
//! independently; one failing never stops the others, and none of them
//! fails account creation. Failures are logged and reported.

use crate::config::{BenefitDefinition, MessageDefinition};
use crate::error::{EngineError, EngineResult};
use crate::notify::{Notification, Notifier};
use crate::roles::RoleResolver;
use crate::services::ServiceContext;
use crate::transfer::{TransferDetails, TransferEngine, TransferOutcome, TransferSource};
use billbank_core::{Account, Actor, AuthorizationKey};
use billbank_persistence::{ActorRepo, MessageRepo};
use futures::future::join_all;
use tracing::{debug, error, info};

/// Outcome of one benefit
#[derive(Debug)]
pub struct BenefitResult {
    pub key: AuthorizationKey,
    pub outcome: EngineResult<TransferOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Sent(String),
    AlreadySent,
    SenderUnavailable,
}

#[derive(Debug, Default)]
pub struct TriggerReport {
    /// The owner is a seed or excluded identity; nothing was attempted
    pub excluded: bool,
    pub benefits: Vec<BenefitResult>,
    /// `None` when no welcome message is configured
    pub message: Option<EngineResult<MessageOutcome>>,
}

impl TriggerReport {
    fn excluded() -> Self {
        Self {
            excluded: true,
            ..Default::default()
        }
    }

    pub fn confirmed(&self) -> usize {
        self.benefits
            .iter()
            .filter(|b| matches!(&b.outcome, Ok(outcome) if outcome.is_confirmed()))
            .count()
    }

    pub fn failures(&self) -> usize {
        let benefits = self.benefits.iter().filter(|b| b.outcome.is_err()).count();
        let message = matches!(self.message, Some(Err(_))) as usize;
        benefits + message
    }
}

pub struct LifecycleTrigger<'a> {
    ctx: &'a ServiceContext,
    notifier: &'a dyn Notifier,
}

impl<'a> LifecycleTrigger<'a> {
    pub fn new(ctx: &'a ServiceContext, notifier: &'a dyn Notifier) -> Self {
        Self { ctx, notifier }
    }

    /// React to "account created". Safe to call any number of times for the
    /// same account.
    pub async fn on_account_created(&self, account: &Account) -> EngineResult<TriggerReport> {
        let owner = ActorRepo::get_by_id(self.ctx.pool(), &account.owner_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    EngineError::UnknownActor(account.owner_id.clone())
                } else {
                    e.into()
                }
            })?;

        if self.ctx.config().is_excluded(&owner.email) {
            debug!(email = %owner.email, "excluded identity, no benefits");
            return Ok(TriggerReport::excluded());
        }

        let benefits = join_all(self.ctx.config().benefits.iter().map(|benefit| async move {
            BenefitResult {
                key: benefit.key.clone(),
                outcome: self.grant(benefit, account).await,
            }
        }));
        let (benefits, message) = futures::join!(benefits, self.send_welcome(&owner));

        for benefit in &benefits {
            match &benefit.outcome {
                Ok(TransferOutcome::Confirmed(tx)) => {
                    info!(account_id = %account.id, key = %benefit.key, transaction_id = %tx.id, "benefit granted")
                }
                Ok(TransferOutcome::AlreadySatisfied) => {
                    debug!(account_id = %account.id, key = %benefit.key, "benefit already granted")
                }
                Ok(TransferOutcome::SourceUnavailable) => {
                    debug!(account_id = %account.id, key = %benefit.key, "no funding actor, benefit skipped")
                }
                Err(e) => {
                    error!(account_id = %account.id, key = %benefit.key, error = %e, "benefit failed")
                }
            }
        }
        if let Some(Err(e)) = &message {
            error!(actor_id = %owner.id, notifier = self.notifier.name(), error = %e, "welcome message failed");
        }

        Ok(TriggerReport {
            excluded: false,
            benefits,
            message,
        })
    }

    async fn grant(
        &self,
        benefit: &BenefitDefinition,
        account: &Account,
    ) -> EngineResult<TransferOutcome> {
        let amount = benefit.amount_minor(self.ctx.config().currency_decimals)?;
        let details = TransferDetails {
            recipient_account_id: account.id.clone(),
            amount,
            title: benefit.title.clone(),
            locale: benefit.locale,
        };

        TransferEngine::new(self.ctx)
            .make_transfer(details, TransferSource::Role(benefit.source_role), &benefit.key)
            .await
    }

    async fn send_welcome(&self, recipient: &Actor) -> Option<EngineResult<MessageOutcome>> {
        let definition = self.ctx.config().welcome_message.as_ref()?;
        Some(self.deliver(definition, recipient).await)
    }

    async fn deliver(
        &self,
        definition: &MessageDefinition,
        recipient: &Actor,
    ) -> EngineResult<MessageOutcome> {
        let existing =
            MessageRepo::find_by_recipient_and_name(self.ctx.pool(), &recipient.id, &definition.name)
                .await?;
        if existing.is_some() {
            debug!(actor_id = %recipient.id, name = %definition.name, "message already sent");
            return Ok(MessageOutcome::AlreadySent);
        }

        let sender = match RoleResolver::new(self.ctx)
            .find_by_single_role(definition.sender_role)
            .await?
        {
            Some(credential) => credential,
            None => {
                debug!(role = %definition.sender_role, "no message sender, skipping");
                return Ok(MessageOutcome::SenderUnavailable);
            }
        };

        let notification = Notification {
            name: definition.name.clone(),
            sender_id: sender.actor_id,
            recipient_id: recipient.id.clone(),
            authorization_key: definition.authorization_key.clone(),
            templates: definition.templates.clone(),
        };

        match self.notifier.send(notification).await {
            Ok(message_id) => Ok(MessageOutcome::Sent(message_id)),
            // Lost a race with a concurrent trigger for the same recipient
            Err(e) if e.is_unique_violation() => Ok(MessageOutcome::AlreadySent),
            Err(e) => Err(e),
        }
    }
}
