//! Notifications sent alongside lifecycle benefits
//!
//! Content is pre-rendered per locale; a notifier only delivers it.

use crate::config::MessageTemplate;
use crate::error::EngineResult;
use async_trait::async_trait;
use billbank_core::AuthorizationKey;
use billbank_persistence::{Database, MessageRepo, MessageRow, MessageTemplateRow, PersistenceError};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// One message to one recipient, in every supported locale
#[derive(Debug, Clone)]
pub struct Notification {
    pub name: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub authorization_key: Option<AuthorizationKey>,
    pub templates: Vec<MessageTemplate>,
}

/// Delivery channel for notifications.
///
/// A second notification with the same name for the same recipient must
/// fail with a unique violation rather than deliver twice.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier name for logging
    fn name(&self) -> &str;

    /// Deliver and return the message id
    async fn send(&self, notification: Notification) -> EngineResult<String>;
}

/// Persists messages and their templates in the bank's own store
pub struct StoreNotifier {
    db: Database,
}

impl StoreNotifier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Notifier for StoreNotifier {
    fn name(&self) -> &str {
        "store"
    }

    async fn send(&self, notification: Notification) -> EngineResult<String> {
        let message = MessageRow {
            id: Uuid::new_v4().to_string(),
            name: notification.name.clone(),
            sender_id: notification.sender_id.clone(),
            recipient_id: notification.recipient_id.clone(),
            authorization_key: notification
                .authorization_key
                .as_ref()
                .map(|k| k.to_string()),
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;
        MessageRepo::insert(&mut *tx, &message).await?;
        for template in &notification.templates {
            let row = MessageTemplateRow {
                message_id: message.id.clone(),
                locale: template.locale.as_str().to_string(),
                subject: template.subject.clone(),
                content: template.content.clone(),
                actions: serde_json::to_string(&template.actions).map_err(PersistenceError::from)?,
            };
            MessageRepo::insert_template(&mut *tx, &row).await?;
        }
        tx.commit().await?;

        info!(
            message_id = %message.id,
            name = %message.name,
            recipient = %message.recipient_id,
            "message stored"
        );
        Ok(message.id)
    }
}
