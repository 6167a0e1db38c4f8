//! Message outbox — one record per dispatch attempt, with delivery
//! tracking.
//!
//! A message is created PENDING at the moment the engine decides to send.
//! The transport's asynchronous delivery result (or a synchronous rejection)
//! moves it to SENT or FAILED. Records are never deleted; they are the
//! campaign's message history.

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use optireach_core::types::{Channel, Message, MessageStatus};

/// Result reported by the transport for a previously accepted message.
#[derive(Debug, Clone)]
pub enum DeliveryResult {
    Delivered,
    Failed { error: String },
}

/// Thread-safe in-memory message store.
#[derive(Default)]
pub struct MessageOutbox {
    messages: DashMap<Uuid, Message>,
}

impl MessageOutbox {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
        }
    }

    /// Record a message the engine has decided to send. Status PENDING until
    /// the delivery result arrives.
    #[allow(clippy::too_many_arguments)]
    pub fn record_pending(
        &self,
        campaign_id: Uuid,
        recipient_id: Uuid,
        customer_id: Uuid,
        channel: Channel,
        to: &str,
        body: &str,
    ) -> Message {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            campaign_id,
            recipient_id,
            customer_id,
            channel,
            to: to.to_string(),
            body: body.to_string(),
            status: MessageStatus::Pending,
            error: None,
            created_at: now,
            sent_at: None,
        };
        debug!(message_id = %message.id, to = %to, ?channel, "Message queued");
        metrics::counter!("optireach.messages_queued").increment(1);
        self.messages.insert(message.id, message.clone());
        message
    }

    /// Record a message that failed before it could be handed to the
    /// transport (render error, missing contact address, missing template).
    #[allow(clippy::too_many_arguments)]
    pub fn record_failure(
        &self,
        campaign_id: Uuid,
        recipient_id: Uuid,
        customer_id: Uuid,
        channel: Channel,
        to: &str,
        error: &str,
    ) -> Message {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            campaign_id,
            recipient_id,
            customer_id,
            channel,
            to: to.to_string(),
            body: String::new(),
            status: MessageStatus::Failed,
            error: Some(error.to_string()),
            created_at: now,
            sent_at: None,
        };
        warn!(message_id = %message.id, error = %error, "Message failed before dispatch");
        metrics::counter!("optireach.messages_failed").increment(1);
        self.messages.insert(message.id, message.clone());
        message
    }

    /// Apply the transport's delivery result. Returns false for an unknown
    /// message id.
    pub fn handle_delivery_result(&self, message_id: Uuid, result: DeliveryResult) -> bool {
        let Some(mut entry) = self.messages.get_mut(&message_id) else {
            warn!(message_id = %message_id, "Delivery result for unknown message");
            return false;
        };
        let message = entry.value_mut();
        match result {
            DeliveryResult::Delivered => {
                message.status = MessageStatus::Sent;
                message.sent_at = Some(Utc::now());
                metrics::counter!("optireach.messages_delivered").increment(1);
            }
            DeliveryResult::Failed { error } => {
                message.status = MessageStatus::Failed;
                message.error = Some(error);
                metrics::counter!("optireach.messages_failed").increment(1);
            }
        }
        true
    }

    pub fn get(&self, id: Uuid) -> Option<Message> {
        self.messages.get(&id).map(|r| r.value().clone())
    }

    /// All messages for a campaign, newest first.
    pub fn for_campaign(&self, campaign_id: Uuid) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|r| r.value().campaign_id == campaign_id)
            .map(|r| r.value().clone())
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages
    }

    pub fn for_recipient(&self, recipient_id: Uuid) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|r| r.value().recipient_id == recipient_id)
            .map(|r| r.value().clone())
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages
    }
}
