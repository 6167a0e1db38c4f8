//! Campaign event bus — trait for emitting engine events from any module.
//!
//! Modules accept an `Arc<dyn EventSink>` to surface recipient and message
//! lifecycle events to the host application (user-facing notifications,
//! activity feeds, external analytics).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// An event emitted by the campaign engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub campaign_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CampaignActivated,
    CampaignPaused,
    CampaignArchived,
    RecipientEnrolled,
    RecipientRemoved,
    RecipientCompleted,
    RecipientConverted,
    MessageQueued,
    MessageFailed,
    RunCompleted,
}

/// Trait for emitting campaign events. Implementations route events to the
/// host application's notification system or an external pipeline.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CampaignEvent);
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: CampaignEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<CampaignEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<CampaignEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: CampaignEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating `CampaignEvent` with minimal boilerplate.
pub fn make_event(event_type: EventType, campaign_id: Uuid) -> CampaignEvent {
    CampaignEvent {
        event_id: Uuid::new_v4(),
        event_type,
        campaign_id,
        customer_id: None,
        recipient_id: None,
        message_id: None,
        timestamp: Utc::now(),
    }
}

impl CampaignEvent {
    pub fn with_customer(mut self, customer_id: Uuid) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_recipient(mut self, recipient_id: Uuid) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    pub fn with_message(mut self, message_id: Uuid) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        let campaign_id = Uuid::new_v4();
        sink.emit(make_event(EventType::RecipientEnrolled, campaign_id).with_customer(Uuid::new_v4()));
        sink.emit(make_event(EventType::MessageQueued, campaign_id));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_type(EventType::RecipientEnrolled), 1);
        assert_eq!(sink.count_type(EventType::MessageQueued), 1);

        let events = sink.events();
        assert_eq!(events[0].campaign_id, campaign_id);
        assert!(events[0].customer_id.is_some());
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        // Should not panic
        sink.emit(make_event(EventType::RunCompleted, Uuid::new_v4()));
    }
}
