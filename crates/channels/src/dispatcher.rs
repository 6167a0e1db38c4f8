//! The outbound transport contract.
//!
//! The engine never talks to Twilio or an SMTP relay directly; it hands the
//! rendered body to a `MessageDispatcher` and moves on. `Ok` means the
//! transport accepted the message — the delivery result comes back later
//! through `MessageOutbox::handle_delivery_result`.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::info;

use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::types::Channel;

pub trait MessageDispatcher: Send + Sync {
    /// Hand a message to the transport. Fire-and-forget relative to the run:
    /// the caller does not wait for delivery.
    fn send(&self, channel: Channel, to: &str, body: &str) -> CampaignResult<()>;
}

/// Accepts everything and does nothing. Default for contexts that don't
/// deliver (previews, dry runs).
pub struct NoopDispatcher;

impl MessageDispatcher for NoopDispatcher {
    fn send(&self, _channel: Channel, _to: &str, _body: &str) -> CampaignResult<()> {
        Ok(())
    }
}

/// Logs each send at info level. Used by the demo binary.
pub struct LoggingDispatcher;

impl MessageDispatcher for LoggingDispatcher {
    fn send(&self, channel: Channel, to: &str, body: &str) -> CampaignResult<()> {
        info!(?channel, to = %to, body = %body, "Message dispatched");
        Ok(())
    }
}

/// A send recorded by `CaptureDispatcher`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedSend {
    pub channel: Channel,
    pub to: String,
    pub body: String,
}

/// In-memory dispatcher that captures sends for testing.
#[derive(Default)]
pub struct CaptureDispatcher {
    sent: Mutex<Vec<CapturedSend>>,
}

impl CaptureDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<CapturedSend> {
        self.sent.lock().expect("dispatcher mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().expect("dispatcher mutex poisoned").len()
    }
}

impl MessageDispatcher for CaptureDispatcher {
    fn send(&self, channel: Channel, to: &str, body: &str) -> CampaignResult<()> {
        self.sent
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(CapturedSend {
                channel,
                to: to.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

/// Rejects every send. Exercises the per-recipient failure path in tests.
pub struct RejectingDispatcher {
    pub reason: String,
}

impl RejectingDispatcher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl MessageDispatcher for RejectingDispatcher {
    fn send(&self, _channel: Channel, to: &str, _body: &str) -> CampaignResult<()> {
        Err(CampaignError::Dispatch(format!(
            "Transport rejected message to {to}: {}",
            self.reason
        )))
    }
}
