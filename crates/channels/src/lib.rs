//! Outbound messaging: the dispatcher contract and the message outbox.

pub mod dispatcher;
pub mod outbox;

pub use dispatcher::{
    CaptureDispatcher, CapturedSend, LoggingDispatcher, MessageDispatcher, NoopDispatcher,
    RejectingDispatcher,
};
pub use outbox::{DeliveryResult, MessageOutbox};
