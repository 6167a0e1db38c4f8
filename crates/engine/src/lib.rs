//! The campaign engine: enrollment, drip scheduling, conversion detection,
//! and run processing.

pub mod conversion;
pub mod recipients;
pub mod run;
pub mod scheduler;

pub use conversion::{
    ConversionChecker, ConversionSnapshot, InMemoryOrderLedger, OrderLedger, OrderRecord,
};
pub use recipients::{EnrollOutcome, RecipientStore};
pub use run::{RunProcessor, RunReport, RunStore};
pub use scheduler::{next_step, StepDecision};
