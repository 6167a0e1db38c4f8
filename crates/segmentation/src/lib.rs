//! Segment definition and evaluation for the campaign engine.

pub mod conditions;
pub mod directory;
pub mod evaluator;

pub use directory::{CustomerDirectory, InMemoryCustomerDirectory};
pub use evaluator::{CustomerSummary, SegmentEvaluator, SegmentPreview};
