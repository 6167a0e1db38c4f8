//! Drip step scheduling — a pure decision function.
//!
//! Step delays are measured from the recipient's enrollment for every step
//! (an absolute schedule). Measuring from the previous message would let
//! processing latency push every later step back; anchoring on enrollment
//! keeps the schedule fixed no matter when runs actually happen.

use chrono::{DateTime, Utc};

use optireach_core::types::{CampaignRecipient, DripStep};

/// What the run processor should do with a recipient this pass.
#[derive(Debug, Clone)]
pub enum StepDecision {
    /// Send this step now. At most one step per pass — a recipient whose
    /// backlog spans several due steps catches up one run at a time.
    Send(DripStep),
    /// Nothing due yet.
    Wait,
    /// All steps sent (or none configured); the recipient is done.
    Complete,
}

/// Decide the next action for a recipient given the campaign's steps,
/// assumed sorted by `step_index` (validated at the campaign boundary).
pub fn next_step(
    recipient: &CampaignRecipient,
    steps: &[DripStep],
    now: DateTime<Utc>,
) -> StepDecision {
    let Some(final_step) = steps.last() else {
        return StepDecision::Complete;
    };

    if recipient.last_step_index >= final_step.step_index as i32 {
        return StepDecision::Complete;
    }

    let elapsed_days = now.signed_duration_since(recipient.enrolled_at).num_days();

    // Smallest step index past the cursor whose delay has elapsed.
    for step in steps {
        if step.step_index as i32 <= recipient.last_step_index {
            continue;
        }
        if i64::from(step.delay_days) <= elapsed_days {
            return StepDecision::Send(step.clone());
        }
    }

    StepDecision::Wait
}
