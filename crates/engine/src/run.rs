//! Run processing — one pass over a campaign's recipients.
//!
//! The processor is the only writer of recipient progress. It refreshes
//! automatic enrollment, applies conversion rules, advances due steps, and
//! records an immutable `CampaignRun`. Runs for the same campaign are
//! serialized by an in-flight guard so repeated invocation can never
//! double-send a step.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use optireach_channels::{DeliveryResult, MessageDispatcher, MessageOutbox};
use optireach_core::config::EngineConfig;
use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::event_bus::{make_event, noop_sink, EventSink, EventType};
use optireach_core::types::{
    Campaign, CampaignRecipient, CampaignRun, CampaignStatus, Channel, DripStep, EnrollmentMode,
    Message,
};
use optireach_segmentation::{CustomerDirectory, SegmentEvaluator};
use optireach_templates::{render, RenderContext, TemplateStore};

use crate::conversion::{ConversionChecker, ConversionSnapshot, OrderLedger};
use crate::recipients::{EnrollOutcome, RecipientStore};
use crate::scheduler::{next_step, StepDecision};

/// Store of completed run records.
#[derive(Default)]
pub struct RunStore {
    runs: DashMap<Uuid, CampaignRun>,
}

impl RunStore {
    pub fn new() -> Self {
        Self {
            runs: DashMap::new(),
        }
    }

    pub fn record(&self, run: CampaignRun) {
        self.runs.insert(run.id, run);
    }

    pub fn get(&self, id: Uuid) -> Option<CampaignRun> {
        self.runs.get(&id).map(|r| r.value().clone())
    }

    /// Runs for a campaign, newest first, bounded by `limit`.
    pub fn recent_for_campaign(&self, campaign_id: Uuid, limit: usize) -> Vec<CampaignRun> {
        let mut runs: Vec<CampaignRun> = self
            .runs
            .iter()
            .filter(|r| r.value().campaign_id == campaign_id)
            .map(|r| r.value().clone())
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        runs
    }
}

/// Result of a processing pass: the recorded run and the cadence-derived
/// next scheduled time for the campaign.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: CampaignRun,
    pub next_run_at: DateTime<Utc>,
}

/// Orchestrates processing passes. Holds the engine's stores and the seams
/// to the host application (customer directory, order ledger, transport).
pub struct RunProcessor {
    evaluator: SegmentEvaluator,
    directory: Arc<dyn CustomerDirectory>,
    ledger: Arc<dyn OrderLedger>,
    templates: Arc<TemplateStore>,
    recipients: Arc<RecipientStore>,
    outbox: Arc<MessageOutbox>,
    runs: Arc<RunStore>,
    dispatcher: Arc<dyn MessageDispatcher>,
    events: Arc<dyn EventSink>,
    run_interval: Duration,
    in_flight: DashMap<Uuid, ()>,
}

impl RunProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &EngineConfig,
        directory: Arc<dyn CustomerDirectory>,
        ledger: Arc<dyn OrderLedger>,
        templates: Arc<TemplateStore>,
        recipients: Arc<RecipientStore>,
        outbox: Arc<MessageOutbox>,
        runs: Arc<RunStore>,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> Self {
        Self {
            evaluator: SegmentEvaluator::new(config.preview_sample_size),
            directory,
            ledger,
            templates,
            recipients,
            outbox,
            runs,
            dispatcher,
            events: noop_sink(),
            run_interval: Duration::hours(i64::from(config.run_interval_hours)),
            in_flight: DashMap::new(),
        }
    }

    /// Attach an event sink for emitting engine events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Execute one pass for the campaign as of `now`. Returns `None` when
    /// there is nothing to do: the campaign is not ACTIVE, or another run
    /// for it is already in flight.
    pub fn process(
        &self,
        campaign: &Campaign,
        now: DateTime<Utc>,
    ) -> CampaignResult<Option<RunReport>> {
        if campaign.status != CampaignStatus::Active {
            debug!(campaign_id = %campaign.id, status = ?campaign.status, "Skipping run for inactive campaign");
            return Ok(None);
        }

        let Some(_guard) = InFlightGuard::claim(&self.in_flight, campaign.id) else {
            warn!(campaign_id = %campaign.id, "Run already in flight, skipping");
            return Ok(None);
        };

        let mut enrolled: u64 = 0;
        let mut processed: u64 = 0;
        let mut messages_sent: u64 = 0;
        let mut converted: u64 = 0;
        let mut completed: u64 = 0;
        let mut failed: u64 = 0;

        // Refresh automatic enrollment before advancing anyone, so customers
        // matching the segment today get their day-0 step in this same pass.
        if campaign.config.enrollment_mode == EnrollmentMode::Automatic {
            if let Some(segment) = &campaign.segment {
                let matches =
                    self.evaluator
                        .matching_customers(segment, self.directory.as_ref(), now)?;
                for customer in matches {
                    match self.recipients.enroll(campaign, customer.id, now) {
                        EnrollOutcome::Enrolled(recipient) => {
                            enrolled += 1;
                            self.events.emit(
                                make_event(EventType::RecipientEnrolled, campaign.id)
                                    .with_customer(customer.id)
                                    .with_recipient(recipient.id),
                            );
                        }
                        // Already enrolled, or still cooling down from a
                        // previous enrollment.
                        EnrollOutcome::AlreadyActive(_) | EnrollOutcome::CoolingDown { .. } => {}
                    }
                }
            }
        }

        let active = self.recipients.active_for_campaign(campaign.id);
        let snapshot = ConversionSnapshot::capture(
            self.ledger.as_ref(),
            active.iter().map(|r| r.customer_id),
            now,
        );

        for recipient in &active {
            processed += 1;

            if campaign.config.stop_on_conversion
                && ConversionChecker::is_converted(&snapshot, recipient, &campaign.config.conversion)
            {
                self.recipients.mark_converted(recipient.id, now)?;
                converted += 1;
                self.events.emit(
                    make_event(EventType::RecipientConverted, campaign.id)
                        .with_customer(recipient.customer_id)
                        .with_recipient(recipient.id),
                );
                continue;
            }

            match next_step(recipient, &campaign.config.steps, now) {
                StepDecision::Send(step) => match self.send_step(campaign, recipient, &step, now) {
                    Ok(_message) => messages_sent += 1,
                    Err(err) => {
                        // Per-recipient failure: recorded, never fatal to
                        // the pass.
                        warn!(
                            campaign_id = %campaign.id,
                            recipient_id = %recipient.id,
                            error = %err,
                            "Failed to process recipient"
                        );
                        failed += 1;
                    }
                },
                StepDecision::Complete => {
                    self.recipients.mark_completed(recipient.id, now)?;
                    completed += 1;
                    self.events.emit(
                        make_event(EventType::RecipientCompleted, campaign.id)
                            .with_customer(recipient.customer_id)
                            .with_recipient(recipient.id),
                    );
                }
                StepDecision::Wait => {}
            }
        }

        let run = CampaignRun {
            id: Uuid::new_v4(),
            campaign_id: campaign.id,
            started_at: now,
            completed_at: Utc::now(),
            processed,
            enrolled,
            messages_sent,
            converted,
            completed,
            failed,
        };
        self.runs.record(run.clone());
        metrics::counter!("optireach.runs_completed").increment(1);
        info!(
            campaign_id = %campaign.id,
            processed,
            enrolled,
            messages_sent,
            converted,
            completed,
            failed,
            "Campaign run completed"
        );
        self.events
            .emit(make_event(EventType::RunCompleted, campaign.id));

        Ok(Some(RunReport {
            run,
            next_run_at: now + self.run_interval,
        }))
    }

    /// Render and dispatch one step to one recipient. Every failure path
    /// leaves a FAILED message row behind for the campaign's history.
    fn send_step(
        &self,
        campaign: &Campaign,
        recipient: &CampaignRecipient,
        step: &DripStep,
        now: DateTime<Utc>,
    ) -> CampaignResult<Message> {
        let result = self.prepare_step(campaign, recipient, step);
        let (customer_id, to, body) = match result {
            Ok(parts) => parts,
            Err(err) => {
                self.outbox.record_failure(
                    campaign.id,
                    recipient.id,
                    recipient.customer_id,
                    step.channel,
                    "",
                    &err.to_string(),
                );
                self.events.emit(
                    make_event(EventType::MessageFailed, campaign.id)
                        .with_recipient(recipient.id),
                );
                return Err(err);
            }
        };

        let message = self.outbox.record_pending(
            campaign.id,
            recipient.id,
            customer_id,
            step.channel,
            &to,
            &body,
        );

        // Fire-and-forget: Ok means the transport accepted the message; it
        // stays PENDING until the delivery callback lands.
        if let Err(err) = self.dispatcher.send(step.channel, &to, &body) {
            self.outbox.handle_delivery_result(
                message.id,
                DeliveryResult::Failed {
                    error: err.to_string(),
                },
            );
            self.events.emit(
                make_event(EventType::MessageFailed, campaign.id)
                    .with_recipient(recipient.id)
                    .with_message(message.id),
            );
            return Err(err);
        }

        self.recipients.advance(recipient.id, step.step_index, now)?;
        self.events.emit(
            make_event(EventType::MessageQueued, campaign.id)
                .with_customer(customer_id)
                .with_recipient(recipient.id)
                .with_message(message.id),
        );
        Ok(message)
    }

    /// Resolve the customer, destination address, and rendered body for a
    /// step.
    fn prepare_step(
        &self,
        campaign: &Campaign,
        recipient: &CampaignRecipient,
        step: &DripStep,
    ) -> CampaignResult<(Uuid, String, String)> {
        let customer = self.directory.get(recipient.customer_id).ok_or_else(|| {
            CampaignError::NotFound(format!("Customer {} not found", recipient.customer_id))
        })?;

        let to = match step.channel {
            Channel::Sms => customer.phone.clone().ok_or_else(|| {
                CampaignError::Validation(format!("Customer {} has no phone number", customer.id))
            })?,
            Channel::Email => customer.email.clone().ok_or_else(|| {
                CampaignError::Validation(format!("Customer {} has no email address", customer.id))
            })?,
        };

        let body_template = match (&step.body, step.template_id) {
            (Some(body), _) => body.clone(),
            (None, Some(template_id)) => self
                .templates
                .get(template_id)
                .ok_or_else(|| {
                    CampaignError::NotFound(format!("Template {template_id} not found"))
                })?
                .body,
            (None, None) => {
                return Err(CampaignError::Validation(format!(
                    "Step {} has no template or body",
                    step.step_index
                )))
            }
        };

        let ctx = RenderContext::for_customer(&customer, &campaign.name);
        let body = render(&body_template, &ctx)?;
        Ok((customer.id, to, body))
    }
}

/// Claims a campaign's run slot; releases it on drop, including on the
/// error paths out of `process`.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<Uuid, ()>,
    campaign_id: Uuid,
}

impl<'a> InFlightGuard<'a> {
    fn claim(in_flight: &'a DashMap<Uuid, ()>, campaign_id: Uuid) -> Option<Self> {
        match in_flight.entry(campaign_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(());
                Some(Self {
                    in_flight,
                    campaign_id,
                })
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.campaign_id);
    }
}
