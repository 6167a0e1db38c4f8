//! The campaign service — the in-process operation boundary the host
//! application's UI actions call.
//!
//! Every operation takes the caller's identity explicitly. Triggering a run
//! is restricted to administrators; everything else is open to staff.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use optireach_channels::{MessageDispatcher, MessageOutbox};
use optireach_core::config::AppConfig;
use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::event_bus::{make_event, noop_sink, EventSink, EventType};
use optireach_core::types::{
    CallerContext, Campaign, CampaignRecipient, CampaignStatus, MessageTemplate, SegmentConfig,
};
use optireach_engine::{EnrollOutcome, OrderLedger, RecipientStore, RunProcessor, RunReport, RunStore};
use optireach_segmentation::{CustomerDirectory, SegmentEvaluator, SegmentPreview};
use optireach_templates::{CreateTemplateRequest, TemplateStore, UpdateTemplateRequest};

use crate::analytics::{AnalyticsAggregator, CampaignAnalytics};
use crate::campaigns::CampaignStore;
use crate::models::{AuditAction, CreateCampaignRequest, UpdateCampaignRequest};

pub struct CampaignService {
    campaigns: Arc<CampaignStore>,
    templates: Arc<TemplateStore>,
    recipients: Arc<RecipientStore>,
    outbox: Arc<MessageOutbox>,
    runs: Arc<RunStore>,
    directory: Arc<dyn CustomerDirectory>,
    evaluator: SegmentEvaluator,
    processor: RunProcessor,
    analytics: AnalyticsAggregator,
    events: Arc<dyn EventSink>,
}

impl CampaignService {
    pub fn new(
        config: &AppConfig,
        directory: Arc<dyn CustomerDirectory>,
        ledger: Arc<dyn OrderLedger>,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> Self {
        Self::with_event_sink(config, directory, ledger, dispatcher, noop_sink())
    }

    pub fn with_event_sink(
        config: &AppConfig,
        directory: Arc<dyn CustomerDirectory>,
        ledger: Arc<dyn OrderLedger>,
        dispatcher: Arc<dyn MessageDispatcher>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let campaigns = Arc::new(CampaignStore::new());
        let templates = Arc::new(TemplateStore::new());
        let recipients = Arc::new(RecipientStore::new());
        let outbox = Arc::new(MessageOutbox::new());
        let runs = Arc::new(RunStore::new());

        let processor = RunProcessor::new(
            &config.engine,
            directory.clone(),
            ledger,
            templates.clone(),
            recipients.clone(),
            outbox.clone(),
            runs.clone(),
            dispatcher,
        )
        .with_event_sink(events.clone());

        let analytics = AnalyticsAggregator::new(
            campaigns.clone(),
            recipients.clone(),
            outbox.clone(),
            runs.clone(),
            config.engine.recent_runs_limit,
        );

        Self {
            campaigns,
            templates,
            recipients,
            outbox,
            runs,
            directory,
            evaluator: SegmentEvaluator::new(config.engine.preview_sample_size),
            processor,
            analytics,
            events,
        }
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn create_campaign(
        &self,
        ctx: &CallerContext,
        req: CreateCampaignRequest,
    ) -> CampaignResult<Campaign> {
        self.campaigns.create(req, &ctx.user)
    }

    pub fn update_campaign(
        &self,
        ctx: &CallerContext,
        id: Uuid,
        req: UpdateCampaignRequest,
    ) -> CampaignResult<Campaign> {
        self.campaigns.update(id, req, &ctx.user)
    }

    pub fn delete_campaign(&self, ctx: &CallerContext, id: Uuid) -> CampaignResult<()> {
        self.campaigns.delete(id, &ctx.user)
    }

    pub fn activate_campaign(&self, ctx: &CallerContext, id: Uuid) -> CampaignResult<Campaign> {
        let campaign = self.campaigns.activate(id, &ctx.user, Utc::now())?;
        self.events
            .emit(make_event(EventType::CampaignActivated, id));
        Ok(campaign)
    }

    pub fn pause_campaign(&self, ctx: &CallerContext, id: Uuid) -> CampaignResult<Campaign> {
        let campaign = self.campaigns.pause(id, &ctx.user)?;
        self.events.emit(make_event(EventType::CampaignPaused, id));
        Ok(campaign)
    }

    pub fn archive_campaign(&self, ctx: &CallerContext, id: Uuid) -> CampaignResult<Campaign> {
        let campaign = self.campaigns.archive(id, &ctx.user)?;
        self.events
            .emit(make_event(EventType::CampaignArchived, id));
        Ok(campaign)
    }

    pub fn get_campaign(&self, _ctx: &CallerContext, id: Uuid) -> CampaignResult<Campaign> {
        self.campaigns
            .get(id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {id} not found")))
    }

    pub fn list_campaigns(&self, _ctx: &CallerContext) -> Vec<Campaign> {
        self.campaigns.list()
    }

    // ─── Recipients ────────────────────────────────────────────────────────

    /// Manually enroll a customer. Idempotent while the recipient is ACTIVE;
    /// refused during the cooldown after a terminal status.
    pub fn enroll_customer(
        &self,
        ctx: &CallerContext,
        campaign_id: Uuid,
        customer_id: Uuid,
    ) -> CampaignResult<CampaignRecipient> {
        let campaign = self
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {campaign_id} not found")))?;
        if campaign.status == CampaignStatus::Archived {
            return Err(CampaignError::Validation(
                "Cannot enroll into an archived campaign".to_string(),
            ));
        }
        if self.directory.get(customer_id).is_none() {
            return Err(CampaignError::NotFound(format!(
                "Customer {customer_id} not found"
            )));
        }

        match self.recipients.enroll(&campaign, customer_id, Utc::now()) {
            EnrollOutcome::Enrolled(recipient) => {
                self.campaigns.log_audit(
                    &ctx.user,
                    AuditAction::Enroll,
                    "recipient",
                    &recipient.id.to_string(),
                    serde_json::json!({"customer_id": customer_id}),
                );
                self.events.emit(
                    make_event(EventType::RecipientEnrolled, campaign_id)
                        .with_customer(customer_id)
                        .with_recipient(recipient.id),
                );
                Ok(recipient)
            }
            EnrollOutcome::AlreadyActive(recipient) => Ok(recipient),
            EnrollOutcome::CoolingDown { available_at } => Err(CampaignError::Validation(format!(
                "Customer is in cooldown until {available_at}"
            ))),
        }
    }

    pub fn remove_recipient(
        &self,
        ctx: &CallerContext,
        recipient_id: Uuid,
    ) -> CampaignResult<CampaignRecipient> {
        let recipient = self.recipients.remove(recipient_id, Utc::now())?;
        self.campaigns.log_audit(
            &ctx.user,
            AuditAction::Remove,
            "recipient",
            &recipient_id.to_string(),
            serde_json::json!({}),
        );
        self.events.emit(
            make_event(EventType::RecipientRemoved, recipient.campaign_id)
                .with_customer(recipient.customer_id)
                .with_recipient(recipient.id),
        );
        Ok(recipient)
    }

    // ─── Runs ──────────────────────────────────────────────────────────────

    /// Execute one processing pass. Admin only: the check runs before any
    /// side effect. Returns `None` when the campaign is not ACTIVE or a run
    /// is already in flight.
    pub fn trigger_campaign_run(
        &self,
        ctx: &CallerContext,
        campaign_id: Uuid,
    ) -> CampaignResult<Option<RunReport>> {
        if !ctx.is_admin() {
            return Err(CampaignError::admin_only());
        }
        let campaign = self
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {campaign_id} not found")))?;

        let report = self.processor.process(&campaign, Utc::now())?;
        if let Some(report) = &report {
            self.campaigns
                .set_next_run_at(campaign_id, report.next_run_at)?;
            self.campaigns.log_audit(
                &ctx.user,
                AuditAction::TriggerRun,
                "campaign",
                &campaign_id.to_string(),
                serde_json::json!({"run_id": report.run.id}),
            );
            info!(
                campaign_id = %campaign_id,
                run_id = %report.run.id,
                next_run_at = %report.next_run_at,
                "Run triggered"
            );
        }
        Ok(report)
    }

    // ─── Segments ──────────────────────────────────────────────────────────

    /// Count and sample the customers a segment would match. Read-only —
    /// never enrolls.
    pub fn preview_segment(
        &self,
        _ctx: &CallerContext,
        config: &SegmentConfig,
    ) -> CampaignResult<SegmentPreview> {
        self.evaluator
            .preview(config, self.directory.as_ref(), Utc::now())
    }

    // ─── Templates ─────────────────────────────────────────────────────────

    pub fn create_message_template(
        &self,
        _ctx: &CallerContext,
        req: CreateTemplateRequest,
    ) -> CampaignResult<MessageTemplate> {
        self.templates.create(req)
    }

    pub fn update_message_template(
        &self,
        _ctx: &CallerContext,
        id: Uuid,
        req: UpdateTemplateRequest,
    ) -> CampaignResult<MessageTemplate> {
        self.templates.update(id, req)
    }

    pub fn delete_message_template(&self, _ctx: &CallerContext, id: Uuid) -> CampaignResult<()> {
        self.templates.delete(id)
    }

    // ─── Analytics ─────────────────────────────────────────────────────────

    pub fn campaign_analytics(
        &self,
        _ctx: &CallerContext,
        campaign_id: Uuid,
    ) -> CampaignResult<CampaignAnalytics> {
        self.analytics.campaign_analytics(campaign_id)
    }

    // ─── Store access for the host application ─────────────────────────────

    pub fn campaigns(&self) -> &Arc<CampaignStore> {
        &self.campaigns
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    pub fn recipients(&self) -> &Arc<RecipientStore> {
        &self.recipients
    }

    pub fn outbox(&self) -> &Arc<MessageOutbox> {
        &self.outbox
    }

    pub fn runs(&self) -> &Arc<RunStore> {
        &self.runs
    }
}
