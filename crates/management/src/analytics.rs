//! Campaign analytics — pure aggregation over recipients, messages, and
//! runs. Nothing here mutates state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use optireach_channels::MessageOutbox;
use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::types::{Campaign, CampaignRun, MessageStatus, RecipientStatus};
use optireach_engine::{RecipientStore, RunStore};

use crate::campaigns::CampaignStore;

/// Recipient totals grouped by status. The groups always sum to `total`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientCounts {
    pub active: u64,
    pub completed: u64,
    pub converted: u64,
    pub removed: u64,
    pub total: u64,
}

/// Message totals grouped by status. The groups always sum to `total`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageCounts {
    pub pending: u64,
    pub sent: u64,
    pub failed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignAnalytics {
    pub campaign: Campaign,
    pub recipients: RecipientCounts,
    pub messages: MessageCounts,
    pub recent_runs: Vec<CampaignRun>,
}

pub struct AnalyticsAggregator {
    campaigns: Arc<CampaignStore>,
    recipients: Arc<RecipientStore>,
    outbox: Arc<MessageOutbox>,
    runs: Arc<RunStore>,
    recent_runs_limit: usize,
}

impl AnalyticsAggregator {
    pub fn new(
        campaigns: Arc<CampaignStore>,
        recipients: Arc<RecipientStore>,
        outbox: Arc<MessageOutbox>,
        runs: Arc<RunStore>,
        recent_runs_limit: usize,
    ) -> Self {
        Self {
            campaigns,
            recipients,
            outbox,
            runs,
            recent_runs_limit,
        }
    }

    pub fn campaign_analytics(&self, campaign_id: Uuid) -> CampaignResult<CampaignAnalytics> {
        let campaign = self
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {campaign_id} not found")))?;

        let mut recipients = RecipientCounts::default();
        for recipient in self.recipients.for_campaign(campaign_id) {
            recipients.total += 1;
            match recipient.status {
                RecipientStatus::Active => recipients.active += 1,
                RecipientStatus::Completed => recipients.completed += 1,
                RecipientStatus::Converted => recipients.converted += 1,
                RecipientStatus::Removed => recipients.removed += 1,
            }
        }

        let mut messages = MessageCounts::default();
        for message in self.outbox.for_campaign(campaign_id) {
            messages.total += 1;
            match message.status {
                MessageStatus::Pending => messages.pending += 1,
                MessageStatus::Sent => messages.sent += 1,
                MessageStatus::Failed => messages.failed += 1,
            }
        }

        let recent_runs = self
            .runs
            .recent_for_campaign(campaign_id, self.recent_runs_limit);

        Ok(CampaignAnalytics {
            campaign,
            recipients,
            messages,
            recent_runs,
        })
    }
}
