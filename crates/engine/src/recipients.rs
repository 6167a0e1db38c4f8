//! Recipient enrollment store.
//!
//! A recipient is the join of a campaign and a customer. The store enforces
//! uniqueness per `(campaign_id, customer_id)` and owns the enrollment rules:
//! idempotent re-enrollment while ACTIVE, cooldown after a terminal status,
//! reset to a fresh recipient once the cooldown has elapsed.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::types::{Campaign, CampaignRecipient, RecipientStatus};

/// Outcome of an enrollment attempt.
#[derive(Debug, Clone)]
pub enum EnrollOutcome {
    /// A new recipient was created, or a cooled-down terminal recipient was
    /// reset to a fresh ACTIVE one.
    Enrolled(CampaignRecipient),
    /// The customer is already actively enrolled; nothing changed.
    AlreadyActive(CampaignRecipient),
    /// The customer's previous enrollment ended too recently.
    CoolingDown { available_at: DateTime<Utc> },
}

/// Thread-safe recipient store. The pair index entry acts as the lock that
/// makes concurrent enrollment of the same (campaign, customer) atomic.
#[derive(Default)]
pub struct RecipientStore {
    recipients: DashMap<Uuid, CampaignRecipient>,
    by_pair: DashMap<(Uuid, Uuid), Uuid>,
}

impl RecipientStore {
    pub fn new() -> Self {
        Self {
            recipients: DashMap::new(),
            by_pair: DashMap::new(),
        }
    }

    /// Enroll a customer into a campaign. Idempotent for ACTIVE recipients;
    /// terminal recipients are reset only after the campaign's cooldown.
    pub fn enroll(
        &self,
        campaign: &Campaign,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> EnrollOutcome {
        let pair = (campaign.id, customer_id);
        match self.by_pair.entry(pair) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                let recipient_id = *entry.get();
                let mut existing = self
                    .recipients
                    .get_mut(&recipient_id)
                    .expect("pair index points at missing recipient");

                if existing.status == RecipientStatus::Active {
                    return EnrollOutcome::AlreadyActive(existing.clone());
                }

                let cooldown = Duration::days(i64::from(campaign.config.cooldown_days));
                let available_at = existing
                    .terminated_at
                    .map(|at| at + cooldown)
                    .unwrap_or(now);
                if now < available_at {
                    return EnrollOutcome::CoolingDown { available_at };
                }

                // Cooldown elapsed: reset the same row to a fresh enrollment.
                let r = existing.value_mut();
                r.status = RecipientStatus::Active;
                r.enrolled_at = now;
                r.last_step_index = -1;
                r.last_message_at = None;
                r.terminated_at = None;
                info!(
                    recipient_id = %r.id,
                    campaign_id = %campaign.id,
                    customer_id = %customer_id,
                    "Recipient re-enrolled after cooldown"
                );
                EnrollOutcome::Enrolled(r.clone())
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let recipient = CampaignRecipient {
                    id: Uuid::new_v4(),
                    campaign_id: campaign.id,
                    customer_id,
                    status: RecipientStatus::Active,
                    enrolled_at: now,
                    last_step_index: -1,
                    last_message_at: None,
                    terminated_at: None,
                };
                entry.insert(recipient.id);
                self.recipients.insert(recipient.id, recipient.clone());
                metrics::counter!("optireach.recipients_enrolled").increment(1);
                debug!(
                    recipient_id = %recipient.id,
                    campaign_id = %campaign.id,
                    customer_id = %customer_id,
                    "Recipient enrolled"
                );
                EnrollOutcome::Enrolled(recipient)
            }
        }
    }

    /// Remove a recipient from its campaign. Message history is untouched.
    /// Removing an already-removed recipient is a no-op.
    pub fn remove(&self, recipient_id: Uuid, now: DateTime<Utc>) -> CampaignResult<CampaignRecipient> {
        let mut entry = self
            .recipients
            .get_mut(&recipient_id)
            .ok_or_else(|| CampaignError::NotFound(format!("Recipient {recipient_id} not found")))?;
        let r = entry.value_mut();
        if r.status != RecipientStatus::Removed {
            r.status = RecipientStatus::Removed;
            r.terminated_at = Some(now);
            info!(recipient_id = %recipient_id, "Recipient removed");
        }
        Ok(r.clone())
    }

    /// Record that a step was sent: bump the step cursor and the last-message
    /// timestamp.
    pub fn advance(
        &self,
        recipient_id: Uuid,
        step_index: u32,
        now: DateTime<Utc>,
    ) -> CampaignResult<()> {
        let mut entry = self
            .recipients
            .get_mut(&recipient_id)
            .ok_or_else(|| CampaignError::NotFound(format!("Recipient {recipient_id} not found")))?;
        let r = entry.value_mut();
        r.last_step_index = step_index as i32;
        r.last_message_at = Some(now);
        Ok(())
    }

    pub fn mark_completed(&self, recipient_id: Uuid, now: DateTime<Utc>) -> CampaignResult<()> {
        self.terminate(recipient_id, RecipientStatus::Completed, now)
    }

    pub fn mark_converted(&self, recipient_id: Uuid, now: DateTime<Utc>) -> CampaignResult<()> {
        self.terminate(recipient_id, RecipientStatus::Converted, now)
    }

    fn terminate(
        &self,
        recipient_id: Uuid,
        status: RecipientStatus,
        now: DateTime<Utc>,
    ) -> CampaignResult<()> {
        let mut entry = self
            .recipients
            .get_mut(&recipient_id)
            .ok_or_else(|| CampaignError::NotFound(format!("Recipient {recipient_id} not found")))?;
        let r = entry.value_mut();
        r.status = status;
        r.terminated_at = Some(now);
        debug!(recipient_id = %recipient_id, ?status, "Recipient terminated");
        Ok(())
    }

    pub fn get(&self, recipient_id: Uuid) -> Option<CampaignRecipient> {
        self.recipients.get(&recipient_id).map(|r| r.value().clone())
    }

    pub fn for_pair(&self, campaign_id: Uuid, customer_id: Uuid) -> Option<CampaignRecipient> {
        self.by_pair
            .get(&(campaign_id, customer_id))
            .and_then(|id| self.get(*id))
    }

    /// All recipients of a campaign, enrollment order.
    pub fn for_campaign(&self, campaign_id: Uuid) -> Vec<CampaignRecipient> {
        let mut recipients: Vec<CampaignRecipient> = self
            .recipients
            .iter()
            .filter(|r| r.value().campaign_id == campaign_id)
            .map(|r| r.value().clone())
            .collect();
        recipients.sort_by(|a, b| a.enrolled_at.cmp(&b.enrolled_at).then(a.id.cmp(&b.id)));
        recipients
    }

    /// ACTIVE recipients of a campaign, enrollment order.
    pub fn active_for_campaign(&self, campaign_id: Uuid) -> Vec<CampaignRecipient> {
        self.for_campaign(campaign_id)
            .into_iter()
            .filter(|r| r.status == RecipientStatus::Active)
            .collect()
    }
}
