//! Campaign store and lifecycle transitions.
//!
//! Production: replace with the practice database behind the same surface.
//! Status changes follow a fixed state machine:
//! DRAFT → ACTIVE ⇄ PAUSED → ARCHIVED, with ARCHIVED terminal.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::types::{Campaign, CampaignStatus};
use optireach_segmentation::SegmentEvaluator;

use crate::models::{AuditAction, AuditLogEntry, CreateCampaignRequest, UpdateCampaignRequest};

fn transition_allowed(from: CampaignStatus, to: CampaignStatus) -> bool {
    use CampaignStatus::*;
    matches!(
        (from, to),
        (Draft, Active)
            | (Paused, Active)
            | (Active, Paused)
            | (Draft, Archived)
            | (Active, Archived)
            | (Paused, Archived)
    )
}

/// Thread-safe campaign store with an audit trail of every mutation.
pub struct CampaignStore {
    campaigns: DashMap<Uuid, Campaign>,
    audit_log: DashMap<Uuid, AuditLogEntry>,
    evaluator: SegmentEvaluator,
}

impl CampaignStore {
    pub fn new() -> Self {
        Self {
            campaigns: DashMap::new(),
            audit_log: DashMap::new(),
            evaluator: SegmentEvaluator::default(),
        }
    }

    // ─── CRUD ──────────────────────────────────────────────────────────────

    pub fn create(&self, req: CreateCampaignRequest, user: &str) -> CampaignResult<Campaign> {
        if req.name.trim().is_empty() {
            return Err(CampaignError::Validation(
                "Campaign name is required".to_string(),
            ));
        }
        req.config.validate()?;
        if let Some(segment) = &req.segment {
            self.evaluator.validate(segment)?;
        }

        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: req.name,
            campaign_type: req.campaign_type,
            status: CampaignStatus::Draft,
            segment: req.segment,
            config: req.config,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        };
        info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign created");
        self.campaigns.insert(campaign.id, campaign.clone());
        self.log_audit(
            user,
            AuditAction::Create,
            "campaign",
            &campaign.id.to_string(),
            serde_json::json!({"name": &campaign.name}),
        );
        Ok(campaign)
    }

    pub fn update(
        &self,
        id: Uuid,
        req: UpdateCampaignRequest,
        user: &str,
    ) -> CampaignResult<Campaign> {
        if let Some(config) = &req.config {
            config.validate()?;
        }
        if let Some(segment) = &req.segment {
            self.evaluator.validate(segment)?;
        }

        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {id} not found")))?;
        let c = entry.value_mut();
        if let Some(name) = req.name {
            if name.trim().is_empty() {
                return Err(CampaignError::Validation(
                    "Campaign name is required".to_string(),
                ));
            }
            c.name = name;
        }
        if let Some(campaign_type) = req.campaign_type {
            c.campaign_type = campaign_type;
        }
        if let Some(segment) = req.segment {
            c.segment = Some(segment);
        }
        if let Some(config) = req.config {
            c.config = config;
        }
        c.updated_at = Utc::now();
        self.log_audit(
            user,
            AuditAction::Update,
            "campaign",
            &id.to_string(),
            serde_json::json!({}),
        );
        Ok(c.clone())
    }

    /// Hard delete. Refused while the campaign is ACTIVE — pause or archive
    /// first.
    pub fn delete(&self, id: Uuid, user: &str) -> CampaignResult<()> {
        {
            let entry = self
                .campaigns
                .get(&id)
                .ok_or_else(|| CampaignError::NotFound(format!("Campaign {id} not found")))?;
            if entry.value().status == CampaignStatus::Active {
                return Err(CampaignError::Validation(
                    "Cannot delete an active campaign".to_string(),
                ));
            }
        }
        self.campaigns.remove(&id);
        info!(campaign_id = %id, "Campaign deleted");
        self.log_audit(
            user,
            AuditAction::Delete,
            "campaign",
            &id.to_string(),
            serde_json::json!({}),
        );
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Campaign> {
        self.campaigns.get(&id).map(|r| r.value().clone())
    }

    pub fn list(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> =
            self.campaigns.iter().map(|r| r.value().clone()).collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────

    /// DRAFT/PAUSED → ACTIVE. Sets `next_run_at` so an external scheduler
    /// picks the campaign up immediately.
    pub fn activate(&self, id: Uuid, user: &str, now: DateTime<Utc>) -> CampaignResult<Campaign> {
        self.transition(id, CampaignStatus::Active, AuditAction::Activate, user)?;
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {id} not found")))?;
        entry.value_mut().next_run_at = Some(now);
        Ok(entry.value().clone())
    }

    pub fn pause(&self, id: Uuid, user: &str) -> CampaignResult<Campaign> {
        self.transition(id, CampaignStatus::Paused, AuditAction::Pause, user)
    }

    /// Any non-archived status → ARCHIVED. Terminal: archived campaigns are
    /// excluded from processing and have no outgoing transitions.
    pub fn archive(&self, id: Uuid, user: &str) -> CampaignResult<Campaign> {
        self.transition(id, CampaignStatus::Archived, AuditAction::Archive, user)?;
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {id} not found")))?;
        entry.value_mut().next_run_at = None;
        Ok(entry.value().clone())
    }

    /// Persist the cadence computed by the run processor.
    pub fn set_next_run_at(&self, id: Uuid, at: DateTime<Utc>) -> CampaignResult<()> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {id} not found")))?;
        entry.value_mut().next_run_at = Some(at);
        Ok(())
    }

    fn transition(
        &self,
        id: Uuid,
        to: CampaignStatus,
        action: AuditAction,
        user: &str,
    ) -> CampaignResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {id} not found")))?;
        let c = entry.value_mut();
        if !transition_allowed(c.status, to) {
            return Err(CampaignError::InvalidTransition(format!(
                "{:?} -> {:?}",
                c.status, to
            )));
        }
        info!(campaign_id = %id, from = ?c.status, to = ?to, "Campaign status changed");
        c.status = to;
        c.updated_at = Utc::now();
        let snapshot = c.clone();
        drop(entry);
        self.log_audit(
            user,
            action,
            "campaign",
            &id.to_string(),
            serde_json::json!({"status": to}),
        );
        Ok(snapshot)
    }

    // ─── Audit log ─────────────────────────────────────────────────────────

    pub fn audit_log(&self) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> =
            self.audit_log.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub(crate) fn log_audit(
        &self,
        user: &str,
        action: AuditAction,
        resource_type: &str,
        resource_id: &str,
        details: serde_json::Value,
    ) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            user: user.to_string(),
            action,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
        };
        self.audit_log.insert(entry.id, entry);
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optireach_core::types::{CampaignType, Channel, DripConfig, DripStep};

    fn create_request(name: &str) -> CreateCampaignRequest {
        CreateCampaignRequest {
            name: name.to_string(),
            campaign_type: CampaignType::DripSequence,
            segment: None,
            config: DripConfig {
                steps: vec![DripStep {
                    step_index: 0,
                    delay_days: 0,
                    channel: Channel::Sms,
                    template_id: None,
                    body: Some("Hi {{firstName}}".to_string()),
                }],
                ..DripConfig::default()
            },
        }
    }

    #[test]
    fn test_create_defaults_to_draft() {
        let store = CampaignStore::new();
        let campaign = store.create(create_request("Recall"), "tess").unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert!(campaign.next_run_at.is_none());
    }

    #[test]
    fn test_create_requires_name() {
        let store = CampaignStore::new();
        assert!(store.create(create_request("  "), "tess").is_err());
    }

    #[test]
    fn test_create_validates_step_order() {
        let store = CampaignStore::new();
        let mut req = create_request("Recall");
        req.config.steps.push(DripStep {
            step_index: 0,
            delay_days: 3,
            channel: Channel::Sms,
            template_id: None,
            body: Some("again".to_string()),
        });
        assert!(store.create(req, "tess").is_err());
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let store = CampaignStore::new();
        let now = Utc::now();
        let campaign = store.create(create_request("Recall"), "tess").unwrap();

        let active = store.activate(campaign.id, "tess", now).unwrap();
        assert_eq!(active.status, CampaignStatus::Active);
        assert_eq!(active.next_run_at, Some(now));

        let paused = store.pause(campaign.id, "tess").unwrap();
        assert_eq!(paused.status, CampaignStatus::Paused);

        let active = store.activate(campaign.id, "tess", now).unwrap();
        assert_eq!(active.status, CampaignStatus::Active);

        let archived = store.archive(campaign.id, "tess").unwrap();
        assert_eq!(archived.status, CampaignStatus::Archived);
        assert!(archived.next_run_at.is_none());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let store = CampaignStore::new();
        let now = Utc::now();
        let campaign = store.create(create_request("Recall"), "tess").unwrap();

        // Draft cannot pause.
        assert!(matches!(
            store.pause(campaign.id, "tess"),
            Err(CampaignError::InvalidTransition(_))
        ));

        // Archived is terminal.
        store.archive(campaign.id, "tess").unwrap();
        assert!(store.activate(campaign.id, "tess", now).is_err());
        assert!(store.pause(campaign.id, "tess").is_err());
        assert!(store.archive(campaign.id, "tess").is_err());
    }

    #[test]
    fn test_delete_refused_while_active() {
        let store = CampaignStore::new();
        let now = Utc::now();
        let campaign = store.create(create_request("Recall"), "tess").unwrap();
        store.activate(campaign.id, "tess", now).unwrap();

        assert!(store.delete(campaign.id, "tess").is_err());
        store.pause(campaign.id, "tess").unwrap();
        store.delete(campaign.id, "tess").unwrap();
        assert!(store.get(campaign.id).is_none());
    }

    #[test]
    fn test_partial_update() {
        let store = CampaignStore::new();
        let campaign = store.create(create_request("Recall"), "tess").unwrap();
        let updated = store
            .update(
                campaign.id,
                UpdateCampaignRequest {
                    name: Some("Annual Recall".to_string()),
                    ..UpdateCampaignRequest::default()
                },
                "tess",
            )
            .unwrap();
        assert_eq!(updated.name, "Annual Recall");
        assert_eq!(updated.campaign_type, CampaignType::DripSequence);
    }

    #[test]
    fn test_audit_trail_records_mutations() {
        let store = CampaignStore::new();
        let now = Utc::now();
        let campaign = store.create(create_request("Recall"), "tess").unwrap();
        store.activate(campaign.id, "tess", now).unwrap();

        let log = store.audit_log();
        assert_eq!(log.len(), 2);
        assert!(log.iter().any(|e| e.action == AuditAction::Create));
        assert!(log.iter().any(|e| e.action == AuditAction::Activate));
        assert!(log.iter().all(|e| e.user == "tess"));
    }
}
