//! Management request types and the audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use optireach_core::types::{CampaignType, DripConfig, SegmentConfig};

// ─── Campaign requests ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub campaign_type: CampaignType,
    #[serde(default)]
    pub segment: Option<SegmentConfig>,
    #[serde(default)]
    pub config: DripConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub campaign_type: Option<CampaignType>,
    pub segment: Option<SegmentConfig>,
    pub config: Option<DripConfig>,
}

// ─── Audit log ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Activate,
    Pause,
    Archive,
    Enroll,
    Remove,
    TriggerRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
