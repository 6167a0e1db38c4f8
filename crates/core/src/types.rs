//! Campaign engine domain types — customers, campaigns, recipients, runs,
//! messages, and templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};

// ─── Customer ──────────────────────────────────────────────────────────────

/// A practice customer as seen by the campaign engine. Record management
/// (exams, prescriptions, orders) lives in the host application; this is the
/// projection segments evaluate against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub age: Option<u32>,
    /// Most recent eye exam, if any. Drives recall segments.
    pub last_exam_at: Option<DateTime<Utc>>,
    pub total_orders: u64,
    pub total_spend: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Customers flagged here are excluded from any segment with
    /// `exclude_marketing_opt_out` set, regardless of other conditions.
    #[serde(default)]
    pub marketing_opt_out: bool,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ─── Channel ───────────────────────────────────────────────────────────────

/// Delivery channel for a campaign step or template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Email,
}

// ─── Segment configuration ─────────────────────────────────────────────────

/// Declarative customer filter attached to a campaign. Consulted only when
/// `enrollment_mode` is automatic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    pub logic: SegmentLogic,
    pub conditions: Vec<SegmentCondition>,
    #[serde(default)]
    pub exclude_marketing_opt_out: bool,
}

/// How a segment's conditions combine — all of them, or any of them.
/// No mixed grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentLogic {
    And,
    Or,
}

/// A single field condition. `field` must name one of the allow-listed
/// customer fields; unknown fields are a validation error, never silently
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentCondition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    InList,
    NotInList,
    IsSet,
    IsNotSet,
}

// ─── Campaign ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub campaign_type: CampaignType,
    pub status: CampaignStatus,
    #[serde(default)]
    pub segment: Option<SegmentConfig>,
    pub config: DripConfig,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    OneTimeBlast,
    RecurringReminder,
    DripSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

/// Drip parameters: the ordered message steps and the rules that govern
/// enrollment, conversion, and re-enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripConfig {
    pub steps: Vec<DripStep>,
    #[serde(default)]
    pub stop_on_conversion: bool,
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: u32,
    #[serde(default)]
    pub enrollment_mode: EnrollmentMode,
    #[serde(default)]
    pub conversion: ConversionRule,
}

fn default_cooldown_days() -> u32 {
    30
}

impl Default for DripConfig {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            stop_on_conversion: false,
            cooldown_days: default_cooldown_days(),
            enrollment_mode: EnrollmentMode::Manual,
            conversion: ConversionRule::default(),
        }
    }
}

impl DripConfig {
    /// Structural validation: step indexes strictly increasing, every step
    /// carries either a template reference or an inline body.
    pub fn validate(&self) -> CampaignResult<()> {
        let mut last_index: Option<u32> = None;
        for step in &self.steps {
            if let Some(prev) = last_index {
                if step.step_index <= prev {
                    return Err(CampaignError::Validation(format!(
                        "Step indexes must be strictly increasing (step {} follows {})",
                        step.step_index, prev
                    )));
                }
            }
            if step.template_id.is_none() && step.body.as_deref().map_or(true, str::is_empty) {
                return Err(CampaignError::Validation(format!(
                    "Step {} needs a template reference or an inline body",
                    step.step_index
                )));
            }
            last_index = Some(step.step_index);
        }
        Ok(())
    }

    /// The highest step index, if any steps are configured.
    pub fn final_step_index(&self) -> Option<u32> {
        self.steps.last().map(|s| s.step_index)
    }
}

/// One message in a drip sequence. `delay_days` is measured from the
/// recipient's enrollment for every step, not from the previous step, so a
/// late run never shifts the rest of the schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripStep {
    pub step_index: u32,
    pub delay_days: u32,
    pub channel: Channel,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentMode {
    #[default]
    Manual,
    Automatic,
}

/// What counts as a conversion for a campaign's recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ConversionRule {
    /// The customer placed an order after enrolling, optionally above a
    /// minimum total.
    OrderPlaced { min_total: Option<f64> },
}

impl Default for ConversionRule {
    fn default() -> Self {
        ConversionRule::OrderPlaced { min_total: None }
    }
}

// ─── Recipient ─────────────────────────────────────────────────────────────

/// The join of a campaign and a customer, tracking that customer's progress
/// through the campaign's steps. Unique per `(campaign_id, customer_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub customer_id: Uuid,
    pub status: RecipientStatus,
    pub enrolled_at: DateTime<Utc>,
    /// −1 until the first step has been sent.
    pub last_step_index: i32,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Set when the recipient reaches a terminal status; the cooldown clock
    /// for re-enrollment starts here.
    pub terminated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Active,
    Completed,
    Converted,
    Removed,
}

impl RecipientStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RecipientStatus::Active)
    }
}

// ─── Run ───────────────────────────────────────────────────────────────────

/// One processing pass over a campaign's recipients. Immutable once
/// recorded; the audit and analytics trail of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRun {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub processed: u64,
    pub enrolled: u64,
    pub messages_sent: u64,
    pub converted: u64,
    pub completed: u64,
    pub failed: u64,
}

// ─── Message ───────────────────────────────────────────────────────────────

/// One dispatch attempt. Created PENDING alongside the decision to send;
/// the transport's delivery result updates it asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub recipient_id: Uuid,
    pub customer_id: Uuid,
    pub channel: Channel,
    pub to: String,
    pub body: String,
    pub status: MessageStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

// ─── Template ──────────────────────────────────────────────────────────────

/// Reusable message template with `{{placeholder}}` tokens, owned
/// independently of any single campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub name: String,
    pub channel: Channel,
    pub subject: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Caller context ────────────────────────────────────────────────────────

/// Identity of the caller, threaded explicitly through every service
/// operation instead of looked up from ambient session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerContext {
    pub user: String,
    pub role: CallerRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Admin,
    Staff,
}

impl CallerContext {
    pub fn admin(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: CallerRole::Admin,
        }
    }

    pub fn staff(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: CallerRole::Staff,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }
}
