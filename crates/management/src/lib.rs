//! Campaign management: lifecycle, analytics, and the service facade.

pub mod analytics;
pub mod campaigns;
pub mod models;
pub mod service;

pub use analytics::{AnalyticsAggregator, CampaignAnalytics, MessageCounts, RecipientCounts};
pub use campaigns::CampaignStore;
pub use models::{AuditAction, AuditLogEntry, CreateCampaignRequest, UpdateCampaignRequest};
pub use service::CampaignService;
