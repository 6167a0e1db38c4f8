//! Segment evaluator — turns a declarative segment config into a matching
//! predicate over the customer population.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use optireach_core::error::CampaignResult;
use optireach_core::types::{Customer, SegmentConfig, SegmentLogic};

use crate::conditions::{condition_matches, field_value, validate_config};
use crate::directory::CustomerDirectory;

/// Read-only preview of a segment: how many customers match, plus a bounded
/// sample for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentPreview {
    pub count: u64,
    pub sample: Vec<CustomerSummary>,
}

/// Slim customer projection returned in preview samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl From<&Customer> for CustomerSummary {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
        }
    }
}

/// Evaluates segment configs against a `CustomerDirectory`. Stateless apart
/// from the preview sample bound; evaluation never mutates anything.
#[derive(Debug, Clone)]
pub struct SegmentEvaluator {
    preview_sample_size: usize,
}

impl SegmentEvaluator {
    pub fn new(preview_sample_size: usize) -> Self {
        Self {
            preview_sample_size,
        }
    }

    /// Validate a segment config without touching the population.
    pub fn validate(&self, config: &SegmentConfig) -> CampaignResult<()> {
        validate_config(config)
    }

    /// Whether a single customer matches the segment. Assumes the config has
    /// been validated; a missing attribute simply fails its condition.
    pub fn matches(&self, config: &SegmentConfig, customer: &Customer, now: DateTime<Utc>) -> bool {
        if config.exclude_marketing_opt_out && customer.marketing_opt_out {
            return false;
        }
        match config.logic {
            SegmentLogic::And => config
                .conditions
                .iter()
                .all(|c| condition_matches(&field_value(customer, &c.field, now), c)),
            SegmentLogic::Or => config
                .conditions
                .iter()
                .any(|c| condition_matches(&field_value(customer, &c.field, now), c)),
        }
    }

    /// The full matching set, in the directory's stable order. Used by
    /// automatic enrollment during a run.
    pub fn matching_customers(
        &self,
        config: &SegmentConfig,
        directory: &dyn CustomerDirectory,
        now: DateTime<Utc>,
    ) -> CampaignResult<Vec<Customer>> {
        self.validate(config)?;
        let matches: Vec<Customer> = directory
            .all()
            .into_iter()
            .filter(|c| self.matches(config, c, now))
            .collect();
        debug!(matched = matches.len(), "Segment evaluated");
        Ok(matches)
    }

    /// Count plus a bounded sample (first N matches in directory order).
    /// Strictly read-only — never enrolls or mutates state.
    pub fn preview(
        &self,
        config: &SegmentConfig,
        directory: &dyn CustomerDirectory,
        now: DateTime<Utc>,
    ) -> CampaignResult<SegmentPreview> {
        let matches = self.matching_customers(config, directory, now)?;
        let sample = matches
            .iter()
            .take(self.preview_sample_size)
            .map(CustomerSummary::from)
            .collect();
        Ok(SegmentPreview {
            count: matches.len() as u64,
            sample,
        })
    }
}

impl Default for SegmentEvaluator {
    fn default() -> Self {
        Self::new(10)
    }
}
