//! In-memory message template store backed by DashMap.
//!
//! Production: replace with the practice database behind the same surface.

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::types::{Channel, MessageTemplate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub channel: Channel,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub channel: Option<Channel>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Thread-safe template store.
#[derive(Default)]
pub struct TemplateStore {
    templates: DashMap<Uuid, MessageTemplate>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    pub fn create(&self, req: CreateTemplateRequest) -> CampaignResult<MessageTemplate> {
        if req.name.trim().is_empty() {
            return Err(CampaignError::Validation(
                "Template name is required".to_string(),
            ));
        }
        if req.body.trim().is_empty() {
            return Err(CampaignError::Validation(
                "Template body must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let template = MessageTemplate {
            id: Uuid::new_v4(),
            name: req.name,
            channel: req.channel,
            subject: req.subject,
            body: req.body,
            created_at: now,
            updated_at: now,
        };
        info!(template_id = %template.id, name = %template.name, "Template created");
        self.templates.insert(template.id, template.clone());
        Ok(template)
    }

    pub fn update(&self, id: Uuid, req: UpdateTemplateRequest) -> CampaignResult<MessageTemplate> {
        let mut entry = self
            .templates
            .get_mut(&id)
            .ok_or_else(|| CampaignError::NotFound(format!("Template {id} not found")))?;

        let t = entry.value_mut();
        if let Some(name) = req.name {
            if name.trim().is_empty() {
                return Err(CampaignError::Validation(
                    "Template name is required".to_string(),
                ));
            }
            t.name = name;
        }
        if let Some(body) = req.body {
            if body.trim().is_empty() {
                return Err(CampaignError::Validation(
                    "Template body must not be empty".to_string(),
                ));
            }
            t.body = body;
        }
        if let Some(channel) = req.channel {
            t.channel = channel;
        }
        if let Some(subject) = req.subject {
            t.subject = Some(subject);
        }
        t.updated_at = Utc::now();
        Ok(t.clone())
    }

    pub fn delete(&self, id: Uuid) -> CampaignResult<()> {
        self.templates
            .remove(&id)
            .ok_or_else(|| CampaignError::NotFound(format!("Template {id} not found")))?;
        info!(template_id = %id, "Template deleted");
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<MessageTemplate> {
        self.templates.get(&id).map(|r| r.value().clone())
    }

    pub fn list(&self) -> Vec<MessageTemplate> {
        let mut templates: Vec<MessageTemplate> =
            self.templates.iter().map(|r| r.value().clone()).collect();
        templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        templates
    }
}
