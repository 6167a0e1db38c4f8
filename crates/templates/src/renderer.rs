//! Placeholder rendering for message bodies.
//!
//! Templates use `{{token}}` placeholders filled from the recipient's
//! attributes. Rendering is a pure function of the body and context; an
//! unknown or unterminated placeholder is a render error, which the run
//! processor records as a per-recipient failure.

use std::collections::HashMap;

use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::types::Customer;

/// Token values available to a template. Tokens use the camelCase names
/// template authors see in the editor (`{{firstName}}`, `{{campaignName}}`).
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    values: HashMap<String, String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.values.insert(token.into(), value.into());
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }

    /// Standard context for a campaign message to a customer. Absent
    /// attributes render as empty strings.
    pub fn for_customer(customer: &Customer, campaign_name: &str) -> Self {
        let mut ctx = Self::new();
        ctx.set("firstName", customer.first_name.clone());
        ctx.set("lastName", customer.last_name.clone());
        ctx.set("fullName", customer.full_name());
        ctx.set("email", customer.email.clone().unwrap_or_default());
        ctx.set("phone", customer.phone.clone().unwrap_or_default());
        ctx.set("city", customer.city.clone().unwrap_or_default());
        ctx.set("state", customer.state.clone().unwrap_or_default());
        ctx.set("campaignName", campaign_name.to_string());
        ctx
    }
}

/// Fill every `{{token}}` in `body` from the context.
pub fn render(body: &str, ctx: &RenderContext) -> CampaignResult<String> {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            CampaignError::Render("Unterminated placeholder in template body".to_string())
        })?;
        let token = after[..end].trim();
        match ctx.get(token) {
            Some(value) => out.push_str(value),
            None => {
                return Err(CampaignError::Render(format!(
                    "Unknown placeholder '{{{{{token}}}}}'"
                )))
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}
