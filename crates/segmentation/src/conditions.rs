//! Condition validation and comparison logic for segment evaluation.
//!
//! Fields are drawn from a fixed allow-list of customer attributes; the
//! evaluator composes predicates off that list instead of interpolating
//! free-form field names into a query.

use chrono::{DateTime, Utc};

use optireach_core::error::{CampaignError, CampaignResult};
use optireach_core::types::{ConditionOperator, Customer, SegmentCondition, SegmentConfig};

/// The kind of value a customer field holds, used to check that an operator
/// makes sense for the field it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
    Flag,
    TagList,
}

/// Allow-listed segment fields and their kinds.
const SEGMENT_FIELDS: &[(&str, FieldKind)] = &[
    ("first_name", FieldKind::Text),
    ("last_name", FieldKind::Text),
    ("email", FieldKind::Text),
    ("phone", FieldKind::Text),
    ("city", FieldKind::Text),
    ("state", FieldKind::Text),
    ("age", FieldKind::Numeric),
    ("last_exam_days", FieldKind::Numeric),
    ("total_orders", FieldKind::Numeric),
    ("total_spend", FieldKind::Numeric),
    ("tags", FieldKind::TagList),
    ("marketing_opt_out", FieldKind::Flag),
];

pub fn field_kind(field: &str) -> Option<FieldKind> {
    SEGMENT_FIELDS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, kind)| *kind)
}

/// Validate a full segment config. Unknown fields, operators that don't fit
/// the field's kind, and values of the wrong shape are all rejected here,
/// before any evaluation happens.
pub fn validate_config(config: &SegmentConfig) -> CampaignResult<()> {
    for condition in &config.conditions {
        validate_condition(condition)?;
    }
    Ok(())
}

fn validate_condition(condition: &SegmentCondition) -> CampaignResult<()> {
    let kind = field_kind(&condition.field).ok_or_else(|| {
        CampaignError::Validation(format!("Unknown segment field '{}'", condition.field))
    })?;

    use ConditionOperator::*;
    let operator_ok = match kind {
        FieldKind::Text => matches!(
            condition.operator,
            Equals | NotEquals | Contains | InList | NotInList | IsSet | IsNotSet
        ),
        FieldKind::Numeric => matches!(
            condition.operator,
            Equals
                | NotEquals
                | GreaterThan
                | GreaterThanOrEqual
                | LessThan
                | LessThanOrEqual
                | InList
                | NotInList
                | IsSet
                | IsNotSet
        ),
        FieldKind::Flag => matches!(condition.operator, Equals | NotEquals),
        FieldKind::TagList => matches!(condition.operator, Contains | IsSet | IsNotSet),
    };
    if !operator_ok {
        return Err(CampaignError::Validation(format!(
            "Operator {:?} is not valid for field '{}'",
            condition.operator, condition.field
        )));
    }

    let value_ok = match condition.operator {
        IsSet | IsNotSet => condition.value.is_null(),
        InList | NotInList => condition.value.is_array(),
        GreaterThan | GreaterThanOrEqual | LessThan | LessThanOrEqual => {
            condition.value.is_number()
        }
        Contains => condition.value.is_string(),
        Equals | NotEquals => match kind {
            FieldKind::Text => condition.value.is_string() || condition.value.is_null(),
            FieldKind::Numeric => condition.value.is_number(),
            FieldKind::Flag => condition.value.is_boolean(),
            FieldKind::TagList => false,
        },
    };
    if !value_ok {
        return Err(CampaignError::Validation(format!(
            "Value {} does not fit operator {:?} on field '{}'",
            condition.value, condition.operator, condition.field
        )));
    }

    Ok(())
}

/// Project a customer attribute to a JSON value for comparison. `now` anchors
/// the derived `last_exam_days` field so evaluation stays deterministic for
/// a given pass.
pub fn field_value(customer: &Customer, field: &str, now: DateTime<Utc>) -> serde_json::Value {
    match field {
        "first_name" => serde_json::Value::String(customer.first_name.clone()),
        "last_name" => serde_json::Value::String(customer.last_name.clone()),
        "email" => opt_text(&customer.email),
        "phone" => opt_text(&customer.phone),
        "city" => opt_text(&customer.city),
        "state" => opt_text(&customer.state),
        "age" => customer
            .age
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "last_exam_days" => customer
            .last_exam_at
            .map(|at| serde_json::Value::from(now.signed_duration_since(at).num_days()))
            .unwrap_or(serde_json::Value::Null),
        "total_orders" => serde_json::Value::from(customer.total_orders),
        "total_spend" => serde_json::Value::from(customer.total_spend),
        "tags" => serde_json::Value::Array(
            customer
                .tags
                .iter()
                .map(|t| serde_json::Value::String(t.clone()))
                .collect(),
        ),
        "marketing_opt_out" => serde_json::Value::Bool(customer.marketing_opt_out),
        _ => serde_json::Value::Null,
    }
}

fn opt_text(value: &Option<String>) -> serde_json::Value {
    value
        .as_ref()
        .map(|v| serde_json::Value::String(v.clone()))
        .unwrap_or(serde_json::Value::Null)
}

/// Evaluate one condition against an already-projected field value. Assumes
/// the condition passed `validate_condition`.
#[allow(clippy::unnecessary_map_or)]
pub fn condition_matches(actual: &serde_json::Value, condition: &SegmentCondition) -> bool {
    let expected = &condition.value;
    match condition.operator {
        ConditionOperator::Equals => actual == expected,
        ConditionOperator::NotEquals => actual != expected,
        ConditionOperator::GreaterThan => {
            numeric_cmp(actual, expected).map_or(false, |o| o == std::cmp::Ordering::Greater)
        }
        ConditionOperator::GreaterThanOrEqual => {
            numeric_cmp(actual, expected).map_or(false, |o| o != std::cmp::Ordering::Less)
        }
        ConditionOperator::LessThan => {
            numeric_cmp(actual, expected).map_or(false, |o| o == std::cmp::Ordering::Less)
        }
        ConditionOperator::LessThanOrEqual => {
            numeric_cmp(actual, expected).map_or(false, |o| o != std::cmp::Ordering::Greater)
        }
        ConditionOperator::Contains => match actual {
            serde_json::Value::String(s) => {
                expected.as_str().map_or(false, |e| s.contains(e))
            }
            serde_json::Value::Array(items) => items.contains(expected),
            _ => false,
        },
        ConditionOperator::InList => expected
            .as_array()
            .map_or(false, |list| list.contains(actual)),
        ConditionOperator::NotInList => expected
            .as_array()
            .map_or(true, |list| !list.contains(actual)),
        ConditionOperator::IsSet => !actual.is_null(),
        ConditionOperator::IsNotSet => actual.is_null(),
    }
}

fn numeric_cmp(a: &serde_json::Value, b: &serde_json::Value) -> Option<std::cmp::Ordering> {
    let a_num = a.as_f64()?;
    let b_num = b.as_f64()?;
    a_num.partial_cmp(&b_num)
}
