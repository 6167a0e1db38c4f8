//! Conversion detection.
//!
//! Order history lives in the host application behind the `OrderLedger`
//! trait. The run processor captures a snapshot at pass start so every
//! conversion decision inside one run sees the same data, even if orders
//! land mid-run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use optireach_core::types::{CampaignRecipient, ConversionRule};

/// An order as seen by the campaign engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub total: f64,
    pub placed_at: DateTime<Utc>,
}

/// Read-only view of customer order history.
pub trait OrderLedger: Send + Sync {
    fn orders_for(&self, customer_id: Uuid) -> Vec<OrderRecord>;
}

/// Thread-safe in-memory ledger for development and testing.
#[derive(Default)]
pub struct InMemoryOrderLedger {
    orders: DashMap<Uuid, Vec<OrderRecord>>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
        }
    }

    pub fn record_order(&self, customer_id: Uuid, total: f64, placed_at: DateTime<Utc>) {
        self.orders.entry(customer_id).or_default().push(OrderRecord {
            id: Uuid::new_v4(),
            customer_id,
            total,
            placed_at,
        });
    }
}

impl OrderLedger for InMemoryOrderLedger {
    fn orders_for(&self, customer_id: Uuid) -> Vec<OrderRecord> {
        self.orders
            .get(&customer_id)
            .map(|o| o.clone())
            .unwrap_or_default()
    }
}

/// Point-in-time order data for one processing pass.
#[derive(Debug, Clone)]
pub struct ConversionSnapshot {
    pub taken_at: DateTime<Utc>,
    orders: HashMap<Uuid, Vec<OrderRecord>>,
}

impl ConversionSnapshot {
    /// Read the ledger once for the given customers.
    pub fn capture(
        ledger: &dyn OrderLedger,
        customer_ids: impl IntoIterator<Item = Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut orders = HashMap::new();
        for customer_id in customer_ids {
            orders
                .entry(customer_id)
                .or_insert_with(|| ledger.orders_for(customer_id));
        }
        Self {
            taken_at: now,
            orders,
        }
    }

    fn orders_for(&self, customer_id: Uuid) -> &[OrderRecord] {
        self.orders
            .get(&customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Decides whether a recipient has satisfied the campaign's conversion rule.
pub struct ConversionChecker;

impl ConversionChecker {
    /// True when the snapshot contains a qualifying order placed strictly
    /// after the recipient enrolled.
    pub fn is_converted(
        snapshot: &ConversionSnapshot,
        recipient: &CampaignRecipient,
        rule: &ConversionRule,
    ) -> bool {
        match rule {
            ConversionRule::OrderPlaced { min_total } => snapshot
                .orders_for(recipient.customer_id)
                .iter()
                .any(|order| {
                    order.placed_at > recipient.enrolled_at
                        && min_total.map_or(true, |min| order.total >= min)
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use optireach_core::types::RecipientStatus;

    fn recipient(customer_id: Uuid, enrolled_at: DateTime<Utc>) -> CampaignRecipient {
        CampaignRecipient {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            customer_id,
            status: RecipientStatus::Active,
            enrolled_at,
            last_step_index: -1,
            last_message_at: None,
            terminated_at: None,
        }
    }

    #[test]
    fn test_order_after_enrollment_converts() {
        let ledger = InMemoryOrderLedger::new();
        let customer_id = Uuid::new_v4();
        let now = Utc::now();
        ledger.record_order(customer_id, 250.0, now - Duration::days(1));

        let recipient = recipient(customer_id, now - Duration::days(5));
        let snapshot = ConversionSnapshot::capture(&ledger, [customer_id], now);
        assert!(ConversionChecker::is_converted(
            &snapshot,
            &recipient,
            &ConversionRule::default()
        ));
    }

    #[test]
    fn test_order_before_enrollment_does_not_convert() {
        let ledger = InMemoryOrderLedger::new();
        let customer_id = Uuid::new_v4();
        let now = Utc::now();
        ledger.record_order(customer_id, 250.0, now - Duration::days(10));

        let recipient = recipient(customer_id, now - Duration::days(5));
        let snapshot = ConversionSnapshot::capture(&ledger, [customer_id], now);
        assert!(!ConversionChecker::is_converted(
            &snapshot,
            &recipient,
            &ConversionRule::default()
        ));
    }

    #[test]
    fn test_min_total_filters_small_orders() {
        let ledger = InMemoryOrderLedger::new();
        let customer_id = Uuid::new_v4();
        let now = Utc::now();
        ledger.record_order(customer_id, 40.0, now - Duration::days(1));

        let recipient = recipient(customer_id, now - Duration::days(5));
        let snapshot = ConversionSnapshot::capture(&ledger, [customer_id], now);
        let rule = ConversionRule::OrderPlaced {
            min_total: Some(100.0),
        };
        assert!(!ConversionChecker::is_converted(&snapshot, &recipient, &rule));

        ledger.record_order(customer_id, 150.0, now - Duration::hours(2));
        let snapshot = ConversionSnapshot::capture(&ledger, [customer_id], now);
        assert!(ConversionChecker::is_converted(&snapshot, &recipient, &rule));
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let ledger = InMemoryOrderLedger::new();
        let customer_id = Uuid::new_v4();
        let now = Utc::now();

        let recipient = recipient(customer_id, now - Duration::days(5));
        let snapshot = ConversionSnapshot::capture(&ledger, [customer_id], now);

        // An order landing after the snapshot is invisible to this pass.
        ledger.record_order(customer_id, 300.0, now);
        assert!(!ConversionChecker::is_converted(
            &snapshot,
            &recipient,
            &ConversionRule::default()
        ));
    }
}
