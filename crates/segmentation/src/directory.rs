//! Customer directory — the queryable population segments evaluate over.
//!
//! Production: backed by the practice database. The in-memory implementation
//! provides the same surface for development and testing.

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use optireach_core::types::Customer;

/// Abstract, read-only view of the customer population.
pub trait CustomerDirectory: Send + Sync {
    /// All customers in a stable order (oldest first, id as tiebreaker), so
    /// repeated evaluations of the same population are deterministic.
    fn all(&self) -> Vec<Customer>;

    fn get(&self, id: Uuid) -> Option<Customer>;
}

/// Thread-safe in-memory directory backed by DashMap.
#[derive(Default)]
pub struct InMemoryCustomerDirectory {
    customers: DashMap<Uuid, Customer>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
        }
    }

    pub fn upsert(&self, customer: Customer) {
        debug!(customer_id = %customer.id, "Customer upserted");
        self.customers.insert(customer.id, customer);
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

impl CustomerDirectory for InMemoryCustomerDirectory {
    fn all(&self) -> Vec<Customer> {
        let mut customers: Vec<Customer> =
            self.customers.iter().map(|r| r.value().clone()).collect();
        customers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        customers
    }

    fn get(&self, id: Uuid) -> Option<Customer> {
        self.customers.get(&id).map(|r| r.value().clone())
    }
}
