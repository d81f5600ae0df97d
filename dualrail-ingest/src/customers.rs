//! Minimal customer-existence check the normalizer depends on. Customer
//! administration itself lives outside this pipeline (spec §3: "created
//! externally"); this trait is the seam the normalizer calls through.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use uuid::Uuid;

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn exists(&self, customer_id: Uuid) -> bool;

    /// All customers the scheduler should sweep on a per-customer duty
    /// cycle (daily/monthly rating, anomaly scan). Order is unspecified.
    async fn list_active(&self) -> Vec<Uuid>;
}

/// A directory backed by a fixed in-memory set, for tests and for wiring
/// together a pipeline run without a real customer-administration system.
pub struct InMemoryCustomerDirectory {
    known: RwLock<HashSet<Uuid>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self { known: RwLock::new(HashSet::new()) }
    }

    pub fn with_customers(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self { known: RwLock::new(ids.into_iter().collect()) }
    }

    pub fn register(&self, customer_id: Uuid) {
        self.known.write().insert(customer_id);
    }
}

impl Default for InMemoryCustomerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn exists(&self, customer_id: Uuid) -> bool {
        self.known.read().contains(&customer_id)
    }

    async fn list_active(&self) -> Vec<Uuid> {
        self.known.read().iter().copied().collect()
    }
}
