//! Per-customer `RatingPolicy` lookup. Policy administration (plan
//! assignment, pricing-tier authoring) lives outside this pipeline, same as
//! `CustomerDirectory`; this is the seam the rating cycles read through.

use std::collections::HashMap;

use async_trait::async_trait;
use dualrail_rating::RatingPolicy;
use parking_lot::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait PolicyDirectory: Send + Sync {
    async fn policy_for(&self, customer_id: Uuid) -> Option<RatingPolicy>;
}

/// A directory backed by a fixed in-memory map, for tests and for wiring a
/// pipeline run without a real plan-administration system.
#[derive(Default)]
pub struct InMemoryPolicyDirectory {
    policies: RwLock<HashMap<Uuid, RatingPolicy>>,
}

impl InMemoryPolicyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, customer_id: Uuid, policy: RatingPolicy) {
        self.policies.write().insert(customer_id, policy);
    }
}

#[async_trait]
impl PolicyDirectory for InMemoryPolicyDirectory {
    async fn policy_for(&self, customer_id: Uuid) -> Option<RatingPolicy> {
        self.policies.read().get(&customer_id).cloned()
    }
}
