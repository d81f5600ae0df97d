//! Storage of `OutcomeVerification` records. Pure persistence; the pending
//! -> verified/reversed lifecycle rules live in `verifier`.

use std::collections::HashMap;

use async_trait::async_trait;
use dualrail_core::model::OutcomeVerification;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::VerificationError;

#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn insert(&self, record: OutcomeVerification) -> Result<(), VerificationError>;
    async fn get(&self, id: Uuid) -> Option<OutcomeVerification>;
    async fn replace(&self, record: OutcomeVerification) -> Result<(), VerificationError>;
    async fn all(&self) -> Vec<OutcomeVerification>;
}

#[async_trait]
impl<T: OutcomeStore + ?Sized> OutcomeStore for std::sync::Arc<T> {
    async fn insert(&self, record: OutcomeVerification) -> Result<(), VerificationError> {
        (**self).insert(record).await
    }

    async fn get(&self, id: Uuid) -> Option<OutcomeVerification> {
        (**self).get(id).await
    }

    async fn replace(&self, record: OutcomeVerification) -> Result<(), VerificationError> {
        (**self).replace(record).await
    }

    async fn all(&self) -> Vec<OutcomeVerification> {
        (**self).all().await
    }
}

#[derive(Default)]
pub struct InMemoryOutcomeStore {
    records: RwLock<HashMap<Uuid, OutcomeVerification>>,
}

impl InMemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutcomeStore for InMemoryOutcomeStore {
    async fn insert(&self, record: OutcomeVerification) -> Result<(), VerificationError> {
        self.records.write().insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Option<OutcomeVerification> {
        self.records.read().get(&id).cloned()
    }

    async fn replace(&self, record: OutcomeVerification) -> Result<(), VerificationError> {
        let mut records = self.records.write();
        if !records.contains_key(&record.id) {
            return Err(VerificationError::NotFound(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn all(&self) -> Vec<OutcomeVerification> {
        self.records.read().values().cloned().collect()
    }
}
