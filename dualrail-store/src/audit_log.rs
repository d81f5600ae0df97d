//! Append-only administrative trail, written by adjustments and other
//! actions the pipeline takes on a customer's behalf.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dualrail_core::model::AuditLog;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreError;

#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn record(
        &self,
        ts: DateTime<Utc>,
        actor: &str,
        action: &str,
        subject: &str,
        details: Option<Value>,
    ) -> Result<AuditLog, StoreError>;

    async fn list(&self, subject: Option<&str>, limit: Option<usize>) -> Result<Vec<AuditLog>, StoreError>;
}

#[async_trait]
impl<T: AuditLogStore + ?Sized> AuditLogStore for std::sync::Arc<T> {
    async fn record(
        &self,
        ts: DateTime<Utc>,
        actor: &str,
        action: &str,
        subject: &str,
        details: Option<Value>,
    ) -> Result<AuditLog, StoreError> {
        (**self).record(ts, actor, action, subject, details).await
    }

    async fn list(&self, subject: Option<&str>, limit: Option<usize>) -> Result<Vec<AuditLog>, StoreError> {
        (**self).list(subject, limit).await
    }
}

pub struct InMemoryAuditLogStore {
    entries: RwLock<Vec<AuditLog>>,
    next_id: AtomicU64,
}

impl InMemoryAuditLogStore {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()), next_id: AtomicU64::new(1) }
    }
}

impl Default for InMemoryAuditLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLogStore for InMemoryAuditLogStore {
    async fn record(
        &self,
        ts: DateTime<Utc>,
        actor: &str,
        action: &str,
        subject: &str,
        details: Option<Value>,
    ) -> Result<AuditLog, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = AuditLog {
            id,
            ts,
            actor: actor.to_string(),
            action: action.to_string(),
            subject: subject.to_string(),
            details,
        };
        self.entries.write().push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, subject: Option<&str>, limit: Option<usize>) -> Result<Vec<AuditLog>, StoreError> {
        let entries = self.entries.read();
        let mut matched: Vec<AuditLog> = entries
            .iter()
            .filter(|e| subject.map(|s| e.subject == s).unwrap_or(true))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.id);
        matched.reverse();
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
