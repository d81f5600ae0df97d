//! Event Store (C2): append-only, idempotent storage of normalized raw events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dualrail_core::model::{NewRawEvent, RawEvent, RawEventType};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

type DedupKey = (Option<String>, Option<String>, RawEventType, DateTime<Utc>);

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert exactly once; a duplicate `(trace_id, span_id, event_type, ts)`
    /// tuple is an idempotent no-op that returns the previously stored event.
    async fn append(&self, event: NewRawEvent) -> Result<RawEvent, StoreError>;

    /// Events ordered by `(ts, id)` ascending, optionally filtered.
    async fn scan(
        &self,
        customer_id: Option<Uuid>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<RawEvent>, StoreError>;

    /// Reclaim space for retention. Safe against concurrent scans of later
    /// timestamps since only events strictly before `ts` are removed.
    async fn delete_before(&self, ts: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for std::sync::Arc<T> {
    async fn append(&self, event: NewRawEvent) -> Result<RawEvent, StoreError> {
        (**self).append(event).await
    }

    async fn scan(
        &self,
        customer_id: Option<Uuid>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<RawEvent>, StoreError> {
        (**self).scan(customer_id, from, to, limit).await
    }

    async fn delete_before(&self, ts: DateTime<Utc>) -> Result<u64, StoreError> {
        (**self).delete_before(ts).await
    }
}

#[derive(Default)]
struct Inner {
    events: HashMap<u64, RawEvent>,
    dedup_index: HashMap<DedupKey, u64>,
}

/// Reference `EventStore` implementation backed by an in-memory map.
///
/// Persistence and schema choice are out of scope for this pipeline; this
/// implementation exists so the rest of the system has something concrete to
/// run against and to test against.
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()), next_id: AtomicU64::new(1) }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: NewRawEvent) -> Result<RawEvent, StoreError> {
        let key = event.dedup_key();
        let mut inner = self.inner.write();
        if let Some(&existing_id) = inner.dedup_index.get(&key) {
            return Ok(inner.events[&existing_id].clone());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = RawEvent {
            id,
            customer_id: event.customer_id,
            ts: event.ts,
            event_type: event.event_type,
            trace_id: event.trace_id,
            span_id: event.span_id,
            payload: event.payload,
        };
        inner.dedup_index.insert(key, id);
        inner.events.insert(id, stored.clone());
        Ok(stored)
    }

    async fn scan(
        &self,
        customer_id: Option<Uuid>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<RawEvent>, StoreError> {
        let inner = self.inner.read();
        let mut matched: Vec<&RawEvent> = inner
            .events
            .values()
            .filter(|e| customer_id.map(|c| c == e.customer_id).unwrap_or(true))
            .filter(|e| from.map(|f| e.ts >= f).unwrap_or(true))
            .filter(|e| to.map(|t| e.ts < t).unwrap_or(true))
            .collect();
        matched.sort_by_key(|e| (e.ts, e.id));
        let mut result: Vec<RawEvent> = matched.into_iter().cloned().collect();
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn delete_before(&self, ts: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        let to_remove: Vec<u64> =
            inner.events.values().filter(|e| e.ts < ts).map(|e| e.id).collect();
        let count = to_remove.len() as u64;
        for id in to_remove {
            if let Some(event) = inner.events.remove(&id) {
                let key = (event.trace_id, event.span_id, event.event_type, event.ts);
                inner.dedup_index.remove(&key);
            }
        }
        Ok(count)
    }
}
