//! Windowing algorithm shared by the edge and work derivers: bucket raw
//! events by `(customer_id, window_start)` on a fixed-size, epoch-aligned
//! window.

use std::collections::BTreeMap;

use chrono::Duration;
use dualrail_core::model::RawEvent;
use dualrail_core::period::floor_to_bucket;
use uuid::Uuid;

pub type BucketKey = (Uuid, chrono::DateTime<chrono::Utc>);

/// Group events into `(customer_id, window_start)` buckets. Buckets are
/// returned in ascending key order so derivation is deterministic.
pub fn bucket_events(events: Vec<RawEvent>, window_size: Duration) -> BTreeMap<BucketKey, Vec<RawEvent>> {
    let mut buckets: BTreeMap<BucketKey, Vec<RawEvent>> = BTreeMap::new();
    for event in events {
        let window_start = floor_to_bucket(event.ts, window_size);
        buckets.entry((event.customer_id, window_start)).or_default().push(event);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dualrail_core::model::RawEventType;
    use uuid::Uuid;

    fn event(customer_id: Uuid, ts: chrono::DateTime<chrono::Utc>) -> RawEvent {
        RawEvent {
            id: 1,
            customer_id,
            ts,
            event_type: RawEventType::SpanStarted,
            trace_id: None,
            span_id: None,
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn buckets_by_customer_and_aligned_window_start() {
        let customer = Uuid::new_v4();
        let t0 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap();
        let t1 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 4, 59).unwrap();
        let t2 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 1).unwrap();
        let events = vec![event(customer, t0), event(customer, t1), event(customer, t2)];
        let buckets = bucket_events(events, Duration::minutes(5));
        assert_eq!(buckets.len(), 2);
        let first_key = (customer, chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(buckets[&first_key].len(), 2);
    }
}
