//! Per-mode bounded event queue with SSE fan-out and keepalive, C4.
//!
//! Grounded on `original_source/utils/sse.py`'s `sse_stream`/`format_sse`
//! (one queue, `get(timeout)` loop, 30s keepalive) but reimplemented as a
//! reusable primitive per spec.md §9, backed by `tokio::sync::broadcast`:
//! `Sender::send` never blocks (matching "non-blocking send"), and a
//! lagging receiver silently skips ahead to the newest buffered events
//! (matching "oldest event dropped to preserve freshness" / "slow
//! subscribers lose events rather than stall the publisher").

use std::time::Duration;

use axum::response::sse::Event as SseEvent;
use futures_util::stream::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream, IntervalStream};

/// Queue capacity; publishing past this drops the oldest buffered event
/// for any subscriber that has not drained it yet (spec.md §4.4).
pub const CAPACITY: usize = 1024;

pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Value>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(CAPACITY);
        Self { tx }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `event`. Infallible from the caller's perspective: a
    /// `SendError` (no subscribers yet) is swallowed, matching spec.md
    /// §4.4's "queue is always there even with no listeners yet".
    pub fn publish(&self, event: Value) {
        let _ = self.tx.send(event);
    }

    /// Convenience for handlers that build `{"type": kind, ...fields}`.
    pub fn publish_typed(&self, kind: &str, mut fields: Value) {
        if let Value::Object(ref mut map) = fields {
            map.insert("type".to_string(), Value::String(kind.to_string()));
        }
        self.publish(fields);
    }

    /// A fresh subscription: an independent reader that sees every event
    /// published from this point on, in publication order, possibly with
    /// gaps if it falls behind.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.tx.subscribe()
    }

    /// The SSE body for one subscriber: real events as they arrive, plus a
    /// synthetic `{"type":"keepalive"}` whenever nothing has flowed for
    /// `KEEPALIVE_INTERVAL`. `Lagged` gaps are silent — the subscriber just
    /// resumes from the next event it can see.
    pub fn sse_stream(&self) -> impl Stream<Item = Result<SseEvent, std::convert::Infallible>> {
        #[derive(Clone)]
        enum Tick {
            Event(Result<Value, BroadcastStreamRecvError>),
            Keepalive,
        }

        let events = BroadcastStream::new(self.subscribe()).map(Tick::Event);
        let keepalive = IntervalStream::new(tokio::time::interval(KEEPALIVE_INTERVAL)).map(|_| Tick::Keepalive);

        futures_util::stream::select(events, keepalive).filter_map(|tick| async move {
            let value = match tick {
                Tick::Event(Ok(value)) => value,
                Tick::Event(Err(BroadcastStreamRecvError::Lagged(_))) => return None,
                Tick::Keepalive => serde_json::json!({"type": "keepalive"}),
            };
            let payload = serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().data(payload)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drop_oldest_on_overflow_preserves_most_recent() {
        let (tx, mut rx) = broadcast::channel::<i32>(4);
        for i in 0..6 {
            let _ = tx.send(i);
        }
        let mut received = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(v) => received.push(v),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert_eq!(received, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn publish_before_any_subscriber_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(serde_json::json!({"type": "raw", "text": "hello"}));
    }

    #[tokio::test]
    async fn subscribers_see_events_in_publication_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(serde_json::json!({"n": 1}));
        bus.publish(serde_json::json!({"n": 2}));
        bus.publish(serde_json::json!({"n": 3}));
        assert_eq!(rx.recv().await.unwrap()["n"], 1);
        assert_eq!(rx.recv().await.unwrap()["n"], 2);
        assert_eq!(rx.recv().await.unwrap()["n"], 3);
    }
}
