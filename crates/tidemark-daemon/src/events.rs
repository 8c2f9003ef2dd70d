//! Event emission system.
//!
//! Events are broadcast from the daemon tasks to subscribers (the event
//! log task, tests, future RPC streaming). Each subscriber has an
//! independent buffer; slow subscribers lag rather than block emitters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "CycleApplied", "CursorNotFound").
    pub event_type: String,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Build an event stamped with the current time.
    pub fn now(event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            timestamp: tidemark_types::now_secs(),
            payload,
        }
    }
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

/// Categorize an event type into a category.
pub fn categorize_event(event_type: &str) -> &'static str {
    match event_type {
        s if s.starts_with("Ingest") || s.starts_with("Cursor") => "ingest",
        s if s.starts_with("Cycle") => "accrual",
        s if s.starts_with("Distribution") || s.starts_with("Revenue") => "distribution",
        s if s.starts_with("StalePrice") || s.starts_with("Price") => "oracle",
        _ => "system",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(Event {
            event_type: "DaemonStarted".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({"version": "0.1.0"}),
        });

        let event = rx.try_recv().expect("receive event");
        assert_eq!(event.event_type, "DaemonStarted");
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new(16);
        bus.emit(Event::now("CycleApplied", serde_json::json!({"cycle": 7})));
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_categorize_event() {
        assert_eq!(categorize_event("IngestCompleted"), "ingest");
        assert_eq!(categorize_event("CursorNotFound"), "ingest");
        assert_eq!(categorize_event("CycleApplied"), "accrual");
        assert_eq!(categorize_event("CycleSkipped"), "accrual");
        assert_eq!(categorize_event("DistributionCommitted"), "distribution");
        assert_eq!(categorize_event("RevenueRecorded"), "distribution");
        assert_eq!(categorize_event("StalePrice"), "oracle");
        assert_eq!(categorize_event("DaemonStarted"), "system");
    }
}
