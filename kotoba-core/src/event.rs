//! The wire shape of an event (spec §3 "Event", §6 WebSocket message shape).
//! The bus mechanics that deliver these live in `kotoba-server` (they need
//! a Tokio runtime handle to bridge worker threads into the async
//! scheduler); this module only defines the immutable payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel event type that tells a subscriber to terminate its stream.
pub const SHUTDOWN_EVENT_TYPE: &str = "__shutdown__";

/// An immutable event as delivered to WebSocket subscribers.
///
/// `timestamp` is seconds since the Unix epoch, matching
/// `original_source/src/api/event_bus.py`'s `time.time()` convention so the
/// wire format is unsurprising to anyone who has seen the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
    pub timestamp: f64,
}

impl Event {
    /// Builds an event stamped with the current wall-clock time.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: unix_timestamp_now(),
        }
    }

    /// The shutdown sentinel (spec §3).
    pub fn shutdown() -> Self {
        Self::new(SHUTDOWN_EVENT_TYPE, Value::Object(Default::default()))
    }

    /// True for the shutdown sentinel.
    pub fn is_shutdown(&self) -> bool {
        self.event_type == SHUTDOWN_EVENT_TYPE
    }
}

fn unix_timestamp_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_event_has_sentinel_type() {
        let event = Event::shutdown();
        assert!(event.is_shutdown());
        assert_eq!(event.event_type, "__shutdown__");
    }

    #[test]
    fn serializes_to_the_documented_wire_shape() {
        let event = Event::new("progress", serde_json::json!({"value": 40}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["data"]["value"], 40);
        assert!(json["timestamp"].is_number());
    }
}
