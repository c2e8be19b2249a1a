//! Trace event records in the Chrome trace event format.
//!
//! Both capture backends record [`TraceEvent`] values and serialize them as JSON
//! objects, which is the payload format the coordinator forwards to the controller.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Phase of a trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "B")]
    Begin,
    #[serde(rename = "E")]
    End,
    #[serde(rename = "X")]
    Complete,
    #[serde(rename = "i")]
    Instant,
    #[serde(rename = "C")]
    Counter,
    #[serde(rename = "M")]
    Metadata,
}

/// A single trace event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    pub cat: String,
    pub ph: Phase,
    /// Timestamp in microseconds since the Unix epoch
    pub ts: i64,
    pub pid: u32,
    pub tid: u64,
    /// Duration in microseconds, for complete events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<i64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

impl TraceEvent {
    /// Create an event stamped with the current time, process and thread
    pub fn new(category: impl Into<String>, name: impl Into<String>, ph: Phase) -> Self {
        Self {
            name: name.into(),
            cat: category.into(),
            ph,
            ts: Utc::now().timestamp_micros(),
            pid: std::process::id(),
            tid: current_thread_ordinal(),
            dur: None,
            args: Map::new(),
        }
    }

    pub fn instant(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(category, name, Phase::Instant)
    }

    pub fn complete(category: impl Into<String>, name: impl Into<String>, dur_us: i64) -> Self {
        let mut event = Self::new(category, name, Phase::Complete);
        event.dur = Some(dur_us);
        event
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

static NEXT_THREAD_ORDINAL: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ORDINAL: Cell<u64> = const { Cell::new(0) };
}

/// Small, stable per-thread id used for the `tid` field
fn current_thread_ordinal() -> u64 {
    THREAD_ORDINAL.with(|ordinal| {
        if ordinal.get() == 0 {
            ordinal.set(NEXT_THREAD_ORDINAL.fetch_add(1, Ordering::Relaxed));
        }
        ordinal.get()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instant_event_serialization() {
        let event = TraceEvent::instant("net", "socket_open").with_arg("port", 9222);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["name"], "socket_open");
        assert_eq!(value["cat"], "net");
        assert_eq!(value["ph"], "i");
        assert_eq!(value["args"], json!({"port": 9222}));
        assert!(value.get("dur").is_none());
    }

    #[test]
    fn test_complete_event_has_duration() {
        let event = TraceEvent::complete("v8", "V8.GCScavenger", 1200);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["ph"], "X");
        assert_eq!(value["dur"], 1200);
        assert!(value.get("args").is_none());
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let event: TraceEvent = serde_json::from_value(json!({
            "name": "layout",
            "cat": "blink",
            "ph": "B",
            "ts": 10,
            "pid": 1,
            "tid": 2
        }))
        .unwrap();

        assert_eq!(event.ph, Phase::Begin);
        assert!(event.args.is_empty());
        assert_eq!(event.dur, None);
    }

    #[test]
    fn test_thread_ordinal_is_stable_per_thread() {
        let first = TraceEvent::instant("a", "one").tid;
        let second = TraceEvent::instant("a", "two").tid;
        assert_eq!(first, second);

        let other = std::thread::spawn(|| TraceEvent::instant("a", "three").tid).join().unwrap();
        assert_ne!(first, other);
    }
}
