//! Process-wide trace log capture backend.
//!
//! The trace log is the shared on/off recording facility the event-log agent drives.
//! It is an explicit shared resource (`Arc<TraceLog>`) rather than a global, and its
//! enable/disable transitions form a small state machine: the log is enabled exactly
//! between a successful [`TraceLog::set_enabled`] and the matching
//! [`TraceLog::set_disabled`].

use super::trace_config::{RecordMode, TraceConfig};
use super::trace_event::TraceEvent;
use crate::{Result, TracelinkError};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Default number of events recorded before the log is considered full
pub const DEFAULT_TRACE_LOG_CAPACITY: usize = 100_000;

/// Default number of events per flushed fragment
pub const DEFAULT_FLUSH_FRAGMENT_SIZE: usize = 64;

struct TraceLogState {
    config: Option<TraceConfig>,
    events: VecDeque<TraceEvent>,
    dropped: usize,
}

/// Shared recording backend for trace events
pub struct TraceLog {
    state: Mutex<TraceLogState>,
    capacity: usize,
}

impl TraceLog {
    /// Create a disabled trace log with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TRACE_LOG_CAPACITY)
    }

    /// Create a disabled trace log holding at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(TraceLogState {
                config: None,
                events: VecDeque::new(),
                dropped: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().config.is_some()
    }

    /// The active config, if recording
    pub fn config(&self) -> Option<TraceConfig> {
        self.state.lock().unwrap().config.clone()
    }

    /// Begin recording with `config`.
    ///
    /// Any events left over from a previous window are discarded.
    pub fn set_enabled(&self, config: TraceConfig) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.config.is_some() {
            return Err(TracelinkError::CaptureError("Trace log already enabled".to_string()));
        }
        debug!(filter = %config.to_filter_string(), "Enabling trace log");
        state.events.clear();
        state.dropped = 0;
        state.config = Some(config);
        Ok(())
    }

    /// Stop recording. Recorded events stay buffered until flushed.
    pub fn set_disabled(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.config.take().is_none() {
            return Err(TracelinkError::CaptureError("Trace log not enabled".to_string()));
        }
        debug!(buffered = state.events.len(), dropped = state.dropped, "Disabled trace log");
        Ok(())
    }

    /// Record an event if the log is enabled and its category passes the filter.
    ///
    /// Returns whether the event was kept.
    pub fn add_trace_event(&self, event: TraceEvent) -> bool {
        let mut state = self.state.lock().unwrap();
        let record_mode = match &state.config {
            Some(config) if config.is_category_enabled(&event.cat) => config.record_mode,
            _ => return false,
        };

        if state.events.len() >= self.capacity {
            match record_mode {
                RecordMode::RecordUntilFull => {
                    state.dropped += 1;
                    return false;
                }
                RecordMode::RecordContinuously => {
                    state.events.pop_front();
                    state.dropped += 1;
                }
            }
        }

        state.events.push_back(event);
        true
    }

    /// Number of events waiting to be flushed
    pub fn buffered_len(&self) -> usize {
        self.state.lock().unwrap().events.len()
    }

    /// Drain buffered events as JSON fragments.
    ///
    /// Each fragment is a comma-joined run of at most `fragment_size` serialized
    /// events. `output` is called with `has_more_events == false` exactly once, on
    /// the last fragment; an empty log yields a single empty fragment.
    pub fn flush<F>(&self, fragment_size: usize, mut output: F) -> Result<()>
    where
        F: FnMut(String, bool),
    {
        let events: Vec<TraceEvent> = {
            let mut state = self.state.lock().unwrap();
            if state.config.is_some() {
                return Err(TracelinkError::CaptureError(
                    "Cannot flush trace log while recording".to_string(),
                ));
            }
            state.events.drain(..).collect()
        };

        if events.is_empty() {
            output(String::new(), false);
            return Ok(());
        }

        let chunks: Vec<&[TraceEvent]> = events.chunks(fragment_size.max(1)).collect();
        let last = chunks.len() - 1;
        for (index, chunk) in chunks.into_iter().enumerate() {
            let serialized = chunk
                .iter()
                .map(serde_json::to_string)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            output(serialized.join(","), index < last);
        }

        Ok(())
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net_config() -> TraceConfig {
        TraceConfig::from_categories(&["net".to_string()])
    }

    #[test]
    fn test_new_trace_log_is_disabled() {
        let log = TraceLog::new();
        assert!(!log.is_enabled());
        assert!(log.config().is_none());
    }

    #[test]
    fn test_enable_twice_fails() {
        let log = TraceLog::new();
        log.set_enabled(TraceConfig::default()).unwrap();

        let result = log.set_enabled(TraceConfig::default());
        assert!(matches!(result, Err(TracelinkError::CaptureError(_))));
        assert!(log.is_enabled());
    }

    #[test]
    fn test_disable_when_not_enabled_fails() {
        let log = TraceLog::new();
        assert!(log.set_disabled().is_err());
    }

    #[test]
    fn test_events_dropped_while_disabled() {
        let log = TraceLog::new();
        assert!(!log.add_trace_event(TraceEvent::instant("net", "ignored")));
        assert_eq!(log.buffered_len(), 0);
    }

    #[test]
    fn test_category_filter_applies() {
        let log = TraceLog::new();
        log.set_enabled(net_config()).unwrap();

        assert!(log.add_trace_event(TraceEvent::instant("net", "kept")));
        assert!(!log.add_trace_event(TraceEvent::instant("gpu", "filtered")));
        assert_eq!(log.buffered_len(), 1);
    }

    #[test]
    fn test_record_until_full_drops_newest() {
        let log = TraceLog::with_capacity(2);
        log.set_enabled(TraceConfig::default()).unwrap();

        assert!(log.add_trace_event(TraceEvent::instant("a", "1")));
        assert!(log.add_trace_event(TraceEvent::instant("a", "2")));
        assert!(!log.add_trace_event(TraceEvent::instant("a", "3")));
        assert_eq!(log.buffered_len(), 2);
    }

    #[test]
    fn test_record_continuously_overwrites_oldest() {
        let log = TraceLog::with_capacity(2);
        log.set_enabled(TraceConfig::default().with_record_mode(RecordMode::RecordContinuously))
            .unwrap();

        for name in ["1", "2", "3"] {
            assert!(log.add_trace_event(TraceEvent::instant("a", name)));
        }
        log.set_disabled().unwrap();

        let mut document = String::new();
        log.flush(10, |fragment, _| document.push_str(&fragment)).unwrap();
        let events: Vec<TraceEvent> = serde_json::from_str(&format!("[{}]", document)).unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["2", "3"]);
    }

    #[test]
    fn test_flush_while_enabled_fails() {
        let log = TraceLog::new();
        log.set_enabled(TraceConfig::default()).unwrap();
        assert!(log.flush(10, |_, _| {}).is_err());
    }

    #[test]
    fn test_flush_empty_log_reports_once() {
        let log = TraceLog::new();
        let mut calls = Vec::new();
        log.flush(10, |fragment, has_more| calls.push((fragment, has_more))).unwrap();

        assert_eq!(calls, vec![(String::new(), false)]);
    }

    #[test]
    fn test_flush_splits_into_fragments() {
        let log = TraceLog::new();
        log.set_enabled(TraceConfig::default()).unwrap();
        for i in 0..5 {
            log.add_trace_event(TraceEvent::instant("a", format!("e{}", i)));
        }
        log.set_disabled().unwrap();

        let mut fragments = Vec::new();
        log.flush(2, |fragment, has_more| fragments.push((fragment, has_more))).unwrap();

        assert_eq!(fragments.len(), 3);
        assert!(fragments[0].1);
        assert!(fragments[1].1);
        assert!(!fragments[2].1);

        let joined: Vec<String> = fragments.into_iter().map(|(f, _)| f).collect();
        let events: Vec<TraceEvent> =
            serde_json::from_str(&format!("[{}]", joined.join(","))).unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[4].name, "e4");
        assert_eq!(log.buffered_len(), 0);
    }

    #[test]
    fn test_reenable_discards_previous_window() {
        let log = TraceLog::new();
        log.set_enabled(TraceConfig::default()).unwrap();
        log.add_trace_event(TraceEvent::instant("a", "stale"));
        log.set_disabled().unwrap();

        log.set_enabled(TraceConfig::default()).unwrap();
        assert_eq!(log.buffered_len(), 0);
    }
}
