//! Runtime-internals tracing backend.
//!
//! Models the tracing controller of a script runtime: events go into a fixed-size
//! ring buffer while tracing, and stopping writes the ring through a JSON trace
//! writer whose stream holds a `{"traceEvents":[...]}` document.

use super::trace_config::RecordMode;
use super::trace_event::TraceEvent;
use crate::{Result, TracelinkError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Number of chunks in the default ring buffer
pub const RING_BUFFER_CHUNKS: usize = 4;

/// Events per ring buffer chunk
pub const RING_BUFFER_CHUNK_SIZE: usize = 64;

/// Default ring buffer capacity in events
pub const DEFAULT_RING_CAPACITY: usize = RING_BUFFER_CHUNKS * RING_BUFFER_CHUNK_SIZE;

/// Configuration for a runtime tracing session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTraceConfig {
    /// Category prefixes to record; empty records everything
    pub included_categories: Vec<String>,
    pub record_mode: RecordMode,
}

impl RuntimeTraceConfig {
    fn accepts(&self, category: &str) -> bool {
        self.included_categories.is_empty()
            || self.included_categories.iter().any(|prefix| category.starts_with(prefix.as_str()))
    }
}

struct RingBuffer {
    events: VecDeque<TraceEvent>,
    capacity: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, event: TraceEvent, record_mode: RecordMode) -> bool {
        if self.events.len() == self.capacity {
            if record_mode == RecordMode::RecordUntilFull {
                return false;
            }
            self.events.pop_front();
        }
        self.events.push_back(event);
        true
    }
}

/// Writes events into an in-memory JSON object document
struct JsonTraceWriter {
    stream: String,
    wrote_event: bool,
    closed: bool,
}

impl JsonTraceWriter {
    fn new() -> Self {
        Self {
            stream: String::from("{\"traceEvents\":["),
            wrote_event: false,
            closed: false,
        }
    }

    fn append(&mut self, event: &TraceEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        if self.wrote_event {
            self.stream.push(',');
        }
        self.stream.push_str(&json);
        self.wrote_event = true;
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.stream.push_str("]}");
            self.closed = true;
        }
    }
}

#[derive(Default)]
struct RuntimeTracerState {
    ring: Option<RingBuffer>,
    writer: Option<JsonTraceWriter>,
    recording: Option<RuntimeTraceConfig>,
}

/// Shared runtime tracing controller
#[derive(Default)]
pub struct RuntimeTracer {
    state: Mutex<RuntimeTracerState>,
}

impl RuntimeTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh ring buffer and writer stream
    pub fn initialize(&self, ring_capacity: usize) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.recording.is_some() {
            return Err(TracelinkError::CaptureError(
                "Cannot reinitialize runtime tracer while tracing".to_string(),
            ));
        }
        state.ring = Some(RingBuffer::new(ring_capacity));
        state.writer = Some(JsonTraceWriter::new());
        Ok(())
    }

    pub fn start_tracing(&self, config: RuntimeTraceConfig) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.ring.is_none() {
            return Err(TracelinkError::CaptureError(
                "Runtime tracer not initialized".to_string(),
            ));
        }
        if state.recording.is_some() {
            return Err(TracelinkError::CaptureError(
                "Runtime tracing already started".to_string(),
            ));
        }
        debug!(categories = ?config.included_categories, "Starting runtime tracing");
        state.recording = Some(config);
        Ok(())
    }

    /// Stop tracing and write the ring buffer out through the JSON writer
    pub fn stop_tracing(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.recording.take().is_none() {
            return Err(TracelinkError::CaptureError("Runtime tracing not started".to_string()));
        }

        let RuntimeTracerState { ring, writer, .. } = &mut *state;
        if let (Some(ring), Some(writer)) = (ring.as_mut(), writer.as_mut()) {
            debug!(events = ring.events.len(), "Writing runtime trace ring buffer");
            for event in ring.events.drain(..) {
                writer.append(&event)?;
            }
            writer.close();
        }
        Ok(())
    }

    pub fn is_tracing(&self) -> bool {
        self.state.lock().unwrap().recording.is_some()
    }

    /// Record an event while tracing; returns whether it was kept
    pub fn add_trace_event(&self, event: TraceEvent) -> bool {
        let mut state = self.state.lock().unwrap();
        let RuntimeTracerState { ring, recording, .. } = &mut *state;
        match (recording.as_ref(), ring.as_mut()) {
            (Some(config), Some(ring)) if config.accepts(&event.cat) => {
                ring.push(event, config.record_mode)
            }
            _ => false,
        }
    }

    /// Current contents of the writer stream
    pub fn stream_contents(&self) -> String {
        self.state.lock().unwrap().writer.as_ref().map(|w| w.stream.clone()).unwrap_or_default()
    }
}
