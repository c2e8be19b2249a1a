//! Capture backends that physically record trace events.
//!
//! - [`TraceLog`] - process-wide event log with an enable/disable state machine
//! - [`RuntimeTracer`] - runtime-internals tracer with a ring buffer and JSON writer
//!
//! Both are shared resources: create them once, wrap them in an `Arc`, and hand them
//! to the agents that drive them and to the code that records events.

pub mod runtime_tracer;
pub mod trace_config;
pub mod trace_event;
pub mod trace_log;

pub use runtime_tracer::{RuntimeTraceConfig, RuntimeTracer, DEFAULT_RING_CAPACITY};
pub use trace_config::{RecordMode, TraceConfig};
pub use trace_event::{Phase, TraceEvent};
pub use trace_log::{TraceLog, DEFAULT_FLUSH_FRAGMENT_SIZE, DEFAULT_TRACE_LOG_CAPACITY};
