//! Trace agents coordinated by the tracing coordinator.
//!
//! # Agent Types
//!
//! - [`TraceAgent`] - Async trait every capture agent implements
//! - [`AgentHost`] - Worker task owning one agent and serializing its requests
//!
//! # Implementations
//!
//! - [`EventLogAgent`] - Drives the shared [`TraceLog`](crate::capture::TraceLog)
//! - [`RuntimeInternalsAgent`] - Drives the [`RuntimeTracer`](crate::capture::RuntimeTracer)

pub mod agent_host;
pub mod event_log_agent;
pub mod runtime_internals_agent;
pub mod trace_agent;

pub use agent_host::AgentHost;
pub use event_log_agent::EventLogAgent;
pub use runtime_internals_agent::RuntimeInternalsAgent;
pub use trace_agent::{AgentReport, StartCallback, StopCallback, TraceAgent};
