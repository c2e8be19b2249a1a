pub mod agents;
pub mod capture;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod snapshot;
pub mod trace_buffer;

pub use error::{Result, TracelinkError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agents::{AgentReport, EventLogAgent, RuntimeInternalsAgent, TraceAgent};
    pub use crate::capture::{RuntimeTracer, TraceConfig, TraceEvent, TraceLog};
    pub use crate::command::{CommandResponse, ErrorCode};
    pub use crate::config::{CoordinatorConfig, ResumeConfig};
    pub use crate::coordinator::{TracingCoordinator, TRACING_DOMAIN};
    pub use crate::dispatcher::DebugDispatcher;
    pub use crate::error::{Result, TracelinkError};
    pub use crate::event::Notification;
    pub use crate::snapshot::TracingSnapshot;
}
