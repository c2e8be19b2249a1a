//! Base trait for trace-producing agents.
//!
//! This module defines the core `TraceAgent` trait that every capture agent
//! implements. The coordinator treats all agents uniformly through it: an agent is
//! started with a category filter, and when stopped it hands back everything it
//! captured as one self-contained document.

use crate::capture::TraceConfig;
use crate::Result;
use async_trait::async_trait;

/// Base trait for all trace agents.
///
/// The coordinator guarantees that `start_agent_tracing` is only called while the
/// agent is not capturing and `stop_agent_tracing` only while it is.
///
/// # Examples
///
/// ```
/// use tracelink::agents::TraceAgent;
/// use tracelink::capture::TraceConfig;
/// use tracelink::Result;
/// use async_trait::async_trait;
///
/// struct MarkerAgent {
///     capturing: bool,
/// }
///
/// #[async_trait]
/// impl TraceAgent for MarkerAgent {
///     fn name(&self) -> &str {
///         "MarkerAgent"
///     }
///
///     fn event_label(&self) -> &str {
///         "marker"
///     }
///
///     async fn start_agent_tracing(&mut self, _config: &TraceConfig) -> Result<()> {
///         self.capturing = true;
///         Ok(())
///     }
///
///     async fn stop_agent_tracing(&mut self) -> Result<String> {
///         self.capturing = false;
///         Ok(r#"[{"name":"marker","ph":"i"}]"#.to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait TraceAgent: Send {
    /// Stable agent name
    fn name(&self) -> &str;

    /// Human-readable label for the events this agent produces
    fn event_label(&self) -> &str;

    /// Begin capturing events that pass `config`.
    ///
    /// An error means the backend could not enable capture; it is reported but
    /// does not affect other agents.
    async fn start_agent_tracing(&mut self, config: &TraceConfig) -> Result<()>;

    /// Stop capturing and return the fully drained capture as one document.
    ///
    /// The document is a JSON array of trace events, or a JSON object with a
    /// `traceEvents` array. An empty capture still yields a document.
    async fn stop_agent_tracing(&mut self) -> Result<String>;
}

/// What an agent hands back when it stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReport {
    pub agent_name: String,
    pub event_label: String,
    pub document: String,
}

/// One-shot completion for a start request: `(agent_name, success)`
pub type StartCallback = Box<dyn FnOnce(&str, bool) + Send>;

/// One-shot completion for a stop request
pub type StopCallback = Box<dyn FnOnce(AgentReport) + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingAgent {
        starts: usize,
        stops: usize,
    }

    #[async_trait]
    impl TraceAgent for CountingAgent {
        fn name(&self) -> &str {
            "CountingAgent"
        }

        fn event_label(&self) -> &str {
            "counting"
        }

        async fn start_agent_tracing(&mut self, _config: &TraceConfig) -> Result<()> {
            self.starts += 1;
            Ok(())
        }

        async fn stop_agent_tracing(&mut self) -> Result<String> {
            self.stops += 1;
            Ok(format!("[{{\"name\":\"stop{}\"}}]", self.stops))
        }
    }

    #[tokio::test]
    async fn test_agent_as_trait_object() {
        let mut agent: Box<dyn TraceAgent> = Box::new(CountingAgent { starts: 0, stops: 0 });

        agent.start_agent_tracing(&TraceConfig::default()).await.unwrap();
        let document = agent.stop_agent_tracing().await.unwrap();

        assert_eq!(agent.name(), "CountingAgent");
        assert_eq!(agent.event_label(), "counting");
        assert_eq!(document, r#"[{"name":"stop1"}]"#);
    }

    #[test]
    fn test_callbacks_fire_once() {
        let on_started: StartCallback = Box::new(|name, success| {
            assert_eq!(name, "CountingAgent");
            assert!(success);
        });
        on_started("CountingAgent", true);

        let on_stopped: StopCallback = Box::new(|report| assert_eq!(report.document, "[]"));
        on_stopped(AgentReport {
            agent_name: "CountingAgent".to_string(),
            event_label: "counting".to_string(),
            document: "[]".to_string(),
        });
    }
}
