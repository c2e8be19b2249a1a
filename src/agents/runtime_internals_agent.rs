//! Agent driving the runtime-internals tracer.

use super::trace_agent::TraceAgent;
use crate::capture::{RecordMode, RuntimeTraceConfig, RuntimeTracer, TraceConfig};
use crate::config::AgentConfig;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const AGENT_NAME: &str = "RuntimeInternalsAgent";
const AGENT_EVENT_LABEL: &str = "runtime";

/// Agent capturing events recorded into a [`RuntimeTracer`].
///
/// Every start installs a fresh ring buffer, so a stop only ever reports events
/// from the window that just closed. The reported document uses the object form
/// `{"traceEvents":[...]}`.
pub struct RuntimeInternalsAgent {
    tracer: Arc<RuntimeTracer>,
    ring_capacity: usize,
}

impl RuntimeInternalsAgent {
    pub fn new(tracer: Arc<RuntimeTracer>) -> Self {
        Self::with_config(tracer, &AgentConfig::default())
    }

    pub fn with_config(tracer: Arc<RuntimeTracer>, config: &AgentConfig) -> Self {
        Self {
            tracer,
            ring_capacity: config.ring_capacity,
        }
    }
}

/// Runtime categories are matched by prefix; wildcards mean everything.
///
/// The runtime ring always wraps, keeping the newest events whatever the session's
/// record mode.
fn runtime_config(config: &TraceConfig) -> RuntimeTraceConfig {
    let included_categories = if config.included_categories.iter().any(|c| c == "*") {
        Vec::new()
    } else {
        config.included_categories.clone()
    };
    RuntimeTraceConfig {
        included_categories,
        record_mode: RecordMode::RecordContinuously,
    }
}

#[async_trait]
impl TraceAgent for RuntimeInternalsAgent {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    fn event_label(&self) -> &str {
        AGENT_EVENT_LABEL
    }

    async fn start_agent_tracing(&mut self, config: &TraceConfig) -> Result<()> {
        self.tracer.initialize(self.ring_capacity)?;
        self.tracer.start_tracing(runtime_config(config))
    }

    async fn stop_agent_tracing(&mut self) -> Result<String> {
        self.tracer.stop_tracing()?;
        let document = self.tracer.stream_contents();
        debug!(bytes = document.len(), "Runtime trace stream flushed");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TraceEvent;
    use serde_json::Value;

    fn agent_with_tracer(ring_capacity: usize) -> (RuntimeInternalsAgent, Arc<RuntimeTracer>) {
        let tracer = Arc::new(RuntimeTracer::new());
        let agent = RuntimeInternalsAgent::with_config(
            tracer.clone(),
            &AgentConfig {
                flush_fragment_size: 4,
                ring_capacity,
            },
        );
        (agent, tracer)
    }

    #[tokio::test]
    async fn test_identity() {
        let (agent, _tracer) = agent_with_tracer(8);
        assert_eq!(agent.name(), "RuntimeInternalsAgent");
        assert_eq!(agent.event_label(), "runtime");
    }

    #[tokio::test]
    async fn test_capture_window() {
        let (mut agent, tracer) = agent_with_tracer(8);
        agent.start_agent_tracing(&TraceConfig::default()).await.unwrap();
        assert!(tracer.is_tracing());

        tracer.add_trace_event(TraceEvent::complete("v8", "V8.Execute", 40));
        tracer.add_trace_event(TraceEvent::complete("v8.gc", "V8.GCScavenger", 12));

        let document = agent.stop_agent_tracing().await.unwrap();
        let value: Value = serde_json::from_str(&document).unwrap();
        let events = value["traceEvents"].as_array().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["name"], "V8.GCScavenger");
        assert!(!tracer.is_tracing());
    }

    #[tokio::test]
    async fn test_restart_reports_only_new_window() {
        let (mut agent, tracer) = agent_with_tracer(8);

        agent.start_agent_tracing(&TraceConfig::default()).await.unwrap();
        tracer.add_trace_event(TraceEvent::instant("v8", "old"));
        agent.stop_agent_tracing().await.unwrap();

        agent.start_agent_tracing(&TraceConfig::default()).await.unwrap();
        tracer.add_trace_event(TraceEvent::instant("v8", "new"));
        let document = agent.stop_agent_tracing().await.unwrap();

        let value: Value = serde_json::from_str(&document).unwrap();
        assert_eq!(value["traceEvents"].as_array().unwrap().len(), 1);
        assert_eq!(value["traceEvents"][0]["name"], "new");
    }

    #[tokio::test]
    async fn test_full_ring_keeps_newest_events_under_default_config() {
        let (mut agent, tracer) = agent_with_tracer(2);
        agent.start_agent_tracing(&TraceConfig::default()).await.unwrap();

        for name in ["a", "b", "c"] {
            assert!(tracer.add_trace_event(TraceEvent::instant("v8", name)));
        }

        let document = agent.stop_agent_tracing().await.unwrap();
        let value: Value = serde_json::from_str(&document).unwrap();
        let names: Vec<&str> = value["traceEvents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|event| event["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (mut agent, _tracer) = agent_with_tracer(8);
        agent.start_agent_tracing(&TraceConfig::default()).await.unwrap();
        assert!(agent.start_agent_tracing(&TraceConfig::default()).await.is_err());
    }

    #[test]
    fn test_runtime_config_mapping() {
        let config = TraceConfig::from_categories(&["v8".to_string(), "-gpu".to_string()])
            .with_record_mode(RecordMode::RecordUntilFull);
        let runtime = runtime_config(&config);
        assert_eq!(runtime.included_categories, vec!["v8".to_string()]);
        assert_eq!(runtime.record_mode, RecordMode::RecordContinuously);

        let wildcard = runtime_config(&TraceConfig::from_categories(&["*".to_string()]));
        assert!(wildcard.included_categories.is_empty());
    }
}
