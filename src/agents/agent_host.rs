//! Worker task that owns one agent.
//!
//! Each registered agent is moved into its own background task. Requests reach the
//! task over an unbounded channel and are processed strictly in the order they were
//! issued, so a stop never overtakes the start before it, while different agents
//! still run in parallel. Dropping the [`AgentHost`] closes the channel and lets the
//! task exit.

use super::trace_agent::{AgentReport, StartCallback, StopCallback, TraceAgent};
use crate::capture::TraceConfig;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

enum AgentRequest {
    Start {
        config: TraceConfig,
        on_started: StartCallback,
    },
    Stop {
        on_stopped: StopCallback,
    },
}

/// Handle to an agent running on its own worker task.
///
/// Clones share the same worker.
#[derive(Clone)]
pub struct AgentHost {
    name: String,
    event_label: String,
    requests: mpsc::UnboundedSender<AgentRequest>,
}

impl AgentHost {
    /// Move `agent` onto a new worker task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(agent: Box<dyn TraceAgent>) -> Self {
        let name = agent.name().to_string();
        let event_label = agent.event_label().to_string();
        let (requests, receiver) = mpsc::unbounded_channel();

        tokio::spawn(Self::run(agent, receiver));
        debug!(agent = name.as_str(), "Spawned agent worker");

        Self {
            name,
            event_label,
            requests,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_label(&self) -> &str {
        &self.event_label
    }

    /// Queue a start request; `on_started` fires once when it completes
    pub fn start(&self, config: TraceConfig, on_started: StartCallback) {
        self.send(AgentRequest::Start { config, on_started });
    }

    /// Queue a stop request; `on_stopped` fires once with the drained document
    pub fn stop(&self, on_stopped: StopCallback) {
        self.send(AgentRequest::Stop { on_stopped });
    }

    fn send(&self, request: AgentRequest) {
        let Err(mpsc::error::SendError(request)) = self.requests.send(request) else {
            return;
        };

        // The worker is gone; still complete the request so nobody waits forever
        error!(agent = self.name.as_str(), "Agent worker has exited");
        match request {
            AgentRequest::Start { on_started, .. } => on_started(&self.name, false),
            AgentRequest::Stop { on_stopped } => on_stopped(AgentReport {
                agent_name: self.name.clone(),
                event_label: self.event_label.clone(),
                document: String::new(),
            }),
        }
    }

    async fn run(mut agent: Box<dyn TraceAgent>, mut receiver: mpsc::UnboundedReceiver<AgentRequest>) {
        while let Some(request) = receiver.recv().await {
            match request {
                AgentRequest::Start { config, on_started } => {
                    let success = match agent.start_agent_tracing(&config).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(agent = agent.name(), error = %e, "Agent failed to start tracing");
                            false
                        }
                    };
                    on_started(agent.name(), success);
                }
                AgentRequest::Stop { on_stopped } => {
                    let document = match agent.stop_agent_tracing().await {
                        Ok(document) => document,
                        Err(e) => {
                            error!(agent = agent.name(), error = %e, "Agent failed to stop tracing");
                            String::new()
                        }
                    };
                    on_stopped(AgentReport {
                        agent_name: agent.name().to_string(),
                        event_label: agent.event_label().to_string(),
                        document,
                    });
                }
            }
        }

        debug!(agent = agent.name(), "Agent worker exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Result, TracelinkError};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct RecordingAgent {
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    }

    #[async_trait]
    impl TraceAgent for RecordingAgent {
        fn name(&self) -> &str {
            "RecordingAgent"
        }

        fn event_label(&self) -> &str {
            "recording"
        }

        async fn start_agent_tracing(&mut self, config: &TraceConfig) -> Result<()> {
            // Slow start so an unordered stop would overtake it
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.log.lock().unwrap().push(format!("start:{}", config.to_filter_string()));
            if self.fail_start {
                return Err(TracelinkError::CaptureError("backend busy".to_string()));
            }
            Ok(())
        }

        async fn stop_agent_tracing(&mut self) -> Result<String> {
            self.log.lock().unwrap().push("stop".to_string());
            Ok("[]".to_string())
        }
    }

    fn recording_host(fail_start: bool) -> (AgentHost, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let host = AgentHost::spawn(Box::new(RecordingAgent {
            log: log.clone(),
            fail_start,
        }));
        (host, log)
    }

    #[tokio::test]
    async fn test_requests_processed_in_order() {
        let (host, log) = recording_host(false);
        let (tx, rx) = oneshot::channel();

        host.start(
            TraceConfig::from_categories(&["net".to_string()]),
            Box::new(|_, _| {}),
        );
        host.stop(Box::new(move |report| {
            let _ = tx.send(report);
        }));

        let report = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
        assert_eq!(report.agent_name, "RecordingAgent");
        assert_eq!(report.event_label, "recording");
        assert_eq!(report.document, "[]");
        assert_eq!(*log.lock().unwrap(), vec!["start:net".to_string(), "stop".to_string()]);
    }

    #[tokio::test]
    async fn test_start_failure_reported() {
        let (host, _log) = recording_host(true);
        let (tx, rx) = oneshot::channel();

        host.start(
            TraceConfig::default(),
            Box::new(move |name, success| {
                let _ = tx.send((name.to_string(), success));
            }),
        );

        let (name, success) = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
        assert_eq!(name, "RecordingAgent");
        assert!(!success);
    }

    #[tokio::test]
    async fn test_host_exposes_identity() {
        let (host, _log) = recording_host(false);
        assert_eq!(host.name(), "RecordingAgent");
        assert_eq!(host.event_label(), "recording");
    }
}
