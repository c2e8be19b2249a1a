//! Agent driving the shared trace log.
//!
//! Stopping drains the trace log on a dedicated `json_outputter` thread: the log
//! hands its events back as fragments through a callback, possibly many times, and
//! the agent waits on a one-shot signal sent with the last fragment. Only then is the
//! fragment buffer closed and the document taken, so the reported document always
//! reflects a fully drained log.

use super::trace_agent::TraceAgent;
use crate::capture::{TraceConfig, TraceLog};
use crate::config::AgentConfig;
use crate::trace_buffer::{JsonOutput, TraceResultBuffer};
use crate::{Result, TracelinkError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::debug;

const AGENT_NAME: &str = "EventLogAgent";
const AGENT_EVENT_LABEL: &str = "trace_event";

/// Agent capturing events recorded into a [`TraceLog`]
pub struct EventLogAgent {
    trace_log: Arc<TraceLog>,
    trace_buffer: Arc<Mutex<TraceResultBuffer>>,
    json_output: JsonOutput,
    flush_fragment_size: usize,
}

impl EventLogAgent {
    pub fn new(trace_log: Arc<TraceLog>) -> Self {
        Self::with_config(trace_log, &AgentConfig::default())
    }

    pub fn with_config(trace_log: Arc<TraceLog>, config: &AgentConfig) -> Self {
        Self {
            trace_log,
            trace_buffer: Arc::new(Mutex::new(TraceResultBuffer::new())),
            json_output: JsonOutput::new(),
            flush_fragment_size: config.flush_fragment_size,
        }
    }

    /// Run the trace log flush on its own thread and wait for the last fragment
    async fn collect_trace_data(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel::<Result<()>>();
        let trace_log = self.trace_log.clone();
        let trace_buffer = self.trace_buffer.clone();
        let fragment_size = self.flush_fragment_size;

        std::thread::Builder::new()
            .name("json_outputter".to_string())
            .spawn(move || {
                let mut done = Some(done_tx);
                let flushed = trace_log.flush(fragment_size, |fragment, has_more_events| {
                    trace_buffer.lock().unwrap().add_fragment(&fragment);
                    if !has_more_events {
                        if let Some(done) = done.take() {
                            let _ = done.send(Ok(()));
                        }
                    }
                });
                if let (Err(e), Some(done)) = (flushed, done.take()) {
                    let _ = done.send(Err(e));
                }
            })
            .map_err(|e| {
                TracelinkError::AgentError(format!("Failed to spawn flush thread: {}", e))
            })?;

        done_rx.await.map_err(|_| {
            TracelinkError::AgentError("Flush thread exited before finishing".to_string())
        })?
    }
}

#[async_trait]
impl TraceAgent for EventLogAgent {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    fn event_label(&self) -> &str {
        AGENT_EVENT_LABEL
    }

    async fn start_agent_tracing(&mut self, config: &TraceConfig) -> Result<()> {
        self.json_output.clear();
        self.trace_buffer.lock().unwrap().set_output_callback(self.json_output.callback());
        self.trace_log.set_enabled(config.clone())
    }

    async fn stop_agent_tracing(&mut self) -> Result<String> {
        self.trace_log.set_disabled()?;
        debug!(buffered = self.trace_log.buffered_len(), "Flushing trace log");

        self.trace_buffer.lock().unwrap().start();
        self.collect_trace_data().await?;
        self.trace_buffer.lock().unwrap().finish();

        Ok(self.json_output.take())
    }
}
