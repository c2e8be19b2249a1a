//! Tracing coordinator.
//!
//! The coordinator owns a set of trace agents and exposes the `Tracing` domain to a
//! controller: `Tracing.start` opens a capture window on every agent, `Tracing.end`
//! closes it. Command replies never wait on agents. Captured events arrive later, in
//! whatever order the agents finish, and are forwarded as `Tracing.dataCollected`
//! batches followed by exactly one `Tracing.tracingComplete` per stop round.
//!
//! # State machine
//!
//! ```text
//!            start (ok)                      end (ok)
//!   Idle ---------------------> Tracing ---------------------> Idle
//!   end => "Tracing not started"     start => "Tracing already started"
//! ```
//!
//! # Freeze and resume
//!
//! [`TracingCoordinator::freeze`] drains the agents (discarding their output), takes
//! the `Tracing` domain off the dispatcher and returns a [`TracingSnapshot`].
//! [`TracingCoordinator::thaw`] puts the domain back and, when the snapshot says
//! tracing was active, restarts every agent.
//!
//! # Examples
//!
//! ```ignore
//! use tracelink::coordinator::TracingCoordinator;
//! use tracelink::dispatcher::DebugDispatcher;
//!
//! let (dispatcher, mut notifications) = DebugDispatcher::new();
//! let dispatcher = Arc::new(dispatcher);
//! let coordinator = TracingCoordinator::with_default_agents(
//!     dispatcher.clone(),
//!     trace_log,
//!     runtime_tracer,
//!     CoordinatorConfig::default(),
//! )?;
//! coordinator.thaw(None);
//!
//! dispatcher.dispatch("Tracing.start", json!({"categories": "net,v8"})).await;
//! // ... record events ...
//! dispatcher.dispatch("Tracing.end", json!({})).await;
//! while let Some(notification) = notifications.recv().await {
//!     if notification.method == "Tracing.tracingComplete" {
//!         break;
//!     }
//! }
//! ```

use crate::agents::{AgentHost, AgentReport, EventLogAgent, RuntimeInternalsAgent, TraceAgent};
use crate::capture::{RuntimeTracer, TraceConfig, TraceLog};
use crate::command::{Command, ErrorCode};
use crate::config::{AgentConfig, CoordinatorConfig, ResumeConfig};
use crate::dispatcher::{DebugDispatcher, DomainHandler};
use crate::snapshot::TracingSnapshot;
use crate::{Result, TracelinkError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Domain name the coordinator registers on the dispatcher
pub const TRACING_DOMAIN: &str = "Tracing";

const DATA_COLLECTED_EVENT: &str = "Tracing.dataCollected";
const TRACING_COMPLETE_EVENT: &str = "Tracing.tracingComplete";

/// Progress of one stop round
struct StopRound {
    expected: usize,
    responded: usize,
}

#[derive(Default)]
struct SessionState {
    tracing_active: bool,
    categories: Vec<String>,
    agents_responded: usize,
    aggregate: Vec<Value>,
    session_id: Option<Uuid>,
    agents: Vec<AgentHost>,
    open_rounds: HashMap<u64, StopRound>,
    next_round: u64,
}

struct CoordinatorInner {
    dispatcher: Arc<DebugDispatcher>,
    config: CoordinatorConfig,
    state: Mutex<SessionState>,
    // Held for the whole of each command, freeze and thaw so agent requests are
    // issued in the same order as the state transitions that caused them
    command_lock: Mutex<()>,
}

/// Coordinates start/stop of all registered trace agents.
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone)]
pub struct TracingCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl TracingCoordinator {
    /// Create a coordinator with no agents.
    ///
    /// The `Tracing` domain is not reachable until [`thaw`](Self::thaw) is called.
    pub fn new(dispatcher: Arc<DebugDispatcher>, config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                dispatcher,
                config,
                state: Mutex::new(SessionState::default()),
                command_lock: Mutex::new(()),
            }),
        })
    }

    /// Create a coordinator with the event-log and runtime-internals agents.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_default_agents(
        dispatcher: Arc<DebugDispatcher>,
        trace_log: Arc<TraceLog>,
        runtime_tracer: Arc<RuntimeTracer>,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        let coordinator = Self::new(dispatcher, config)?;
        let agent_config = AgentConfig::default();
        coordinator.register_agent(Box::new(EventLogAgent::with_config(trace_log, &agent_config)))?;
        coordinator.register_agent(Box::new(RuntimeInternalsAgent::with_config(
            runtime_tracer,
            &agent_config,
        )))?;
        Ok(coordinator)
    }

    /// Add an agent. Rejected while tracing is active.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register_agent(&self, agent: Box<dyn TraceAgent>) -> Result<()> {
        let _command = self.inner.command_lock.lock().unwrap();
        let mut state = self.inner.lock_state();
        if state.tracing_active {
            return Err(TracelinkError::AgentRegistrationWhileTracing(agent.name().to_string()));
        }
        info!(agent = agent.name(), "Registering trace agent");
        state.agents.push(AgentHost::spawn(agent));
        Ok(())
    }

    pub fn is_tracing(&self) -> bool {
        self.inner.lock_state().tracing_active
    }

    /// Categories of the active session, in request order
    pub fn categories(&self) -> Vec<String> {
        self.inner.lock_state().categories.clone()
    }

    pub fn agent_count(&self) -> usize {
        self.inner.lock_state().agents.len()
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.inner.lock_state().agents.iter().map(|a| a.name().to_string()).collect()
    }

    /// Agents that have reported in the most recent stop round
    pub fn agents_responded(&self) -> usize {
        self.inner.lock_state().agents_responded
    }

    /// Collected events not yet emitted
    pub fn buffered_len(&self) -> usize {
        self.inner.lock_state().aggregate.len()
    }

    /// Drain agents, detach from the dispatcher and return the resumable state.
    ///
    /// The session is left idle; only a thaw with the snapshot resumes it.
    pub fn freeze(&self) -> TracingSnapshot {
        self.inner.freeze()
    }

    /// Attach to the dispatcher and restore a frozen session, if any
    pub fn thaw(&self, snapshot: Option<TracingSnapshot>) {
        let handler = Arc::new(TracingDomain {
            coordinator: Arc::downgrade(&self.inner),
        });
        self.inner.thaw(handler, snapshot);
    }
}

/// Dispatcher-facing handler; holds the coordinator weakly so the dispatcher does
/// not keep it alive
struct TracingDomain {
    coordinator: Weak<CoordinatorInner>,
}

impl DomainHandler for TracingDomain {
    fn handle_command(&self, command: Command) {
        match self.coordinator.upgrade() {
            Some(coordinator) => coordinator.handle_command(command),
            None => command.send_error_response(ErrorCode::InternalError, "Tracing shut down"),
        }
    }
}

impl CoordinatorInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap()
    }

    fn handle_command(self: &Arc<Self>, command: Command) {
        let method = command.method().to_string();
        match method.as_str() {
            "start" => self.start(command),
            "end" => self.end(command),
            _ => command.send_error_response(
                ErrorCode::MethodNotFound,
                format!("Unknown method: {}.{}", TRACING_DOMAIN, method),
            ),
        }
    }

    fn start(self: &Arc<Self>, command: Command) {
        let _command = self.command_lock.lock().unwrap();
        let (agents, config) = {
            let mut state = self.lock_state();
            if state.tracing_active {
                command.send_error_response(ErrorCode::InvalidRequest, "Tracing already started");
                return;
            }

            let categories = match parse_categories(command.params()) {
                Ok(categories) => categories,
                Err(message) => {
                    command.send_error_response(ErrorCode::InvalidParams, message);
                    return;
                }
            };

            let session_id = Uuid::new_v4();
            state.categories = categories;
            state.aggregate.clear();
            state.agents_responded = 0;
            state.session_id = Some(session_id);
            state.tracing_active = true;
            info!(session = %session_id, categories = ?state.categories, "Tracing started");

            (state.agents.clone(), TraceConfig::from_categories(&state.categories))
        };

        for agent in &agents {
            agent.start(config.clone(), Box::new(on_start_tracing));
        }
        command.send_response();
    }

    fn end(self: &Arc<Self>, command: Command) {
        let _command = self.command_lock.lock().unwrap();
        let (agents, round) = {
            let mut state = self.lock_state();
            if !state.tracing_active {
                command.send_error_response(ErrorCode::InvalidRequest, "Tracing not started");
                return;
            }

            state.tracing_active = false;
            state.categories.clear();
            state.agents_responded = 0;
            let round = state.next_round;
            state.next_round += 1;
            let expected = state.agents.len();
            if expected > 0 {
                state.open_rounds.insert(round, StopRound { expected, responded: 0 });
            }
            info!(session = ?state.session_id, agents = expected, "Tracing ended");

            (state.agents.clone(), round)
        };

        command.send_response();

        if agents.is_empty() {
            self.dispatcher.send_event(TRACING_COMPLETE_EVENT, None);
            return;
        }
        for agent in &agents {
            let coordinator = self.clone();
            agent.stop(Box::new(move |report| coordinator.on_stop_tracing(round, report)));
        }
    }

    /// Merge one agent's document into the aggregate and emit batches
    fn on_stop_tracing(&self, round: u64, report: AgentReport) {
        info!(agent = report.agent_name.as_str(), label = report.event_label.as_str(), "Agent stopped tracing");
        let items = parse_document(&report);

        let mut state = self.lock_state();
        for item in items {
            state.aggregate.push(item);
            if state.aggregate.len() >= self.config.batch_threshold {
                self.send_data_collected(&mut state);
            }
        }
        self.send_data_collected(&mut state);

        let complete = match state.open_rounds.get_mut(&round) {
            Some(progress) => {
                progress.responded += 1;
                progress.responded >= progress.expected
            }
            None => {
                warn!(round, agent = report.agent_name.as_str(), "Report for unknown stop round");
                false
            }
        };
        if round + 1 == state.next_round {
            state.agents_responded += 1;
        }
        if complete {
            state.open_rounds.remove(&round);
            debug!(round, "All agents reported");
            self.dispatcher.send_event(TRACING_COMPLETE_EVENT, None);
        }
    }

    /// Emit everything buffered as one batch.
    ///
    /// An empty buffer sends nothing, so a round of empty documents yields only
    /// `tracingComplete` (DESIGN.md, open question 3).
    fn send_data_collected(&self, state: &mut SessionState) {
        if state.aggregate.is_empty() {
            return;
        }
        let value = std::mem::take(&mut state.aggregate);
        debug!(items = value.len(), "Sending collected trace events");
        self.dispatcher.send_event(DATA_COLLECTED_EVENT, Some(json!({ "value": value })));
    }

    fn freeze(&self) -> TracingSnapshot {
        let _command = self.command_lock.lock().unwrap();
        let (agents, snapshot) = {
            let mut state = self.lock_state();
            let snapshot = TracingSnapshot {
                started: state.tracing_active,
                categories: std::mem::take(&mut state.categories),
            };
            let agents = if state.tracing_active { state.agents.clone() } else { Vec::new() };

            // The drained agents are no longer capturing; only the snapshot resumes them
            state.tracing_active = false;
            state.aggregate.clear();
            (agents, snapshot)
        };

        for agent in &agents {
            agent.stop(Box::new(on_cancel_tracing));
        }
        self.dispatcher.remove_domain(TRACING_DOMAIN);
        info!(started = snapshot.started, "Tracing frozen");

        snapshot
    }

    fn thaw(&self, handler: Arc<TracingDomain>, snapshot: Option<TracingSnapshot>) {
        let _command = self.command_lock.lock().unwrap();
        self.dispatcher.add_domain(TRACING_DOMAIN, handler);
        let Some(snapshot) = snapshot else {
            return;
        };

        let (agents, config) = {
            let mut state = self.lock_state();
            state.tracing_active = snapshot.started;
            if !snapshot.started {
                state.categories.clear();
                return;
            }

            state.categories = snapshot.categories;
            state.aggregate.clear();
            state.agents_responded = 0;
            let session_id = Uuid::new_v4();
            state.session_id = Some(session_id);
            info!(session = %session_id, categories = ?state.categories, "Tracing resumed");

            let config = match self.config.resume_config {
                ResumeConfig::Default => {
                    if !state.categories.is_empty() {
                        warn!("Restarting agents with the default trace config; restored categories are not applied");
                    }
                    TraceConfig::default()
                }
                ResumeConfig::RestoredCategories => TraceConfig::from_categories(&state.categories),
            };
            (state.agents.clone(), config)
        };

        for agent in &agents {
            agent.start(config.clone(), Box::new(on_start_tracing));
        }
    }
}

fn on_start_tracing(agent_name: &str, success: bool) {
    if success {
        info!(agent = agent_name, "Agent started tracing");
    } else {
        warn!(agent = agent_name, "Agent failed to start tracing");
    }
}

fn on_cancel_tracing(report: AgentReport) {
    info!(agent = report.agent_name.as_str(), bytes = report.document.len(), "Agent cancelled tracing");
}

/// Split the comma-separated `categories` param; absent or empty yields nothing.
///
/// A present but non-string `categories` is rejected with a message for the caller.
fn parse_categories(params: &Value) -> std::result::Result<Vec<String>, String> {
    let categories = match params.get("categories") {
        Some(Value::String(categories)) => categories.as_str(),
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => return Err(format!("categories must be a string, got {}", other)),
    };
    if categories.is_empty() {
        return Ok(Vec::new());
    }

    let mut parsed: Vec<String> = categories.split(',').map(str::to_string).collect();
    if categories.ends_with(',') {
        parsed.pop();
    }
    Ok(parsed)
}

/// Extract trace event items from an agent document.
///
/// Accepts a JSON array of events or an object with a `traceEvents` array. Anything
/// else is logged and yields no items.
fn parse_document(report: &AgentReport) -> Vec<Value> {
    let agent = report.agent_name.as_str();
    match serde_json::from_str::<Value>(&report.document) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(mut object)) => match object.remove("traceEvents") {
            Some(Value::Array(items)) => items,
            _ => {
                error!(agent, "Events object has no traceEvents array");
                Vec::new()
            }
        },
        Ok(_) => {
            error!(agent, "Events document is not a list");
            Vec::new()
        }
        Err(e) => {
            error!(agent, error = %e, "Couldn't parse the events string");
            Vec::new()
        }
    }
}
