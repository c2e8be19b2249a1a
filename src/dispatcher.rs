//! Command routing between a controller and backend domains.
//!
//! The [`DebugDispatcher`] maps domain names (e.g. `Tracing`) to handlers and routes
//! `Domain.method` commands to them. Notifications sent through the dispatcher are
//! forwarded to the controller over an unbounded channel, so sending never blocks the
//! caller.
//!
//! # Examples
//!
//! ```ignore
//! use tracelink::dispatcher::DebugDispatcher;
//!
//! let (dispatcher, mut notifications) = DebugDispatcher::new();
//! dispatcher.add_domain("Tracing", handler);
//! let response = dispatcher.dispatch("Tracing.start", json!({"categories": "net"})).await;
//! ```

use crate::command::{Command, CommandResponse, ErrorCode};
use crate::event::Notification;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// A backend domain that answers commands.
///
/// Handlers must not block: they either answer immediately or hand the command off
/// to work that answers it later.
pub trait DomainHandler: Send + Sync {
    fn handle_command(&self, command: Command);
}

/// Routes commands to registered domains and forwards notifications
pub struct DebugDispatcher {
    domains: Mutex<HashMap<String, Arc<dyn DomainHandler>>>,
    event_sender: mpsc::UnboundedSender<Notification>,
}

impl DebugDispatcher {
    /// Create a dispatcher and the receiving end of its notification channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let dispatcher = Self {
            domains: Mutex::new(HashMap::new()),
            event_sender,
        };
        (dispatcher, event_receiver)
    }

    /// Register a handler for a domain, replacing any previous one
    pub fn add_domain(&self, domain: impl Into<String>, handler: Arc<dyn DomainHandler>) {
        let domain = domain.into();
        debug!(domain = domain.as_str(), "Adding domain");
        self.domains.lock().unwrap().insert(domain, handler);
    }

    /// Unregister a domain; returns whether it was registered
    pub fn remove_domain(&self, domain: &str) -> bool {
        debug!(domain, "Removing domain");
        self.domains.lock().unwrap().remove(domain).is_some()
    }

    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains.lock().unwrap().contains_key(domain)
    }

    /// Route a `Domain.method` command and wait for its response
    pub async fn dispatch(&self, method: &str, params: Value) -> CommandResponse {
        let Some((domain, name)) = method.split_once('.') else {
            return CommandResponse::error(
                ErrorCode::MethodNotFound,
                format!("Malformed method name: {}", method),
            );
        };

        let handler = self.domains.lock().unwrap().get(domain).cloned();
        let Some(handler) = handler else {
            return CommandResponse::error(
                ErrorCode::MethodNotFound,
                format!("Unknown domain: {}", domain),
            );
        };

        debug!(domain, method = name, "Dispatching command");
        let (command, response) = Command::new(domain, name, params);
        handler.handle_command(command);

        response.await.unwrap_or_else(|_| {
            CommandResponse::error(ErrorCode::InternalError, "Command responder closed")
        })
    }

    /// Send a notification to the controller
    pub fn send_event(&self, method: impl Into<String>, params: Option<Value>) {
        let notification = Notification::new(method, params);
        if self.event_sender.send(notification).is_err() {
            debug!("Controller link closed, dropping notification");
        }
    }
}
