//! Notifications pushed to the controller.
//!
//! Notifications are asynchronous messages that are not replies to a specific
//! command, such as `Tracing.dataCollected` and `Tracing.tracingComplete`. They are
//! keyed by a `Domain.event` method name and carry optional JSON params.
//!
//! # Examples
//!
//! ```
//! use tracelink::event::Notification;
//! use serde_json::json;
//!
//! let notification = Notification::new("Tracing.dataCollected", Some(json!({"value": []})));
//! assert_eq!(notification.domain(), "Tracing");
//! assert_eq!(notification.event_name(), "dataCollected");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event sent from the backend to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// The domain part of the method name
    pub fn domain(&self) -> &str {
        self.method.split_once('.').map(|(domain, _)| domain).unwrap_or(&self.method)
    }

    /// The event part of the method name
    pub fn event_name(&self) -> &str {
        self.method.split_once('.').map(|(_, name)| name).unwrap_or("")
    }
}
