//! Commands received from the controller and their responses.
//!
//! A [`Command`] carries a one-shot responder: answering it consumes the command, so
//! each command gets exactly one reply. Dropping a command without answering it
//! replies with an internal error instead of leaving the caller waiting.

use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Protocol error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    /// Numeric JSON-RPC style code
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
        }
    }
}

/// Reply to a command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    Success(Option<Value>),
    Error { code: ErrorCode, message: String },
}

impl CommandResponse {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        CommandResponse::Error {
            code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandResponse::Success(_))
    }

    /// Wire form: `{"result": ...}` or `{"error": {"code", "message"}}`
    pub fn to_json(&self) -> Value {
        match self {
            CommandResponse::Success(result) => {
                json!({ "result": result.clone().unwrap_or_else(|| json!({})) })
            }
            CommandResponse::Error { code, message } => {
                json!({ "error": { "code": code.code(), "message": message } })
            }
        }
    }
}

/// A command addressed to one domain
#[derive(Debug)]
pub struct Command {
    domain: String,
    method: String,
    params: Value,
    responder: Option<oneshot::Sender<CommandResponse>>,
}

impl Command {
    /// Create a command and the receiver its response will arrive on
    pub fn new(
        domain: impl Into<String>,
        method: impl Into<String>,
        params: Value,
    ) -> (Self, oneshot::Receiver<CommandResponse>) {
        let (tx, rx) = oneshot::channel();
        let command = Self {
            domain: domain.into(),
            method: method.into(),
            params,
            responder: Some(tx),
        };
        (command, rx)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Reply with success and no payload
    pub fn send_response(self) {
        self.respond(CommandResponse::Success(None));
    }

    /// Reply with success and a payload
    pub fn send_response_with(self, result: Value) {
        self.respond(CommandResponse::Success(Some(result)));
    }

    pub fn send_error_response(self, code: ErrorCode, message: impl Into<String>) {
        self.respond(CommandResponse::error(code, message));
    }

    fn respond(mut self, response: CommandResponse) {
        if let Some(responder) = self.responder.take() {
            // The caller may have given up waiting
            let _ = responder.send(response);
        }
    }
}

impl Drop for Command {
    fn drop(&mut self) {
        if let Some(responder) = self.responder.take() {
            let _ = responder.send(CommandResponse::error(
                ErrorCode::InternalError,
                format!("{}.{} dropped without a response", self.domain, self.method),
            ));
        }
    }
}
