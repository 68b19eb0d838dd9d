//! Common error types used across the chart SDK crates
//! Provides consistent error handling and the error shape sent to the host

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Base error type for all chart SDK operations
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum ChartSdkError {
    // Lifecycle errors
    #[error("Multiple contexts not supported")]
    MultipleContextsNotSupported,

    #[error("Context not initialized")]
    ContextNotInitialized,

    #[error("Context destroyed")]
    ContextDestroyed,

    // Transport errors
    #[error("Operation timed out")]
    Timeout { duration_ms: u64 },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("{message}")]
    HostError { message: String },

    // Protocol errors
    #[error("Invalid payload for {event}: {message}")]
    InvalidPayload { event: String, message: String },

    #[error("Event type not recognised or processed: {event_type}")]
    UnrecognisedEvent { event_type: String },

    // Developer callback errors
    #[error("{message}")]
    Callback { message: String },
}

/// Result type alias for chart SDK operations
pub type SdkResult<T> = Result<T, ChartSdkError>;

impl ChartSdkError {
    pub fn invalid_payload(event: &str, err: impl std::fmt::Display) -> Self {
        ChartSdkError::InvalidPayload {
            event: event.to_string(),
            message: err.to_string(),
        }
    }

    pub fn unrecognised(event_type: &str) -> Self {
        ChartSdkError::UnrecognisedEvent {
            event_type: event_type.to_string(),
        }
    }

    /// Error shape that crosses the transport boundary
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.to_string())
    }
}

impl From<anyhow::Error> for ChartSdkError {
    fn from(err: anyhow::Error) -> Self {
        ChartSdkError::Callback {
            message: format!("{err:#}"),
        }
    }
}

/// `{hasError: true, error}` as exchanged with the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub has_error: bool,
    pub error: String,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            has_error: true,
            error: error.into(),
        }
    }

    /// Extract the error message from a reply carrying the error marker
    pub fn from_reply(reply: &Value) -> Option<String> {
        let has_error = reply.get("hasError").and_then(Value::as_bool)?;
        if !has_error {
            return None;
        }
        let message = match reply.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "Unknown error".to_string(),
            Some(other) => other.to_string(),
        };
        Some(message)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
