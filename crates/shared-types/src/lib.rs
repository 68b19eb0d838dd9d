//! Shared types for the chart SDK
//!
//! This crate contains the types that cross the boundary between the chart
//! iframe and the host application: the message envelope, the event
//! enums, the mirrored chart model and the custom action descriptions.
//! Everything here is plain data apart from [`Deferred`], which carries
//! either a value or a pending future for it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod actions;
pub mod deferred;
pub mod errors;
pub mod events;
pub mod model;

pub use actions::{
    ActionCallback, AlertToastPayload, AxisMenuPayload, ContextMenuPayload, CustomAction,
    SanitizedAction,
};
pub use deferred::Deferred;
pub use errors::{ChartSdkError, ErrorPayload, SdkResult};
pub use events::{ChartEvent, ExternalEvent, InboundEvent, OutboundEvent};
pub use model::{
    AppConfig, ChartColumn, ChartConfig, ChartConfigDimension, ChartModel, ColumnType,
    DataPointsArray, LocaleOptions, Query, QueryData, VisualProps,
};

/// Source tag stamped on every message the chart sends
pub const OUTBOUND_SOURCE: &str = "ts-chart-sdk";

/// Source tag the host stamps on every message it sends
pub const INBOUND_SOURCE: &str = "ts-host-app";

/// Message envelope exchanged over `postMessage`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
    pub event_type: String,
    #[serde(default)]
    pub source: String,
}

impl Envelope {
    /// Build an outbound envelope addressed to a host-side chart instance
    pub fn outbound(component_id: &str, event_type: &str, payload: Option<Value>) -> Self {
        Self {
            component_id: Some(component_id.to_string()),
            payload: payload.unwrap_or(Value::Null),
            event_type: event_type.to_string(),
            source: OUTBOUND_SOURCE.to_string(),
        }
    }

    /// Build an envelope as the host would send it
    pub fn from_host(event_type: &str, payload: Value) -> Self {
        Self {
            component_id: None,
            payload,
            event_type: event_type.to_string(),
            source: INBOUND_SOURCE.to_string(),
        }
    }

    pub fn to_value(&self) -> Value {
        // Envelope only holds strings and JSON values, serialization cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Identity of the host-side chart instance this iframe talks to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionIdentity {
    pub component_id: String,
    pub host_url: String,
}

/// Outcome of a validator or a custom action invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error_message: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResponse {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_messages(messages: Vec<String>) -> Self {
        Self {
            is_valid: false,
            validation_error_message: Some(messages),
            error: None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_envelope_shape() {
        let envelope = Envelope::outbound("C1", "RenderStart", None);
        assert_eq!(
            envelope.to_value(),
            json!({
                "componentId": "C1",
                "payload": null,
                "eventType": "RenderStart",
                "source": "ts-chart-sdk",
            })
        );
    }

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let envelope: Envelope =
            serde_json::from_value(json!({"eventType": "DataUpdate"})).unwrap();
        assert_eq!(envelope.payload, Value::Null);
        assert_eq!(envelope.source, "");
        assert!(envelope.component_id.is_none());
    }

    #[test]
    fn test_validation_response_serialization() {
        assert_eq!(ValidationResponse::invalid().to_value(), json!({"isValid": false}));
        assert_eq!(
            ValidationResponse::with_error("boom").to_value(),
            json!({"isValid": false, "error": "boom"})
        );
    }
}
