//! Building typed chart events from `(eventType, payload)` pairs
//!
//! JavaScript callers name outbound events by their wire string. Custom
//! actions arrive separately because their callbacks cannot be expressed
//! as JSON.

use chart_sdk_shared::{
    AlertToastPayload, AxisMenuPayload, ChartEvent, ChartSdkError, ContextMenuPayload,
    CustomAction, OutboundEvent, SdkResult, VisualProps,
};
use serde_json::{Map, Value};

/// Payload keys that hold custom actions rather than plain details
pub const ACTION_KEYS: [&str; 2] = ["customActions", "primaryAction"];

fn details(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(mut map) => {
            for key in ACTION_KEYS {
                map.remove(key);
            }
            map
        }
        _ => Map::new(),
    }
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

/// One argument of a JavaScript event handler call
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerArg {
    /// JavaScript `undefined`, distinct from a JSON `null`
    Undefined,
    Json(Value),
}

/// `(payload, previousResponse)` for a handler; no earlier response is `undefined`
pub fn handler_args(payload: Value, previous: Option<Value>) -> [HandlerArg; 2] {
    [
        HandlerArg::Json(payload),
        previous.map_or(HandlerArg::Undefined, HandlerArg::Json),
    ]
}

/// Typed event for `event_type`; `actions` are used by the menu and toast events
pub fn chart_event(event_type: &str, payload: Value, actions: Vec<CustomAction>) -> SdkResult<ChartEvent> {
    let event = OutboundEvent::parse(event_type).ok_or_else(|| ChartSdkError::unrecognised(event_type))?;

    let chart_event = match event {
        OutboundEvent::OpenContextMenu => ChartEvent::OpenContextMenu(ContextMenuPayload {
            custom_actions: actions,
            details: details(payload),
        }),
        OutboundEvent::OpenAxisMenu => ChartEvent::OpenAxisMenu(AxisMenuPayload {
            custom_actions: actions,
            details: details(payload),
        }),
        OutboundEvent::ShowGlobalAlertToast => {
            let message = string_field(&payload, "message")
                .ok_or_else(|| ChartSdkError::invalid_payload(event_type, "missing message"))?;
            let variant = string_field(&payload, "variant");
            let mut details = details(payload);
            details.remove("message");
            details.remove("variant");
            ChartEvent::ShowGlobalAlertToast(AlertToastPayload {
                message,
                variant,
                primary_action: actions.into_iter().next(),
                details,
            })
        }
        OutboundEvent::RenderError => {
            let error = match &payload {
                Value::String(error) => error.clone(),
                other => string_field(other, "error").unwrap_or_default(),
            };
            ChartEvent::RenderError { error }
        }
        OutboundEvent::UpdateVisualProps => {
            let visual_props = match payload {
                Value::Object(mut map) if map.contains_key("visualProps") => {
                    map.remove("visualProps").unwrap_or(Value::Null)
                }
                other => other,
            };
            ChartEvent::UpdateVisualProps {
                visual_props: VisualProps::from(visual_props),
            }
        }
        OutboundEvent::TrackChartInteraction => ChartEvent::TrackChartInteraction(payload),
        OutboundEvent::ShowToolTip => ChartEvent::ShowToolTip(payload),
        OutboundEvent::UpdateTml => ChartEvent::UpdateTml(payload),
        OutboundEvent::GetDataForQuery => ChartEvent::GetDataForQuery(payload),
        OutboundEvent::CloseContextMenu => ChartEvent::CloseContextMenu,
        OutboundEvent::CloseAxisMenu => ChartEvent::CloseAxisMenu,
        OutboundEvent::RenderStart => ChartEvent::RenderStart,
        OutboundEvent::RenderComplete => ChartEvent::RenderComplete,
        OutboundEvent::HideToolTip => ChartEvent::HideToolTip,
        OutboundEvent::ShowLoader => ChartEvent::ShowLoader,
        OutboundEvent::HideLoader => ChartEvent::HideLoader,
    };
    Ok(chart_event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_handler_sees_undefined_previous() {
        let [payload, previous] = handler_args(json!({"x": 1}), None);
        assert_eq!(payload, HandlerArg::Json(json!({"x": 1})));
        assert_eq!(previous, HandlerArg::Undefined);

        let [_, previous] = handler_args(json!({}), Some(Value::Null));
        assert_eq!(previous, HandlerArg::Json(Value::Null));

        let [_, previous] = handler_args(json!({}), Some(json!({"isDownloadHandled": false})));
        assert_eq!(previous, HandlerArg::Json(json!({"isDownloadHandled": false})));
    }

    #[test]
    fn test_unknown_event_type() {
        let err = chart_event("Initialize", Value::Null, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "Event type not recognised or processed: Initialize");
    }

    #[test]
    fn test_context_menu_keeps_details() {
        let event = chart_event(
            "OpenContextMenu",
            json!({"event": {"clientX": 10}, "clickedPoint": {"x": 1}, "customActions": [{"id": "a"}]}),
            vec![CustomAction::new("a", "A")],
        )
        .unwrap();

        match event {
            ChartEvent::OpenContextMenu(menu) => {
                assert_eq!(menu.custom_actions.len(), 1);
                assert!(!menu.details.contains_key("customActions"));
                assert_eq!(menu.details["clickedPoint"], json!({"x": 1}));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_toast_requires_message() {
        assert!(matches!(
            chart_event("ShowGlobalAlertToast", json!({}), vec![]),
            Err(ChartSdkError::InvalidPayload { .. })
        ));

        let event = chart_event(
            "ShowGlobalAlertToast",
            json!({"message": "Saved", "variant": "success", "duration": 5}),
            vec![CustomAction::new("undo", "Undo")],
        )
        .unwrap();
        match event {
            ChartEvent::ShowGlobalAlertToast(toast) => {
                assert_eq!(toast.message, "Saved");
                assert_eq!(toast.variant.as_deref(), Some("success"));
                assert_eq!(toast.primary_action.map(|a| a.id), Some("undo".to_string()));
                assert_eq!(Value::Object(toast.details), json!({"duration": 5}));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_render_error_and_visual_props() {
        match chart_event("RenderError", json!({"error": "no data"}), vec![]).unwrap() {
            ChartEvent::RenderError { error } => assert_eq!(error, "no data"),
            other => panic!("unexpected event {other:?}"),
        }
        match chart_event("RenderError", json!("boom"), vec![]).unwrap() {
            ChartEvent::RenderError { error } => assert_eq!(error, "boom"),
            other => panic!("unexpected event {other:?}"),
        }
        match chart_event("UpdateVisualProps", json!({"visualProps": {"color": "red"}}), vec![]).unwrap() {
            ChartEvent::UpdateVisualProps { visual_props } => {
                assert_eq!(visual_props, VisualProps::Structured(json!({"color": "red"})));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_payload_events_pass_through() {
        match chart_event("UpdateTML", json!({"tml": 1}), vec![]).unwrap() {
            ChartEvent::UpdateTml(payload) => assert_eq!(payload, json!({"tml": 1})),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            chart_event("HideLoader", json!({"ignored": true}), vec![]).unwrap(),
            ChartEvent::HideLoader
        ));
    }
}
