//! Custom menu actions and the payloads that carry them
//!
//! A [`CustomAction`] holds a local callback that must never leave the
//! iframe. Before a menu payload is transmitted every action is reduced to
//! a [`SanitizedAction`], and the callbacks are kept in a lookup table
//! keyed by action id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// Callback invoked when the host reports a click on a custom action
pub type ActionCallback = Rc<dyn Fn(&[Value]) -> anyhow::Result<()>>;

#[derive(Clone, Default)]
pub struct CustomAction {
    pub id: String,
    pub label: String,
    pub icon: Option<String>,
    pub disabled: Option<bool>,
    pub tooltip: Option<String>,
    pub cascading_items: Vec<CustomAction>,
    pub on_click: Option<ActionCallback>,
}

impl CustomAction {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_on_click<F>(mut self, on_click: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + 'static,
    {
        self.on_click = Some(Rc::new(on_click));
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn with_cascading_items(mut self, items: Vec<CustomAction>) -> Self {
        self.cascading_items = items;
        self
    }

    /// Copy of this action with the callback stripped, recursively
    pub fn sanitized(&self) -> SanitizedAction {
        SanitizedAction {
            id: self.id.clone(),
            label: self.label.clone(),
            icon: self.icon.clone(),
            disabled: self.disabled,
            tooltip: self.tooltip.clone(),
            cascading_items: if self.cascading_items.is_empty() {
                None
            } else {
                Some(self.cascading_items.iter().map(Self::sanitized).collect())
            },
        }
    }
}

impl fmt::Debug for CustomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAction")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("icon", &self.icon)
            .field("disabled", &self.disabled)
            .field("tooltip", &self.tooltip)
            .field("cascading_items", &self.cascading_items)
            .field("on_click", &self.on_click.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Transmittable form of a [`CustomAction`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedAction {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascading_items: Option<Vec<SanitizedAction>>,
}

/// Payload of `OpenContextMenu`
///
/// `details` holds everything besides the actions (pointer position,
/// clicked point, ...) and is sent as-is.
#[derive(Debug, Clone, Default)]
pub struct ContextMenuPayload {
    pub custom_actions: Vec<CustomAction>,
    pub details: Map<String, Value>,
}

impl ContextMenuPayload {
    pub fn new(custom_actions: Vec<CustomAction>) -> Self {
        Self {
            custom_actions,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Payload of `OpenAxisMenu`
#[derive(Debug, Clone, Default)]
pub struct AxisMenuPayload {
    pub custom_actions: Vec<CustomAction>,
    pub details: Map<String, Value>,
}

impl AxisMenuPayload {
    pub fn new(custom_actions: Vec<CustomAction>) -> Self {
        Self {
            custom_actions,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Payload of `ShowGlobalAlertToast`, with an optional single primary action
#[derive(Debug, Clone, Default)]
pub struct AlertToastPayload {
    pub message: String,
    pub variant: Option<String>,
    pub primary_action: Option<CustomAction>,
    pub details: Map<String, Value>,
}

impl AlertToastPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_primary_action(mut self, action: CustomAction) -> Self {
        self.primary_action = Some(action);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitized_action_has_no_callback() {
        let action = CustomAction::new("parent", "Parent")
            .with_icon("star")
            .with_on_click(|_| Ok(()))
            .with_cascading_items(vec![
                CustomAction::new("child", "Child").with_on_click(|_| Ok(()))
            ]);

        let json = serde_json::to_value(action.sanitized()).unwrap();
        assert_eq!(
            json,
            json!({
                "id": "parent",
                "label": "Parent",
                "icon": "star",
                "cascadingItems": [{"id": "child", "label": "Child"}],
            })
        );
        assert!(!json.to_string().contains("onClick"));
    }

    #[test]
    fn test_debug_hides_callback() {
        let action = CustomAction::new("a", "A").with_on_click(|_| Ok(()));
        assert!(format!("{action:?}").contains("<callback>"));
    }
}
