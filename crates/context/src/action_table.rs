//! Lookup tables for custom action callbacks
//!
//! Callbacks stay in the iframe. The host only ever sees the sanitized
//! actions and reports clicks back by id.

use chart_sdk_shared::{ActionCallback, CustomAction, SanitizedAction, ValidationResponse};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Callback used for actions without `on_click` and for unknown ids
pub fn noop_callback() -> ActionCallback {
    Rc::new(|_: &[Value]| Ok(()))
}

/// Run a callback, turning its failure into an invalid response
pub fn invoke_callback(callback: &ActionCallback, args: &[Value]) -> ValidationResponse {
    match callback(args) {
        Ok(()) => ValidationResponse::valid(),
        Err(err) => {
            log::warn!("Custom action callback failed: {:#}", err);
            ValidationResponse::with_error(format!("{err:#}"))
        }
    }
}

/// Action id to callback, replaced wholesale on every menu emission
#[derive(Default)]
pub struct ActionHandlerTable {
    handlers: HashMap<String, ActionCallback>,
}

impl ActionHandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table with `actions` and return their transmittable form
    ///
    /// Cascading items are flattened into the table next to their parent.
    pub fn rebuild(&mut self, actions: &[CustomAction]) -> Vec<SanitizedAction> {
        self.handlers.clear();
        actions.iter().for_each(|action| self.record(action));
        actions.iter().map(CustomAction::sanitized).collect()
    }

    fn record(&mut self, action: &CustomAction) {
        let callback = action.on_click.clone().unwrap_or_else(noop_callback);
        if self.handlers.insert(action.id.clone(), callback).is_some() {
            log::warn!("Duplicate custom action id '{}', last one wins", action.id);
        }
        action.cascading_items.iter().for_each(|item| self.record(item));
    }

    pub fn contains(&self, action_id: &str) -> bool {
        self.handlers.contains_key(action_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Stored callback for `action_id`, or a no-op when there is none
    pub fn callback_or_noop(&self, action_id: &str) -> ActionCallback {
        self.handlers
            .get(action_id)
            .cloned()
            .unwrap_or_else(noop_callback)
    }

    pub fn invoke(&self, action_id: &str, args: &[Value]) -> ValidationResponse {
        invoke_callback(&self.callback_or_noop(action_id), args)
    }
}

/// The single primary action of the last alert toast
#[derive(Default)]
pub struct ToastActionSlot {
    action: Option<(String, ActionCallback)>,
}

impl ToastActionSlot {
    /// Store the toast's primary action, dropping the previous one
    pub fn replace(&mut self, action: Option<&CustomAction>) -> Option<SanitizedAction> {
        self.action = action.map(|action| {
            let callback = action.on_click.clone().unwrap_or_else(noop_callback);
            (action.id.clone(), callback)
        });
        action.map(CustomAction::sanitized)
    }

    pub fn action_id(&self) -> Option<&str> {
        self.action.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn clear(&mut self) {
        self.action = None;
    }

    pub fn callback_or_noop(&self, action_id: &str) -> ActionCallback {
        match &self.action {
            Some((id, callback)) if id == action_id => callback.clone(),
            _ => noop_callback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn recording(log: &Rc<RefCell<Vec<Value>>>) -> impl Fn(&[Value]) -> anyhow::Result<()> {
        let log = log.clone();
        move |args: &[Value]| {
            log.borrow_mut().extend(args.iter().cloned());
            Ok(())
        }
    }

    #[test]
    fn test_rebuild_flattens_cascading_items() {
        let clicks = Rc::new(RefCell::new(Vec::new()));
        let mut table = ActionHandlerTable::new();
        let sanitized = table.rebuild(&[CustomAction::new("parent", "Parent")
            .with_cascading_items(vec![
                CustomAction::new("child", "Child").with_on_click(recording(&clicks))
            ])]);

        assert_eq!(sanitized.len(), 1);
        assert_eq!(sanitized[0].cascading_items.as_ref().map(Vec::len), Some(1));
        assert!(table.contains("parent"));
        assert!(table.contains("child"));

        assert_eq!(table.invoke("child", &[json!({"x": 1})]), ValidationResponse::valid());
        assert_eq!(*clicks.borrow(), vec![json!({"x": 1})]);
    }

    #[test]
    fn test_rebuild_replaces_previous_entries() {
        let mut table = ActionHandlerTable::new();
        table.rebuild(&[CustomAction::new("old", "Old")]);
        table.rebuild(&[CustomAction::new("new", "New")]);
        assert!(!table.contains("old"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let table = ActionHandlerTable::new();
        assert!(table.is_empty());
        assert_eq!(table.invoke("missing", &[]), ValidationResponse::valid());
    }

    #[test]
    fn test_failing_callback_is_contained() {
        let mut table = ActionHandlerTable::new();
        table.rebuild(&[CustomAction::new("boom", "Boom")
            .with_on_click(|_: &[Value]| Err(anyhow::anyhow!("handler exploded")))]);

        assert_eq!(
            table.invoke("boom", &[]),
            ValidationResponse::with_error("handler exploded")
        );
    }

    #[test]
    fn test_toast_slot_holds_single_action() {
        let clicks = Rc::new(RefCell::new(Vec::new()));
        let mut slot = ToastActionSlot::default();
        let sanitized = slot.replace(Some(
            &CustomAction::new("undo", "Undo").with_on_click(recording(&clicks)),
        ));
        assert_eq!(sanitized.map(|action| action.id), Some("undo".to_string()));
        assert_eq!(slot.action_id(), Some("undo"));

        invoke_callback(&slot.callback_or_noop("other"), &[json!(1)]);
        invoke_callback(&slot.callback_or_noop("undo"), &[json!(2)]);
        assert_eq!(*clicks.borrow(), vec![json!(2)]);

        assert!(slot.replace(None).is_none());
        assert_eq!(slot.action_id(), None);
    }
}
