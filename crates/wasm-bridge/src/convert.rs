//! Conversions between JavaScript values and the SDK's JSON types

use anyhow::anyhow;
use chart_sdk_shared::{ChartSdkError, CustomAction, Deferred};
use js_sys::{Array, Function, Object, Promise, Reflect};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::wire::ACTION_KEYS;

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

pub(crate) fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(JsValue::from)
}

/// Readable message for a thrown JavaScript value
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

pub(crate) fn sdk_error_to_js(err: ChartSdkError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

pub(crate) fn get(object: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(object, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

pub(crate) fn get_function(object: &JsValue, key: &str) -> Option<Function> {
    get(object, key).and_then(|value| value.dyn_into::<Function>().ok())
}

/// Call `f`, awaiting the result if it returned a promise
pub(crate) fn call_deferred(f: &Function, args: &Array) -> Deferred<Result<JsValue, JsValue>> {
    match f.apply(&JsValue::NULL, args) {
        Ok(result) => match result.dyn_into::<Promise>() {
            Ok(promise) => Deferred::pending(JsFuture::from(promise)),
            Err(value) => Deferred::ready(Ok(value)),
        },
        Err(err) => Deferred::ready(Err(err)),
    }
}

/// Decode a callback result, logging instead of failing
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(what: &str, value: Result<JsValue, JsValue>) -> T {
    match value.and_then(from_js) {
        Ok(decoded) => decoded,
        Err(err) => {
            log::error!("{what} failed: {}", js_message(&err));
            T::default()
        }
    }
}

/// JSON copy of a payload object, leaving out the action entries
pub(crate) fn plain_payload(payload: &JsValue) -> Result<Value, JsValue> {
    if !payload.is_object() || Array::is_array(payload) {
        return if payload.is_undefined() {
            Ok(Value::Null)
        } else {
            from_js(payload.clone())
        };
    }

    let mut map = Map::new();
    for key in Object::keys(payload.unchecked_ref::<Object>()).iter() {
        let Some(key) = key.as_string() else { continue };
        if ACTION_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = Reflect::get(payload, &JsValue::from_str(&key))?;
        if value.is_function() || value.is_undefined() {
            continue;
        }
        map.insert(key, from_js(value)?);
    }
    Ok(Value::Object(map))
}

/// Custom action described by a JavaScript object with an `onClick` function
fn custom_action(object: &JsValue) -> Result<CustomAction, JsValue> {
    let id = get(object, "id")
        .and_then(|id| id.as_string())
        .ok_or_else(|| JsValue::from_str("custom action is missing an id"))?;
    let label = get(object, "label").and_then(|label| label.as_string()).unwrap_or_default();

    let mut action = CustomAction::new(id, label);
    action.icon = get(object, "icon").and_then(|icon| icon.as_string());
    action.tooltip = get(object, "tooltip").and_then(|tooltip| tooltip.as_string());
    action.disabled = get(object, "disabled").and_then(|disabled| disabled.as_bool());
    if let Some(items) = get(object, "cascadingItems") {
        action.cascading_items = custom_actions(&items)?;
    }
    if let Some(on_click) = get_function(object, "onClick") {
        action = action.with_on_click(move |args: &[Value]| {
            let js_args = Array::new();
            for arg in args {
                js_args.push(&to_js(arg).map_err(|err| anyhow!(js_message(&err)))?);
            }
            on_click
                .apply(&JsValue::NULL, &js_args)
                .map(|_| ())
                .map_err(|err| anyhow!(js_message(&err)))
        });
    }
    Ok(action)
}

pub(crate) fn custom_actions(array: &JsValue) -> Result<Vec<CustomAction>, JsValue> {
    if !Array::is_array(array) {
        return Ok(Vec::new());
    }
    array.unchecked_ref::<Array>().iter().map(|item| custom_action(&item)).collect()
}

/// Custom actions carried by an outbound payload object
pub(crate) fn payload_actions(payload: &JsValue) -> Result<Vec<CustomAction>, JsValue> {
    let mut actions = match get(payload, "customActions") {
        Some(list) => custom_actions(&list)?,
        None => Vec::new(),
    };
    if let Some(primary) = get(payload, "primaryAction") {
        actions.push(custom_action(&primary)?);
    }
    Ok(actions)
}
