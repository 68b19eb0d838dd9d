//! Formatting helpers exported to JavaScript

use crate::convert::{from_js, to_js};
use chart_sdk_formatting::{
    evaluate_conditional_format, format_date, format_number, ConditionalFormatRule, FormatConfig,
};
use chart_sdk_shared::{DataPointsArray, LocaleOptions};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

fn optional<T: DeserializeOwned>(value: JsValue) -> Result<Option<T>, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    from_js(value).map(Some)
}

fn json(value: JsValue) -> Value {
    optional::<Value>(value).ok().flatten().unwrap_or(Value::Null)
}

#[wasm_bindgen(js_name = formatNumber)]
pub fn format_number_js(value: JsValue, format_config: JsValue, column_format_config: JsValue) -> String {
    let format_config: Option<FormatConfig> = optional(format_config).unwrap_or_default();
    let column_format_config: Option<FormatConfig> = optional(column_format_config).unwrap_or_default();
    format_number(&json(value), format_config.as_ref(), column_format_config.as_ref())
}

#[wasm_bindgen(js_name = formatDate)]
pub fn format_date_js(value: JsValue, pattern: &str, use_system_calendar: bool, locale_options: JsValue) -> String {
    let locale_options: Option<LocaleOptions> = optional(locale_options).unwrap_or_default();
    format_date(&json(value), pattern, use_system_calendar, locale_options.as_ref())
}

/// Matching rule, or `null` when no rule applies
#[wasm_bindgen(js_name = evaluateConditionalFormat)]
pub fn evaluate_conditional_format_js(
    row_index: usize,
    column_id: &str,
    data_points: JsValue,
    rules: JsValue,
    parameters: JsValue,
) -> Result<JsValue, JsValue> {
    let data_points: DataPointsArray = from_js(data_points)?;
    let rules: Vec<ConditionalFormatRule> = from_js(rules)?;
    let parameters: Option<Map<String, Value>> = optional(parameters)?;

    match evaluate_conditional_format(row_index, column_id, &data_points, &rules, parameters.as_ref()) {
        Some(rule) => to_js(rule),
        None => Ok(JsValue::NULL),
    }
}
