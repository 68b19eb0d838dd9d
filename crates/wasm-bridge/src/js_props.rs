//! [`ChartContextProps`] built from a JavaScript props object

use crate::convert::{call_deferred, decode_or_default, from_js, get, get_function, js_message, to_js};
use crate::js_context::JsChartContext;
use anyhow::anyhow;
use chart_sdk_context::{
    ChartConfigEditorDefinition, ChartContext, ChartContextProps, EditorDefinition,
    VisualPropEditorDefinition,
};
use chart_sdk_shared::{ChartConfig, ChartModel, Deferred, Query, ValidationResponse, VisualProps};
use js_sys::{Array, Function};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

fn required(props: &JsValue, key: &str) -> Result<Function, JsValue> {
    get_function(props, key).ok_or_else(|| JsValue::from_str(&format!("props.{key} must be a function")))
}

fn args(values: &[JsValue]) -> Array {
    values.iter().collect()
}

fn arg<T: Serialize + ?Sized>(value: &T) -> JsValue {
    to_js(value).unwrap_or(JsValue::NULL)
}

fn validation(what: &'static str, f: &Function, values: &[JsValue]) -> Deferred<ValidationResponse> {
    call_deferred(f, &args(values)).map(move |result| match result.and_then(from_js::<ValidationResponse>) {
        Ok(response) => response,
        Err(err) => {
            let message = js_message(&err);
            log::warn!("{what} failed: {message}");
            ValidationResponse::with_error(message)
        }
    })
}

/// Static value or a `(chartModel, context, activeColumnId)` function
fn editor_definition<T>(props: &JsValue, key: &str) -> Result<Option<EditorDefinition<T>>, JsValue>
where
    T: DeserializeOwned + Default + Clone + 'static,
{
    let Some(value) = get(props, key) else {
        return Ok(None);
    };
    if let Ok(f) = value.clone().dyn_into::<Function>() {
        let what = format!("props.{key}");
        return Ok(Some(EditorDefinition::dynamic(
            move |model: &ChartModel, context: &ChartContext, active_column_id: Option<&str>| {
                let result = f.apply(
                    &JsValue::NULL,
                    &args(&[
                        arg(model),
                        JsChartContext::from(context.clone()).into(),
                        arg(&active_column_id),
                    ]),
                );
                decode_or_default(&what, result)
            },
        )));
    }
    Ok(Some(EditorDefinition::Static(from_js(value)?)))
}

/// Read chart callbacks from `props`
///
/// `getDefaultChartConfig`, `getQueriesFromChartConfig` and `renderChart`
/// are required. Callbacks may return promises where the host waits for
/// an answer.
pub fn props_from_js(props: &JsValue) -> Result<ChartContextProps, JsValue> {
    let default_config = required(props, "getDefaultChartConfig")?;
    let queries = required(props, "getQueriesFromChartConfig")?;
    let render = required(props, "renderChart")?;

    let mut chart_props = ChartContextProps::new(
        move |model: &ChartModel| -> Vec<ChartConfig> {
            let result = default_config.apply(&JsValue::NULL, &args(&[arg(model)]));
            decode_or_default("getDefaultChartConfig", result)
        },
        move |config: &[ChartConfig], model: &ChartModel| -> Vec<Query> {
            let result = queries.apply(&JsValue::NULL, &args(&[arg(config), arg(model)]));
            decode_or_default("getQueriesFromChartConfig", result)
        },
        move |context: ChartContext| -> Deferred<anyhow::Result<()>> {
            let context: JsValue = JsChartContext::from(context).into();
            call_deferred(&render, &args(&[context]))
                .map(|result| result.map(|_| ()).map_err(|err| anyhow!(js_message(&err))))
        },
    );

    if let Some(validate) = get_function(props, "validateConfig") {
        chart_props = chart_props.with_validate_config(move |config: &[ChartConfig], model: &ChartModel| {
            validation("validateConfig", &validate, &[arg(config), arg(model)])
        });
    }

    if let Some(validate) = get_function(props, "validateVisualProps") {
        chart_props = chart_props.with_validate_visual_props(
            move |visual_props: Option<&VisualProps>, model: &ChartModel, active_column_id: Option<&str>| {
                validation(
                    "validateVisualProps",
                    &validate,
                    &[arg(&visual_props), arg(model), arg(&active_column_id)],
                )
            },
        );
    }

    if let Some(definition) =
        editor_definition::<Vec<ChartConfigEditorDefinition>>(props, "chartConfigEditorDefinition")?
    {
        chart_props = chart_props.with_chart_config_editor_definition(definition);
    }

    if let Some(definition) =
        editor_definition::<VisualPropEditorDefinition>(props, "visualPropEditorDefinition")?
    {
        chart_props = chart_props.with_visual_prop_editor_definition(definition);
    }

    if let Some(track) = get_function(props, "trackMixpanelEvent") {
        chart_props = chart_props.with_track_mixpanel_event(move |payload: &Value, visual_props: &Value| {
            let result = track.apply(&JsValue::NULL, &args(&[arg(payload), arg(visual_props)]));
            let value: Value = decode_or_default("trackMixpanelEvent", result);
            (!value.is_null()).then_some(value)
        });
    }

    let reverse = get(props, "reverseEventExecutionOrder")
        .and_then(|value| value.as_bool())
        .unwrap_or(false);
    Ok(chart_props.with_reverse_event_execution_order(reverse))
}

