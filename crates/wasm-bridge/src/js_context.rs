//! JavaScript handle around [`ChartContext`]

use crate::convert::{
    call_deferred, from_js, js_message, payload_actions, plain_payload, sdk_error_to_js, to_js,
};
use crate::wire::{chart_event, handler_args, HandlerArg};
use chart_sdk_context::{ChartContext, ContextState};
use chart_sdk_shared::{ExternalEvent, InboundEvent};
use js_sys::{Array, Function, Promise};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

#[wasm_bindgen(js_name = ChartContext)]
pub struct JsChartContext {
    inner: ChartContext,
}

impl From<ChartContext> for JsChartContext {
    fn from(inner: ChartContext) -> Self {
        Self { inner }
    }
}

impl JsChartContext {
    pub fn context(&self) -> &ChartContext {
        &self.inner
    }
}

fn external_event(event_type: &str) -> Result<ExternalEvent, JsValue> {
    InboundEvent::parse(event_type)
        .and_then(ExternalEvent::from_inbound)
        .ok_or_else(|| JsValue::from_str(&format!("{event_type} cannot be handled by the chart")))
}

#[wasm_bindgen(js_class = ChartContext)]
impl JsChartContext {
    #[wasm_bindgen(getter, js_name = instanceId)]
    pub fn instance_id(&self) -> String {
        self.inner.instance_id().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        match self.inner.state() {
            ContextState::Uninitialized => "uninitialized",
            ContextState::AwaitingHostAck => "awaitingHostAck",
            ContextState::Ready => "ready",
            ContextState::Destroyed => "destroyed",
        }
        .to_string()
    }

    /// Resolves once the host completes the handshake
    pub fn initialize(&self) -> Promise {
        let ready = self.inner.initialize();
        future_to_promise(async move {
            ready.await.map_err(sdk_error_to_js)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = getChartModel)]
    pub fn get_chart_model(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.get_chart_model())
    }

    #[wasm_bindgen(js_name = getAppConfig)]
    pub fn get_app_config(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.get_app_config())
    }

    /// Send an event to the host; resolves with the host's reply
    #[wasm_bindgen(js_name = emitEvent)]
    pub fn emit_event(&self, event_type: &str, payload: JsValue) -> Result<Promise, JsValue> {
        let actions = payload_actions(&payload)?;
        let event = chart_event(event_type, plain_payload(&payload)?, actions).map_err(sdk_error_to_js)?;
        let reply = self.inner.emit_event(event);
        Ok(future_to_promise(async move {
            let value = reply.await.map_err(sdk_error_to_js)?;
            to_js(&value)
        }))
    }

    /// Add a handler `(payload, previousResponse) => response` for a host event
    pub fn on(&self, event_type: &str, handler: Function) -> Result<(), JsValue> {
        let event = external_event(event_type)?;
        self.inner.on(event, move |payload: Value, previous: Option<Value>| {
            let args = Array::new();
            for arg in handler_args(payload, previous) {
                let value = match arg {
                    HandlerArg::Undefined => JsValue::UNDEFINED,
                    HandlerArg::Json(value) => to_js(&value).unwrap_or(JsValue::NULL),
                };
                args.push(&value);
            }
            call_deferred(&handler, &args).map(|result| match result {
                Ok(value) if value.is_undefined() => None,
                Ok(value) => from_js::<Value>(value).ok(),
                Err(err) => {
                    log::error!("Event handler failed: {}", js_message(&err));
                    None
                }
            })
        });
        Ok(())
    }

    /// Remove the oldest handler for a host event
    pub fn off(&self, event_type: &str) -> Result<bool, JsValue> {
        Ok(self.inner.off(external_event(event_type)?))
    }

    pub fn destroy(&self) {
        self.inner.destroy();
    }
}
