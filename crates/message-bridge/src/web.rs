//! `postMessage` transport for charts running inside a browser iframe

use crate::transport::{
    Inbound, InboundSink, ListenerId, ReplyPort, ReplySender, Transport, TransportError,
};
use futures::future::{FutureExt, LocalBoxFuture};
use serde::Serialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlIFrameElement, MessageChannel, MessageEvent, MessagePort, UrlSearchParams, Window};

/// Query parameter naming the iframe whose window is the peer
pub const EL_SELECTOR_PARAM: &str = "elSelector";

type MessageClosure = Closure<dyn FnMut(MessageEvent)>;

pub struct WindowTransport {
    window: Window,
    target: Window,
    listeners: RefCell<HashMap<ListenerId, MessageClosure>>,
    next_listener: Cell<u64>,
}

impl WindowTransport {
    pub fn new(window: Window, target: Window) -> Self {
        Self {
            window,
            target,
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
        }
    }

    /// Resolve the peer from the page URL
    ///
    /// With `?elSelector=<css>` the matching iframe's window is the peer,
    /// otherwise the parent window.
    pub fn from_location() -> Result<Self, TransportError> {
        let window = web_sys::window()
            .ok_or_else(|| TransportError::Subscribe("No window object available".to_string()))?;

        let target = match query_param(&window, EL_SELECTOR_PARAM) {
            Some(selector) => iframe_window(&window, &selector)?,
            None => parent_window(&window),
        };

        Ok(Self::new(window, target))
    }
}

fn query_param(window: &Window, name: &str) -> Option<String> {
    let search = window.location().search().ok()?;
    let params = UrlSearchParams::new_with_str(&search).ok()?;
    params.get(name).filter(|value| !value.is_empty())
}

fn iframe_window(window: &Window, selector: &str) -> Result<Window, TransportError> {
    let document = window
        .document()
        .ok_or_else(|| TransportError::Subscribe("No document object available".to_string()))?;

    let element = document
        .query_selector(selector)
        .map_err(|err| TransportError::Subscribe(js_message(&err)))?
        .ok_or_else(|| TransportError::Subscribe(format!("No element matches '{selector}'")))?;

    element
        .dyn_into::<HtmlIFrameElement>()
        .ok()
        .and_then(|frame| frame.content_window())
        .ok_or_else(|| TransportError::Subscribe(format!("'{selector}' is not a loaded iframe")))
}

fn parent_window(window: &Window) -> Window {
    match window.parent() {
        Ok(Some(parent)) => parent,
        _ => {
            log::warn!("No parent window, posting to self");
            window.clone()
        }
    }
}

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

fn to_js(value: &Value) -> Result<JsValue, TransportError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| TransportError::Post(err.to_string()))
}

fn from_js(value: JsValue) -> Option<Value> {
    serde_wasm_bindgen::from_value(value).ok()
}

fn reply_port(port: MessagePort) -> ReplyPort {
    ReplyPort::new(move |value| {
        let result = to_js(&value).and_then(|js| {
            port.post_message(&js)
                .map_err(|err| TransportError::Post(js_message(&err)))
        });
        if let Err(err) = result {
            log::error!("Failed to post reply: {}", err);
        }
    })
}

impl Transport for WindowTransport {
    fn post(
        &self,
        message: Value,
        target_origin: &str,
        reply: ReplySender,
    ) -> Result<(), TransportError> {
        let payload = to_js(&message)?;
        let channel = MessageChannel::new().map_err(|err| TransportError::Post(js_message(&err)))?;

        let on_reply = Closure::once_into_js(move |event: MessageEvent| {
            let _ = reply.send(from_js(event.data()).unwrap_or(Value::Null));
        });
        channel.port1().set_onmessage(Some(on_reply.unchecked_ref()));

        let transfer = js_sys::Array::of1(&channel.port2());
        self.target
            .post_message_with_transfer(&payload, target_origin, &transfer)
            .map_err(|err| TransportError::Post(js_message(&err)))
    }

    fn subscribe(&self, sink: InboundSink) -> Result<ListenerId, TransportError> {
        let id = ListenerId(self.next_listener.get() + 1);
        self.next_listener.set(id.0);

        let closure: MessageClosure = Closure::new(move |event: MessageEvent| {
            let Some(data) = from_js(event.data()) else {
                log::debug!("Dropping message that is not JSON");
                return;
            };
            let reply = event
                .ports()
                .get(0)
                .dyn_into::<MessagePort>()
                .ok()
                .map(reply_port);
            sink(Inbound { data, reply });
        });

        self.window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .map_err(|err| TransportError::Subscribe(js_message(&err)))?;
        self.listeners.borrow_mut().insert(id, closure);
        Ok(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        let Some(closure) = self.listeners.borrow_mut().remove(&id) else {
            return;
        };
        if let Err(err) = self
            .window
            .remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            log::warn!("Failed to remove message listener: {}", js_message(&err));
        }
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let window = self.window.clone();
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            if let Err(err) =
                window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
            {
                log::error!("Failed to schedule timer: {}", js_message(&err));
            }
        });

        async move {
            let _ = JsFuture::from(promise).await;
        }
        .boxed_local()
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

impl Drop for WindowTransport {
    fn drop(&mut self) {
        let ids: Vec<ListenerId> = self.listeners.borrow().keys().copied().collect();
        for id in ids {
            self.unsubscribe(id);
        }
    }
}
