//! Per-event handler lists
//!
//! One list per [`InboundEvent`] variant, kept in registration order.
//! Dispatch takes a snapshot of the list first, so a handler may register
//! or remove handlers while it runs.

use chart_sdk_shared::{ChartSdkError, Deferred, InboundEvent, ValidationResponse};
use serde_json::{Map, Value};
use std::rc::Rc;

/// Handler for one inbound event
///
/// Receives the payload and, when chained, the previous handler's response.
/// `None` means the handler has nothing to add.
pub type EventHandler = Rc<dyn Fn(Value, Option<Value>) -> Deferred<Option<Value>>>;

/// How several handlers for the same event are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionOrder {
    /// Run in registration order; the last handler's response wins
    #[default]
    Registration,
    /// Run newest first for chainable events, passing each response on
    ReverseChained,
}

pub struct EventRegistry {
    handlers: [Vec<EventHandler>; InboundEvent::COUNT],
    order: ExecutionOrder,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new(ExecutionOrder::default())
    }
}

impl EventRegistry {
    pub fn new(order: ExecutionOrder) -> Self {
        Self {
            handlers: std::array::from_fn(|_| Vec::new()),
            order,
        }
    }

    pub fn order(&self) -> ExecutionOrder {
        self.order
    }

    pub fn on(&mut self, event: InboundEvent, handler: EventHandler) {
        self.handlers[event.index()].push(handler);
    }

    /// Remove the oldest handler for `event`
    ///
    /// Returns false when there was nothing to remove.
    pub fn off(&mut self, event: InboundEvent) -> bool {
        let handlers = &mut self.handlers[event.index()];
        if handlers.is_empty() {
            return false;
        }
        handlers.remove(0);
        true
    }

    pub fn handler_count(&self, event: InboundEvent) -> usize {
        self.handlers[event.index()].len()
    }

    pub fn clear(&mut self) {
        self.handlers.iter_mut().for_each(Vec::clear);
    }

    /// Snapshot the handlers for one dispatch
    pub fn dispatcher(&self, event: InboundEvent) -> Dispatch {
        Dispatch {
            event,
            handlers: self.handlers[event.index()].clone(),
            chained: self.order == ExecutionOrder::ReverseChained && event.supports_chaining(),
        }
    }
}

/// Handlers captured for a single dispatch
pub struct Dispatch {
    event: InboundEvent,
    handlers: Vec<EventHandler>,
    chained: bool,
}

impl Dispatch {
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handlers and return what the host receives
    ///
    /// Without handlers this is the fail-safe response for the event; a
    /// `None` result becomes `{}`.
    pub fn run(self, payload: Value) -> Deferred<Value> {
        if self.handlers.is_empty() {
            return Deferred::ready(fallback_response(self.event));
        }
        self.run_raw(payload)
            .map(|response| response.unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// Run the handlers and return the combined response as-is
    pub fn run_raw(self, payload: Value) -> Deferred<Option<Value>> {
        if self.chained {
            run_chained(self.handlers, payload)
        } else {
            run_in_order(self.handlers, payload)
        }
    }
}

/// Response for an event nobody handles
pub fn fallback_response(event: InboundEvent) -> Value {
    if event.is_internal() {
        ValidationResponse::invalid().to_value()
    } else {
        ChartSdkError::unrecognised(event.as_str())
            .to_payload()
            .to_value()
    }
}

fn run_in_order(handlers: Vec<EventHandler>, payload: Value) -> Deferred<Option<Value>> {
    let outputs: Vec<Deferred<Option<Value>>> = handlers
        .iter()
        .map(|handler| handler(payload.clone(), None))
        .collect();

    if outputs.iter().all(Deferred::is_ready) {
        let last = outputs
            .into_iter()
            .filter_map(|output| output.into_ready().ok())
            .last();
        return Deferred::ready(last.flatten());
    }

    Deferred::pending(async move {
        let mut last = None;
        for output in outputs {
            last = output.into_future().await;
        }
        last
    })
}

fn run_chained(handlers: Vec<EventHandler>, payload: Value) -> Deferred<Option<Value>> {
    let mut previous: Option<Value> = None;
    let mut remaining = handlers.into_iter().rev();

    while let Some(handler) = remaining.next() {
        match handler(payload.clone(), previous.clone()).into_ready() {
            Ok(output) => previous = output.or(previous),
            Err(pending) => {
                let rest: Vec<EventHandler> = remaining.collect();
                return Deferred::pending(async move {
                    let mut previous = pending.into_future().await.or(previous);
                    for handler in rest {
                        previous = handler(payload.clone(), previous.clone())
                            .into_future()
                            .await
                            .or(previous);
                    }
                    previous
                });
            }
        }
    }

    Deferred::ready(previous)
}
