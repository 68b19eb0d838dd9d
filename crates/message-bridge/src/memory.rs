//! In-process transport standing in for the host window
//!
//! The host side of the conversation is driven directly: [`MemoryTransport::deliver`]
//! pushes a message to the chart and resolves with the chart's reply, and
//! [`MemoryTransport::take_posted`] hands out what the chart sent so the
//! caller can answer it.

use crate::transport::{
    Inbound, InboundSink, ListenerId, ReplyPort, ReplySender, Transport, TransportError,
};
use chart_sdk_shared::Envelope;
use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::Poll;
use std::time::Duration;

/// A message the chart posted to the host
pub struct PostedMessage {
    pub message: Value,
    pub target_origin: String,
    reply: Option<ReplySender>,
}

impl PostedMessage {
    pub fn event_type(&self) -> Option<String> {
        self.message
            .get("eventType")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn payload(&self) -> &Value {
        self.message.get("payload").unwrap_or(&Value::Null)
    }

    pub fn envelope(&self) -> Option<Envelope> {
        serde_json::from_value(self.message.clone()).ok()
    }

    /// Answer the message; false if it was already answered or the chart gave up
    pub fn reply(mut self, value: Value) -> bool {
        match self.reply.take() {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    listeners: Vec<(ListenerId, InboundSink)>,
    next_listener: u64,
    posted: Vec<PostedMessage>,
    auto_reply: Option<Value>,
    fail_next_post: Option<String>,
    spawned: Vec<LocalBoxFuture<'static, ()>>,
}

#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to every future post immediately with `reply`
    pub fn set_auto_reply(&self, reply: Option<Value>) {
        self.state.borrow_mut().auto_reply = reply;
    }

    /// Make the next post fail synchronously with `message`
    pub fn fail_next_post(&self, message: &str) {
        self.state.borrow_mut().fail_next_post = Some(message.to_string());
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn posted_count(&self) -> usize {
        self.state.borrow().posted.len()
    }

    pub fn take_posted(&self) -> Vec<PostedMessage> {
        std::mem::take(&mut self.state.borrow_mut().posted)
    }

    /// Send a host-tagged envelope to the chart
    pub fn send_event(&self, event_type: &str, payload: Value) -> LocalBoxFuture<'static, Option<Value>> {
        self.deliver(Envelope::from_host(event_type, payload).to_value())
    }

    /// Deliver a raw message with a reply port attached
    ///
    /// Resolves with the chart's reply, or `None` if nobody answered.
    /// Tasks the chart spawns while answering are driven by this future.
    pub fn deliver(&self, data: Value) -> LocalBoxFuture<'static, Option<Value>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let port = ReplyPort::from_sender(reply_tx);

        let listeners: Vec<InboundSink> = self
            .state
            .borrow()
            .listeners
            .iter()
            .map(|(_, sink)| sink.clone())
            .collect();

        for sink in listeners {
            sink(Inbound {
                data: data.clone(),
                reply: Some(port.clone()),
            });
        }
        drop(port);

        self.drive_until(reply_rx)
    }

    fn drive_until(&self, mut reply_rx: oneshot::Receiver<Value>) -> LocalBoxFuture<'static, Option<Value>> {
        let state = self.state.clone();
        let mut running: FuturesUnordered<LocalBoxFuture<'static, ()>> = FuturesUnordered::new();

        future::poll_fn(move |cx| loop {
            if let Poll::Ready(reply) = Pin::new(&mut reply_rx).poll(cx) {
                state.borrow_mut().spawned.extend(std::mem::take(&mut running));
                return Poll::Ready(reply.ok());
            }

            let spawned = std::mem::take(&mut state.borrow_mut().spawned);
            let mut progressed = !spawned.is_empty();
            running.extend(spawned);

            while let Poll::Ready(Some(())) = running.poll_next_unpin(cx) {
                progressed = true;
            }

            if !progressed {
                return Poll::Pending;
            }
        })
        .boxed_local()
    }
}

impl Transport for MemoryTransport {
    fn post(
        &self,
        message: Value,
        target_origin: &str,
        reply: ReplySender,
    ) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if let Some(message) = state.fail_next_post.take() {
            return Err(TransportError::Post(message));
        }

        let reply = match state.auto_reply.clone() {
            Some(auto) => {
                let _ = reply.send(auto);
                None
            }
            None => Some(reply),
        };

        state.posted.push(PostedMessage {
            message,
            target_origin: target_origin.to_string(),
            reply,
        });
        Ok(())
    }

    fn subscribe(&self, sink: InboundSink) -> Result<ListenerId, TransportError> {
        let mut state = self.state.borrow_mut();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.push((id, sink));
        Ok(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|(listener, _)| *listener != id);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.state.borrow_mut().spawned.push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_deliver_without_listeners_resolves_none() {
        let transport = MemoryTransport::new();
        assert_eq!(transport.send_event("Initialize", json!({})).await, None);
    }

    #[tokio::test]
    async fn test_deliver_drives_spawned_reply() {
        let transport = MemoryTransport::new();
        let spawner = transport.clone();
        let sink: InboundSink = Rc::new(move |inbound: Inbound| {
            let reply = inbound.reply;
            spawner.spawn(
                async move {
                    if let Some(port) = reply {
                        port.post(json!({"late": true}));
                    }
                }
                .boxed_local(),
            );
        });
        transport.subscribe(sink).unwrap();

        assert_eq!(
            transport.send_event("DataUpdate", json!({})).await,
            Some(json!({"late": true}))
        );
    }

    #[tokio::test]
    async fn test_only_first_listener_reply_counts() {
        let transport = MemoryTransport::new();
        let calls = Rc::new(Cell::new(0));
        for answer in ["first", "second"] {
            let calls = calls.clone();
            let sink: InboundSink = Rc::new(move |inbound: Inbound| {
                calls.set(calls.get() + 1);
                if let Some(port) = inbound.reply {
                    port.post(json!(answer));
                }
            });
            transport.subscribe(sink).unwrap();
        }

        assert_eq!(transport.send_event("DataUpdate", json!({})).await, Some(json!("first")));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_post_records_message() {
        let transport = MemoryTransport::new();
        let (tx, _rx) = oneshot::channel();
        transport
            .post(json!({"eventType": "RenderStart", "payload": {"a": 1}}), "https://h", tx)
            .unwrap();

        let posted = transport.take_posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].event_type().as_deref(), Some("RenderStart"));
        assert_eq!(posted[0].payload(), &json!({"a": 1}));
        assert_eq!(transport.posted_count(), 0);
    }
}
