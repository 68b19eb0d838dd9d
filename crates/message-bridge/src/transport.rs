//! Transport abstraction between the chart and its host window
//!
//! A [`Transport`] moves raw JSON messages to and from the peer. It knows
//! nothing about event types: correlation, timeouts and acknowledgements
//! live in [`crate::channel`].

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// Sending half of the one-shot reply port attached to an outbound message
pub type ReplySender = oneshot::Sender<Value>;

/// Receives every inbound message delivered by the transport
pub type InboundSink = Rc<dyn Fn(Inbound)>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("{0}")]
    Post(String),

    #[error("Listener registration failed: {0}")]
    Subscribe(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Port the sender of an inbound message listens on for our answer
///
/// Several listeners may see the same message; only the first post reaches
/// the sender.
#[derive(Clone)]
pub struct ReplyPort {
    post: Rc<RefCell<Option<Box<dyn FnOnce(Value)>>>>,
}

impl ReplyPort {
    pub fn new<F>(post: F) -> Self
    where
        F: FnOnce(Value) + 'static,
    {
        Self {
            post: Rc::new(RefCell::new(Some(Box::new(post)))),
        }
    }

    pub fn from_sender(sender: ReplySender) -> Self {
        Self::new(move |value| {
            let _ = sender.send(value);
        })
    }

    /// Post the reply; returns false if a reply was already posted
    pub fn post(&self, value: Value) -> bool {
        let post = self.post.borrow_mut().take();
        match post {
            Some(post) => {
                post(value);
                true
            }
            None => false,
        }
    }
}

/// A message received from the peer
pub struct Inbound {
    pub data: Value,
    pub reply: Option<ReplyPort>,
}

/// Raw message transport to the host window
pub trait Transport {
    /// Post `message` to the peer, restricted to `target_origin`, with a
    /// fresh reply port whose single answer is routed into `reply`.
    fn post(&self, message: Value, target_origin: &str, reply: ReplySender)
        -> Result<(), TransportError>;

    /// Start delivering inbound messages to `sink`
    fn subscribe(&self, sink: InboundSink) -> Result<ListenerId, TransportError>;

    /// Stop delivering to a listener; unknown ids are ignored
    fn unsubscribe(&self, id: ListenerId);

    /// Timer used to bound the wait for a reply
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

    /// Run a task on the event loop that owns this transport
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}
