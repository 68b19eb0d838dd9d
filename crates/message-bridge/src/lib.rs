//! Message bridge between a chart iframe and its host application
//!
//! [`Transport`] moves raw JSON across the window boundary; [`ChartChannel`]
//! layers request/response correlation, timeouts and mandatory
//! acknowledgements on top of it.

pub mod channel;
pub mod transport;

#[cfg(not(target_arch = "wasm32"))]
pub mod memory;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use channel::{
    target_origin, ChannelConfig, ChannelError, ChartChannel, ListenerGuard, SendOptions,
    DEFAULT_TIMEOUT,
};
pub use transport::{Inbound, InboundSink, ListenerId, ReplyPort, ReplySender, Transport, TransportError};

#[cfg(not(target_arch = "wasm32"))]
pub use memory::{MemoryTransport, PostedMessage};

#[cfg(target_arch = "wasm32")]
pub use web::WindowTransport;
