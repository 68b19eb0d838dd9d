//! Request/response channel on top of a [`Transport`]
//!
//! Every outbound request gets its own reply port and races the reply
//! against a timer. Every inbound message from the host is answered, with
//! `{}` when the handler has nothing to say, so the host's own requests
//! never hang.

use crate::transport::{Inbound, InboundSink, ListenerId, ReplyPort, Transport};
use chart_sdk_shared::{
    ChartSdkError, Deferred, Envelope, ErrorPayload, INBOUND_SOURCE, OUTBOUND_SOURCE,
};
use futures::channel::oneshot;
use futures::future::{self, Either, FutureExt, LocalBoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use thiserror::Error;

/// Default wait for a host reply
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Operation timed out")]
    Timeout { duration_ms: u64 },

    #[error("{0}")]
    Post(String),

    #[error("Reply port closed before a response arrived")]
    Disconnected,

    #[error("{0}")]
    Host(String),
}

impl From<ChannelError> for ChartSdkError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Timeout { duration_ms } => ChartSdkError::Timeout { duration_ms },
            ChannelError::Post(message) => ChartSdkError::Transport { message },
            ChannelError::Disconnected => ChartSdkError::Transport {
                message: "Reply port closed before a response arrived".to_string(),
            },
            ChannelError::Host(message) => ChartSdkError::HostError { message },
        }
    }
}

/// Channel settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelConfig {
    #[serde(rename = "timeoutMs", with = "duration_ms")]
    pub timeout: Duration,
    pub outbound_source: String,
    pub inbound_source: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            outbound_source: OUTBOUND_SOURCE.to_string(),
            inbound_source: INBOUND_SOURCE.to_string(),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Per-request options
#[derive(Debug, Clone, PartialEq)]
pub struct SendOptions {
    /// URL of the host page; its origin restricts delivery
    pub origin_url: String,
    pub timeout: Duration,
}

/// Origin passed to `postMessage` for a host URL
///
/// Falls back to the URL itself when it has no tuple origin.
pub fn target_origin(host_url: &str) -> String {
    match url::Url::parse(host_url) {
        Ok(parsed) if parsed.origin().is_tuple() => parsed.origin().ascii_serialization(),
        _ => host_url.to_string(),
    }
}

fn empty_response() -> Value {
    Value::Object(Map::new())
}

/// Keeps an inbound listener registered until unsubscribed or dropped
pub struct ListenerGuard {
    transport: Weak<dyn Transport>,
    id: ListenerId,
    active: Cell<bool>,
}

impl ListenerGuard {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stop delivery; calling it again is a no-op
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(transport) = self.transport.upgrade() {
            transport.unsubscribe(self.id);
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Chart side of the host message channel
#[derive(Clone)]
pub struct ChartChannel {
    transport: Rc<dyn Transport>,
    config: ChannelConfig,
}

impl ChartChannel {
    pub fn new(transport: Rc<dyn Transport>, config: ChannelConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Options for a request to `host_url` with the configured timeout
    pub fn options_for(&self, host_url: &str) -> SendOptions {
        SendOptions {
            origin_url: host_url.to_string(),
            timeout: self.config.timeout,
        }
    }

    /// Post a message and wait for its single reply
    ///
    /// The message is posted before this returns; the future only waits.
    /// Replies carrying `hasError: true` resolve to [`ChannelError::Host`].
    pub fn send(
        &self,
        mut message: Envelope,
        options: SendOptions,
    ) -> LocalBoxFuture<'static, Result<Value, ChannelError>> {
        message.source = self.config.outbound_source.clone();
        let event_type = message.event_type.clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        let origin = target_origin(&options.origin_url);

        if let Err(err) = self.transport.post(message.to_value(), &origin, reply_tx) {
            log::error!("Failed to post {} to {}: {}", event_type, origin, err);
            return future::ready(Err(ChannelError::Post(err.to_string()))).boxed_local();
        }

        let timer = self.transport.sleep(options.timeout);
        let duration_ms = options.timeout.as_millis() as u64;

        async move {
            match future::select(reply_rx, timer).await {
                Either::Left((Ok(reply), _)) => match ErrorPayload::from_reply(&reply) {
                    Some(error) => Err(ChannelError::Host(error)),
                    None => Ok(reply),
                },
                Either::Left((Err(_), _)) => Err(ChannelError::Disconnected),
                Either::Right(((), _)) => {
                    log::error!("No reply to {} within {}ms", event_type, duration_ms);
                    Err(ChannelError::Timeout { duration_ms })
                }
            }
        }
        .boxed_local()
    }

    /// Deliver host messages to `handler` and post back its answer
    ///
    /// Messages whose `source` is not the host's tag are dropped without a
    /// reply. Host messages that are not a valid envelope are answered with
    /// the unrecognised-event error.
    pub fn listen<F>(&self, handler: F) -> Result<ListenerGuard, ChannelError>
    where
        F: Fn(Envelope) -> Deferred<Option<Value>> + 'static,
    {
        let inbound_source = self.config.inbound_source.clone();
        let spawner = Rc::downgrade(&self.transport);

        let sink: InboundSink = Rc::new(move |inbound: Inbound| {
            let Inbound { data, reply } = inbound;
            let source = data.get("source").and_then(Value::as_str).unwrap_or_default();
            if source != inbound_source {
                log::warn!("Ignoring message from source '{}'", source);
                return;
            }

            let event_type = data
                .get("eventType")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let envelope = match serde_json::from_value::<Envelope>(data) {
                Ok(envelope) => envelope,
                Err(err) => {
                    log::warn!("Malformed host message: {}", err);
                    let error = ChartSdkError::unrecognised(&event_type).to_payload();
                    acknowledge(reply, Some(error.to_value()));
                    return;
                }
            };

            match handler(envelope) {
                Deferred::Ready(response) => acknowledge(reply, response),
                Deferred::Pending(response) => {
                    let task = async move { acknowledge(reply, response.await) };
                    match spawner.upgrade() {
                        Some(transport) => transport.spawn(task.boxed_local()),
                        None => log::warn!("Transport dropped before reply could be sent"),
                    }
                }
            }
        });

        let id = self
            .transport
            .subscribe(sink)
            .map_err(|err| ChannelError::Post(err.to_string()))?;

        Ok(ListenerGuard {
            transport: Rc::downgrade(&self.transport),
            id,
            active: Cell::new(true),
        })
    }
}

fn acknowledge(reply: Option<ReplyPort>, response: Option<Value>) {
    if let Some(port) = reply {
        port.post(response.unwrap_or_else(empty_response));
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use serde_json::json;

    fn channel(transport: &MemoryTransport) -> ChartChannel {
        ChartChannel::new(Rc::new(transport.clone()), ChannelConfig::default())
    }

    fn request(event_type: &str) -> Envelope {
        Envelope::outbound("C1", event_type, Some(json!({"n": 1})))
    }

    #[tokio::test]
    async fn test_send_resolves_with_reply() {
        let transport = MemoryTransport::new();
        let channel = channel(&transport);

        let pending = channel.send(request("RenderStart"), channel.options_for("https://h/app"));
        let mut posted = transport.take_posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].target_origin, "https://h");
        assert_eq!(posted[0].event_type().as_deref(), Some("RenderStart"));
        assert_eq!(posted[0].message["source"], json!("ts-chart-sdk"));
        assert!(posted.remove(0).reply(json!({"ok": true})));

        assert_eq!(pending.await, Ok(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_error_reply_rejects() {
        let transport = MemoryTransport::new();
        transport.set_auto_reply(Some(json!({"hasError": true, "error": "host refused"})));
        let channel = channel(&transport);

        let result = channel
            .send(request("RenderStart"), channel.options_for("https://h"))
            .await;
        assert_eq!(result, Err(ChannelError::Host("host refused".to_string())));
    }

    #[tokio::test]
    async fn test_post_failure_rejects_with_same_error() {
        let transport = MemoryTransport::new();
        transport.fail_next_post("target window is gone");
        let channel = channel(&transport);

        let result = channel
            .send(request("RenderStart"), channel.options_for("https://h"))
            .await;
        assert_eq!(
            result,
            Err(ChannelError::Post("target window is gone".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_on_schedule() {
        let transport = MemoryTransport::new();
        let channel = channel(&transport);
        let options = SendOptions {
            origin_url: "https://h".to_string(),
            timeout: Duration::from_millis(250),
        };

        let started = tokio::time::Instant::now();
        let result = channel.send(request("RenderStart"), options).await;
        let elapsed = started.elapsed();

        assert_eq!(result, Err(ChannelError::Timeout { duration_ms: 250 }));
        assert_eq!(
            ChartSdkError::from(result.unwrap_err()).to_string(),
            "Operation timed out"
        );
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed <= Duration::from_millis(251));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_is_thirty_seconds() {
        let transport = MemoryTransport::new();
        let channel = channel(&transport);

        let started = tokio::time::Instant::now();
        let result = channel
            .send(request("RenderStart"), channel.options_for("https://h"))
            .await;

        assert!(matches!(result, Err(ChannelError::Timeout { duration_ms: 30_000 })));
        assert!(started.elapsed() >= DEFAULT_TIMEOUT);
        assert!(started.elapsed() <= DEFAULT_TIMEOUT + Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_listener_acknowledges_with_empty_object() {
        let transport = MemoryTransport::new();
        let channel = channel(&transport);
        let _guard = channel.listen(|_| Deferred::ready(None)).unwrap();

        let reply = transport.send_event("SomethingNew", json!({})).await;
        assert_eq!(reply, Some(json!({})));
    }

    #[tokio::test]
    async fn test_listener_waits_for_async_handlers() {
        let transport = MemoryTransport::new();
        let channel = channel(&transport);
        let _guard = channel
            .listen(|envelope| {
                Deferred::pending(async move { Some(json!({"echo": envelope.event_type})) })
            })
            .unwrap();

        let reply = transport.send_event("DataUpdate", json!({})).await;
        assert_eq!(reply, Some(json!({"echo": "DataUpdate"})));
    }

    #[tokio::test]
    async fn test_foreign_source_is_ignored() {
        let transport = MemoryTransport::new();
        let channel = channel(&transport);
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let _guard = channel
            .listen(move |_| {
                counter.set(counter.get() + 1);
                Deferred::ready(None)
            })
            .unwrap();

        let foreign = json!({"eventType": "DataUpdate", "payload": {}, "source": "someone-else"});
        assert_eq!(transport.deliver(foreign).await, None);
        assert_eq!(seen.get(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let transport = MemoryTransport::new();
        let channel = channel(&transport);
        let guard = channel.listen(|_| Deferred::ready(None)).unwrap();
        assert_eq!(transport.listener_count(), 1);

        guard.unsubscribe();
        guard.unsubscribe();
        assert!(!guard.is_active());
        assert_eq!(transport.listener_count(), 0);
        assert_eq!(transport.send_event("DataUpdate", json!({})).await, None);
    }

    #[test]
    fn test_target_origin() {
        assert_eq!(target_origin("https://host.example:8443/a/b?x=1"), "https://host.example:8443");
        assert_eq!(target_origin("*"), "*");
        assert_eq!(target_origin(""), "");
    }

    #[test]
    fn test_config_from_json() {
        let config: ChannelConfig = serde_json::from_value(json!({"timeoutMs": 5000})).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.inbound_source, INBOUND_SOURCE);
    }
}
