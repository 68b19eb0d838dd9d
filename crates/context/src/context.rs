//! The chart context: handshake state machine and host event dispatch
//!
//! A [`ChartContext`] listens on the channel from construction onwards.
//! Inbound host events go through two registries: the built-in handlers,
//! registered at construction, and the developer handlers added with
//! [`ChartContext::on`]. Outbound events go through [`ChartContext::emit_event`]
//! once the host has completed the handshake.

use crate::action_table::{invoke_callback, ActionHandlerTable, ToastActionSlot};
use crate::props::ChartContextProps;
use crate::registry::{EventHandler, EventRegistry, ExecutionOrder};
use crate::singleton::ContextRegistry;
use chart_sdk_bridge::{ChannelConfig, ChartChannel, ListenerGuard, Transport};
use chart_sdk_shared::{
    AppConfig, ChartConfig, ChartEvent, ChartModel, ChartSdkError, ConnectionIdentity, Deferred,
    Envelope, ErrorPayload, ExternalEvent, InboundEvent, QueryData, SdkResult,
    ValidationResponse, VisualProps,
};
use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Lifecycle of a chart context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    AwaitingHostAck,
    Ready,
    Destroyed,
}

/// Construction options that are not part of the developer props
#[derive(Clone, Default)]
pub struct ContextOptions {
    pub channel: ChannelConfig,
    pub registry: Option<ContextRegistry>,
}

impl ContextOptions {
    pub fn with_registry(mut self, registry: ContextRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializePayload {
    component_id: String,
    host_url: String,
    #[serde(default)]
    chart_model: ChartModel,
    #[serde(default)]
    app_config: Option<AppConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartModelUpdatePayload {
    chart_model: ChartModel,
}

#[derive(Deserialize)]
struct DataUpdatePayload {
    data: Vec<QueryData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisualPropsUpdatePayload {
    #[serde(default)]
    visual_props: Option<VisualProps>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartConfigValidatePayload {
    #[serde(default)]
    chart_config: Vec<ChartConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisualPropsValidatePayload {
    #[serde(default)]
    visual_props: Option<VisualProps>,
    #[serde(default)]
    active_column_id: Option<String>,
}

#[derive(Deserialize)]
struct GetDataQueryPayload {
    #[serde(default)]
    config: Vec<ChartConfig>,
}

#[derive(Deserialize)]
struct ActionRef {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionClickPayload {
    custom_action: ActionRef,
}

fn decode<T: DeserializeOwned>(event: InboundEvent, payload: &Value) -> SdkResult<T> {
    serde_json::from_value(payload.clone()).map_err(|err| {
        log::warn!("Malformed {} payload: {}", event, err);
        ChartSdkError::invalid_payload(event.as_str(), err)
    })
}

fn error_response(err: &ChartSdkError) -> Deferred<Option<Value>> {
    Deferred::ready(Some(err.to_payload().to_value()))
}

/// Model updates whose built-in handler always runs, even when overridden
fn mutates_mirror(event: InboundEvent) -> bool {
    matches!(
        event,
        InboundEvent::ChartModelUpdate | InboundEvent::DataUpdate | InboundEvent::VisualPropsUpdate
    )
}

#[derive(Default)]
struct Mirror {
    identity: Option<ConnectionIdentity>,
    chart_model: ChartModel,
    app_config: AppConfig,
}

struct ContextInner {
    instance_id: Uuid,
    props: ChartContextProps,
    channel: ChartChannel,
    registry: ContextRegistry,
    state: Cell<ContextState>,
    mirror: RefCell<Mirror>,
    internal: RefCell<EventRegistry>,
    external: RefCell<EventRegistry>,
    context_menu_actions: RefCell<ActionHandlerTable>,
    axis_menu_actions: RefCell<ActionHandlerTable>,
    toast_action: RefCell<ToastActionSlot>,
    ready_waiters: RefCell<Vec<oneshot::Sender<()>>>,
    listener: RefCell<Option<ListenerGuard>>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.registry.release(self.instance_id);
    }
}

/// Handle to the chart side of the host protocol
///
/// Cloning is cheap; every clone refers to the same context.
#[derive(Clone)]
pub struct ChartContext {
    inner: Rc<ContextInner>,
}

impl fmt::Debug for ChartContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartContext")
            .field("instance_id", &self.inner.instance_id)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

impl ChartContext {
    /// Create a context on `transport` using the thread-wide registry
    pub fn new(props: ChartContextProps, transport: Rc<dyn Transport>) -> SdkResult<Self> {
        Self::with_options(props, transport, ContextOptions::default())
    }

    pub fn with_options(
        props: ChartContextProps,
        transport: Rc<dyn Transport>,
        options: ContextOptions,
    ) -> SdkResult<Self> {
        let registry = options.registry.unwrap_or_else(ContextRegistry::global);
        registry.ensure_available()?;

        let order = if props.reverse_event_execution_order {
            ExecutionOrder::ReverseChained
        } else {
            ExecutionOrder::Registration
        };

        let context = ChartContext {
            inner: Rc::new(ContextInner {
                instance_id: Uuid::new_v4(),
                props,
                channel: ChartChannel::new(transport, options.channel),
                registry,
                state: Cell::new(ContextState::Uninitialized),
                mirror: RefCell::new(Mirror::default()),
                internal: RefCell::new(EventRegistry::default()),
                external: RefCell::new(EventRegistry::new(order)),
                context_menu_actions: RefCell::new(ActionHandlerTable::new()),
                axis_menu_actions: RefCell::new(ActionHandlerTable::new()),
                toast_action: RefCell::new(ToastActionSlot::default()),
                ready_waiters: RefCell::new(Vec::new()),
                listener: RefCell::new(None),
            }),
        };

        context.register_internal_handlers();

        let weak = Rc::downgrade(&context.inner);
        let guard = context
            .inner
            .channel
            .listen(move |envelope| match Self::upgrade(&weak) {
                Some(context) => context.handle_envelope(envelope),
                None => Deferred::ready(None),
            })
            .map_err(ChartSdkError::from)?;
        *context.inner.listener.borrow_mut() = Some(guard);

        context.inner.state.set(ContextState::AwaitingHostAck);
        log::info!("Chart context {} awaiting host", context.inner.instance_id);
        Ok(context)
    }

    fn upgrade(weak: &Weak<ContextInner>) -> Option<ChartContext> {
        weak.upgrade().map(|inner| ChartContext { inner })
    }

    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    pub fn state(&self) -> ContextState {
        self.inner.state.get()
    }

    pub fn get_chart_model(&self) -> ChartModel {
        self.inner.mirror.borrow().chart_model.clone()
    }

    pub fn get_app_config(&self) -> AppConfig {
        self.inner.mirror.borrow().app_config.clone()
    }

    pub fn connection_identity(&self) -> Option<ConnectionIdentity> {
        self.inner.mirror.borrow().identity.clone()
    }

    /// Resolves once the host sends `InitializeComplete`
    ///
    /// Resolves immediately if that already happened; fails if the context
    /// is destroyed first.
    pub fn initialize(&self) -> LocalBoxFuture<'static, SdkResult<()>> {
        match self.state() {
            ContextState::Ready => future::ready(Ok(())).boxed_local(),
            ContextState::Destroyed => {
                future::ready(Err(ChartSdkError::ContextDestroyed)).boxed_local()
            }
            ContextState::Uninitialized | ContextState::AwaitingHostAck => {
                let (tx, rx) = oneshot::channel();
                self.inner.ready_waiters.borrow_mut().push(tx);
                async move { rx.await.map_err(|_| ChartSdkError::ContextDestroyed) }.boxed_local()
            }
        }
    }

    /// Add a developer handler for a host event
    pub fn on<F>(&self, event: ExternalEvent, handler: F)
    where
        F: Fn(Value, Option<Value>) -> Deferred<Option<Value>> + 'static,
    {
        let handler: EventHandler = Rc::new(handler);
        self.inner.external.borrow_mut().on(event.into(), handler);
    }

    /// Remove the oldest developer handler for `event`
    pub fn off(&self, event: ExternalEvent) -> bool {
        self.inner.external.borrow_mut().off(event.into())
    }

    /// Number of developer handlers registered for `event`
    pub fn handler_count(&self, event: ExternalEvent) -> usize {
        self.inner.external.borrow().handler_count(event.into())
    }

    /// Answer a host event as the listener would
    pub fn dispatch(&self, event: InboundEvent, payload: Value) -> Deferred<Value> {
        let builtin = self.inner.internal.borrow().dispatcher(event);
        if event.is_internal() {
            return builtin.run(payload);
        }

        let developer = self.inner.external.borrow().dispatcher(event);
        if developer.is_empty() {
            return builtin.run(payload);
        }

        if mutates_mirror(event) {
            let update = payload.clone();
            return builtin
                .run(update)
                .then(move |_| developer.run(payload));
        }
        developer.run(payload)
    }

    fn handle_envelope(&self, envelope: Envelope) -> Deferred<Option<Value>> {
        let Some(event) = InboundEvent::parse(&envelope.event_type) else {
            log::warn!("Event type not recognised: '{}'", envelope.event_type);
            return error_response(&ChartSdkError::unrecognised(&envelope.event_type));
        };
        log::debug!("Dispatching {} on context {}", event, self.inner.instance_id);
        self.dispatch(event, envelope.payload).map(Some)
    }

    fn register_internal_handlers(&self) {
        let mut internal = self.inner.internal.borrow_mut();
        for event in InboundEvent::ALL {
            let weak = Rc::downgrade(&self.inner);
            let handler: EventHandler = Rc::new(move |payload: Value, _: Option<Value>| {
                match Self::upgrade(&weak) {
                    Some(context) => context.handle_builtin(event, payload),
                    None => error_response(&ChartSdkError::ContextDestroyed),
                }
            });
            internal.on(event, handler);
        }
    }

    fn handle_builtin(&self, event: InboundEvent, payload: Value) -> Deferred<Option<Value>> {
        let response = match event {
            InboundEvent::Initialize => self.on_initialize(&payload),
            InboundEvent::InitializeComplete => self.on_initialize_complete(),
            InboundEvent::GetDataQuery => self.on_get_data_query(&payload),
            InboundEvent::ChartConfigValidate => self.on_chart_config_validate(&payload),
            InboundEvent::VisualPropsValidate => self.on_visual_props_validate(&payload),
            InboundEvent::TriggerRenderChart => Ok(self.on_trigger_render()),
            InboundEvent::ChartModelUpdate
            | InboundEvent::DataUpdate
            | InboundEvent::VisualPropsUpdate => self.on_model_update(event, &payload),
            InboundEvent::ContextMenuActionClick => {
                let callback = |id: &str| self.inner.context_menu_actions.borrow().callback_or_noop(id);
                Ok(Self::on_action_click(event, &payload, callback))
            }
            InboundEvent::AxisMenuActionClick => {
                let callback = |id: &str| self.inner.axis_menu_actions.borrow().callback_or_noop(id);
                Ok(Self::on_action_click(event, &payload, callback))
            }
            InboundEvent::GlobalToastActionClick => {
                let callback = |id: &str| self.inner.toast_action.borrow().callback_or_noop(id);
                Ok(Self::on_action_click(event, &payload, callback))
            }
            InboundEvent::MixpanelEvent => Ok(self.on_mixpanel_event(&payload)),
            InboundEvent::DownloadExcelTrigger => Ok(Deferred::ready(Some(json!({
                "isDownloadHandled": true,
                "fileName": "",
                "error": "",
                "message": "Download Excel not implemented.",
            })))),
        };

        response.unwrap_or_else(|err| error_response(&err))
    }

    fn on_initialize(&self, payload: &Value) -> SdkResult<Deferred<Option<Value>>> {
        let init: InitializePayload = decode(InboundEvent::Initialize, payload)?;

        {
            let mut mirror = self.inner.mirror.borrow_mut();
            if let Some(identity) = &mirror.identity {
                if identity.component_id != init.component_id {
                    log::warn!(
                        "Ignoring identity change from {} to {}",
                        identity.component_id,
                        init.component_id
                    );
                }
            } else {
                mirror.identity = Some(ConnectionIdentity {
                    component_id: init.component_id.clone(),
                    host_url: init.host_url.clone(),
                });
            }
            mirror.chart_model = init.chart_model;
            mirror.app_config = init.app_config.unwrap_or_default();
        }
        log::info!(
            "Chart context {} initialized for component {}",
            self.inner.instance_id,
            init.component_id
        );

        let model = self.get_chart_model();
        let is_config_valid = match (model.persisted_chart_config(), &self.inner.props.validate_config) {
            (Some(config), Some(validate)) => validate(config, &model).map(|result| result.is_valid),
            _ => Deferred::ready(false),
        };

        let context = self.clone();
        Ok(is_config_valid.map(move |is_valid| {
            let mut response = Map::new();
            response.insert("isConfigValid".to_string(), Value::Bool(is_valid));
            if !is_valid {
                let defaults = (context.inner.props.get_default_chart_config)(&model);
                response.insert(
                    "defaultChartConfig".to_string(),
                    serde_json::to_value(defaults).unwrap_or(Value::Null),
                );
            }
            response.extend(context.editor_definitions(&model, None));
            Some(Value::Object(response))
        }))
    }

    fn on_initialize_complete(&self) -> SdkResult<Deferred<Option<Value>>> {
        if self.inner.mirror.borrow().identity.is_none() {
            log::warn!("InitializeComplete received before Initialize");
            return Err(ChartSdkError::ContextNotInitialized);
        }

        self.inner.registry.try_acquire(self.inner.instance_id)?;

        if self.state() != ContextState::Ready {
            self.inner.state.set(ContextState::Ready);
            log::info!("Chart context {} ready", self.inner.instance_id);
        }

        let waiters = std::mem::take(&mut *self.inner.ready_waiters.borrow_mut());
        for waiter in waiters {
            let _ = waiter.send(());
        }
        Ok(Deferred::ready(None))
    }

    fn on_get_data_query(&self, payload: &Value) -> SdkResult<Deferred<Option<Value>>> {
        let request: GetDataQueryPayload = decode(InboundEvent::GetDataQuery, payload)?;
        let model = self.get_chart_model();
        let queries = (self.inner.props.get_queries_from_chart_config)(&request.config, &model);
        Ok(Deferred::ready(Some(json!({ "queries": queries }))))
    }

    fn on_chart_config_validate(&self, payload: &Value) -> SdkResult<Deferred<Option<Value>>> {
        let request: ChartConfigValidatePayload =
            decode(InboundEvent::ChartConfigValidate, payload)?;
        let Some(validate) = self.inner.props.validate_config.clone() else {
            return Ok(Deferred::ready(Some(ValidationResponse::invalid().to_value())));
        };

        let mut model = self.get_chart_model();
        let result = validate(&request.chart_config, &model);
        model.config.chart_config = Some(request.chart_config);

        let context = self.clone();
        Ok(result.map(move |result| Some(context.validation_response(result, &model, None))))
    }

    fn on_visual_props_validate(&self, payload: &Value) -> SdkResult<Deferred<Option<Value>>> {
        let request: VisualPropsValidatePayload =
            decode(InboundEvent::VisualPropsValidate, payload)?;
        let Some(validate) = self.inner.props.validate_visual_props.clone() else {
            return Ok(Deferred::ready(Some(ValidationResponse::invalid().to_value())));
        };

        let mut model = self.get_chart_model();
        let active_column_id = request.active_column_id;
        let result = validate(request.visual_props.as_ref(), &model, active_column_id.as_deref());
        model.visual_props = request.visual_props;

        let context = self.clone();
        Ok(result.map(move |result| {
            Some(context.validation_response(result, &model, active_column_id.as_deref()))
        }))
    }

    /// Validator result, extended with the editor definitions when valid
    fn validation_response(
        &self,
        result: ValidationResponse,
        model: &ChartModel,
        active_column_id: Option<&str>,
    ) -> Value {
        let mut response = match result.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if result.is_valid {
            response.extend(self.editor_definitions(model, active_column_id));
        }
        Value::Object(response)
    }

    fn editor_definitions(&self, model: &ChartModel, active_column_id: Option<&str>) -> Map<String, Value> {
        let props = &self.inner.props;
        let mut definitions = Map::new();
        if let Some(definition) = &props.chart_config_editor_definition {
            let value = definition.resolve(model, self, active_column_id);
            definitions.insert(
                "chartConfigEditorDefinition".to_string(),
                serde_json::to_value(value).unwrap_or(Value::Null),
            );
        }
        if let Some(definition) = &props.visual_prop_editor_definition {
            let value = definition.resolve(model, self, active_column_id);
            definitions.insert(
                "visualPropEditorDefinition".to_string(),
                serde_json::to_value(value).unwrap_or(Value::Null),
            );
        }
        definitions
    }

    fn on_trigger_render(&self) -> Deferred<Option<Value>> {
        let render = self.inner.props.render_chart.clone();
        render(self.clone()).map(|result| match result {
            Ok(()) => None,
            Err(err) => {
                log::error!("renderChart failed: {:#}", err);
                Some(ChartSdkError::from(err).to_payload().to_value())
            }
        })
    }

    fn on_model_update(&self, event: InboundEvent, payload: &Value) -> SdkResult<Deferred<Option<Value>>> {
        match event {
            InboundEvent::ChartModelUpdate => {
                let update: ChartModelUpdatePayload = decode(event, payload)?;
                self.inner.mirror.borrow_mut().chart_model = update.chart_model;
            }
            InboundEvent::DataUpdate => {
                let update: DataUpdatePayload = decode(event, payload)?;
                self.inner.mirror.borrow_mut().chart_model.data = Some(update.data);
            }
            _ => {
                let update: VisualPropsUpdatePayload = decode(event, payload)?;
                self.inner.mirror.borrow_mut().chart_model.visual_props = update.visual_props;
            }
        }
        Ok(Deferred::ready(Some(json!({ "triggerRenderChart": true }))))
    }

    fn on_action_click<F>(event: InboundEvent, payload: &Value, lookup: F) -> Deferred<Option<Value>>
    where
        F: FnOnce(&str) -> chart_sdk_shared::ActionCallback,
    {
        let response = match decode::<ActionClickPayload>(event, payload) {
            Ok(click) => {
                // Looked up before the call so the callback may emit a new menu
                let callback = lookup(&click.custom_action.id);
                invoke_callback(&callback, std::slice::from_ref(payload))
            }
            Err(err) => ValidationResponse::with_error(err.to_string()),
        };
        Deferred::ready(Some(response.to_value()))
    }

    fn on_mixpanel_event(&self, payload: &Value) -> Deferred<Option<Value>> {
        let Some(track) = self.inner.props.track_mixpanel_event.clone() else {
            return Deferred::ready(None);
        };
        let visual_props = self.inner.mirror.borrow().chart_model.visual_props.clone();
        let context = json!({ "visualProps": visual_props });
        Deferred::ready(track(payload, &context))
    }

    /// Send an event to the host and wait for its reply
    ///
    /// Fails straight away with [`ChartSdkError::ContextNotInitialized`]
    /// unless the handshake has completed.
    pub fn emit_event(&self, event: ChartEvent) -> LocalBoxFuture<'static, SdkResult<Value>> {
        let identity = match (self.state(), self.connection_identity()) {
            (ContextState::Ready, Some(identity)) => identity,
            _ => {
                log::warn!("Cannot emit {} before the context is ready", event.event_type());
                return future::ready(Err(ChartSdkError::ContextNotInitialized)).boxed_local();
            }
        };

        let event_type = event.event_type();
        let payload = self.outbound_payload(event);
        let envelope = Envelope::outbound(&identity.component_id, event_type.as_str(), payload);
        let reply = self
            .inner
            .channel
            .send(envelope, self.inner.channel.options_for(&identity.host_url));

        async move { reply.await.map_err(ChartSdkError::from) }.boxed_local()
    }

    /// Payload as transmitted, with custom action callbacks moved into the tables
    fn outbound_payload(&self, event: ChartEvent) -> Option<Value> {
        match event {
            ChartEvent::OpenContextMenu(menu) => {
                let actions = self
                    .inner
                    .context_menu_actions
                    .borrow_mut()
                    .rebuild(&menu.custom_actions);
                let mut payload = menu.details;
                payload.insert("customActions".to_string(), serde_json::to_value(actions).unwrap_or(Value::Null));
                Some(Value::Object(payload))
            }
            ChartEvent::OpenAxisMenu(menu) => {
                let actions = self
                    .inner
                    .axis_menu_actions
                    .borrow_mut()
                    .rebuild(&menu.custom_actions);
                let mut payload = menu.details;
                payload.insert("customActions".to_string(), serde_json::to_value(actions).unwrap_or(Value::Null));
                Some(Value::Object(payload))
            }
            ChartEvent::ShowGlobalAlertToast(toast) => {
                let primary = self
                    .inner
                    .toast_action
                    .borrow_mut()
                    .replace(toast.primary_action.as_ref());
                let mut payload = toast.details;
                payload.insert("message".to_string(), Value::String(toast.message));
                if let Some(variant) = toast.variant {
                    payload.insert("variant".to_string(), Value::String(variant));
                }
                if let Some(primary) = primary {
                    payload.insert("primaryAction".to_string(), serde_json::to_value(primary).unwrap_or(Value::Null));
                }
                Some(Value::Object(payload))
            }
            ChartEvent::RenderError { error } => Some(ErrorPayload::new(error).to_value()),
            ChartEvent::UpdateVisualProps { visual_props } => {
                Some(json!({ "visualProps": visual_props }))
            }
            ChartEvent::TrackChartInteraction(payload)
            | ChartEvent::ShowToolTip(payload)
            | ChartEvent::UpdateTml(payload)
            | ChartEvent::GetDataForQuery(payload) => Some(payload),
            ChartEvent::CloseContextMenu
            | ChartEvent::CloseAxisMenu
            | ChartEvent::RenderStart
            | ChartEvent::RenderComplete
            | ChartEvent::HideToolTip
            | ChartEvent::ShowLoader
            | ChartEvent::HideLoader => None,
        }
    }

    pub fn emit_render_start(&self) -> LocalBoxFuture<'static, SdkResult<Value>> {
        self.emit_event(ChartEvent::RenderStart)
    }

    pub fn emit_render_complete(&self) -> LocalBoxFuture<'static, SdkResult<Value>> {
        self.emit_event(ChartEvent::RenderComplete)
    }

    pub fn emit_render_error(&self, error: impl Into<String>) -> LocalBoxFuture<'static, SdkResult<Value>> {
        self.emit_event(ChartEvent::RenderError { error: error.into() })
    }

    /// Ask the host to persist new visual props; the local model is unchanged
    /// until the host answers with `VisualPropsUpdate`
    pub fn update_visual_props(&self, visual_props: VisualProps) -> LocalBoxFuture<'static, SdkResult<Value>> {
        self.emit_event(ChartEvent::UpdateVisualProps { visual_props })
    }

    /// Stop talking to the host and release the single-context claim
    ///
    /// The mirrored model stays readable. Calling it again does nothing.
    pub fn destroy(&self) {
        if self.state() == ContextState::Destroyed {
            return;
        }

        if let Some(guard) = self.inner.listener.borrow_mut().take() {
            guard.unsubscribe();
        }
        self.inner.registry.release(self.inner.instance_id);

        self.inner.internal.borrow_mut().clear();
        self.inner.external.borrow_mut().clear();
        self.inner.context_menu_actions.borrow_mut().clear();
        self.inner.axis_menu_actions.borrow_mut().clear();
        self.inner.toast_action.borrow_mut().clear();
        self.inner.ready_waiters.borrow_mut().clear();

        self.inner.state.set(ContextState::Destroyed);
        log::info!("Chart context {} destroyed", self.inner.instance_id);
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use chart_sdk_bridge::MemoryTransport;

    fn props() -> ChartContextProps {
        ChartContextProps::new(
            |_| vec![ChartConfig { key: "main".to_string(), dimensions: vec![] }],
            |_, _| vec![],
            |_| Deferred::ready(Ok(())),
        )
    }

    fn context(transport: &MemoryTransport) -> ChartContext {
        let options = ContextOptions::default().with_registry(ContextRegistry::new());
        ChartContext::with_options(props(), Rc::new(transport.clone()), options).unwrap()
    }

    fn ready_value(response: Deferred<Value>) -> Value {
        match response.into_ready() {
            Ok(value) => value,
            Err(_) => panic!("expected a synchronous response"),
        }
    }

    #[test]
    fn test_construction_subscribes_and_awaits_host() {
        let transport = MemoryTransport::new();
        let ctx = context(&transport);
        assert_eq!(ctx.state(), ContextState::AwaitingHostAck);
        assert_eq!(transport.listener_count(), 1);
        assert!(ctx.connection_identity().is_none());
    }

    #[test]
    fn test_initialize_complete_requires_initialize() {
        let transport = MemoryTransport::new();
        let ctx = context(&transport);
        let response = ready_value(ctx.dispatch(InboundEvent::InitializeComplete, json!({})));
        assert_eq!(response["hasError"], json!(true));
        assert_eq!(ctx.state(), ContextState::AwaitingHostAck);
    }

    #[test]
    fn test_update_replies_synchronously() {
        let transport = MemoryTransport::new();
        let ctx = context(&transport);
        let response = ready_value(ctx.dispatch(
            InboundEvent::VisualPropsUpdate,
            json!({"visualProps": "raw-string"}),
        ));
        assert_eq!(response, json!({"triggerRenderChart": true}));
        assert_eq!(
            ctx.get_chart_model().visual_props,
            Some(VisualProps::Raw("raw-string".to_string()))
        );
    }

    #[test]
    fn test_malformed_payload_yields_error_payload() {
        let transport = MemoryTransport::new();
        let ctx = context(&transport);
        let response = ready_value(ctx.dispatch(InboundEvent::DataUpdate, json!({"data": 5})));
        assert_eq!(response["hasError"], json!(true));
        assert!(ctx.get_chart_model().data.is_none());
    }

    #[test]
    fn test_dropping_context_unsubscribes() {
        let transport = MemoryTransport::new();
        let registry = ContextRegistry::new();
        {
            let options = ContextOptions::default().with_registry(registry.clone());
            let _ctx = ChartContext::with_options(props(), Rc::new(transport.clone()), options).unwrap();
            assert_eq!(transport.listener_count(), 1);
        }
        assert_eq!(transport.listener_count(), 0);
        assert!(!registry.is_claimed());
    }
}
