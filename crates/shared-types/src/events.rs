//! Event types exchanged with the host application
//!
//! Inbound events (host → chart) form a closed set so handler lists can be
//! kept in a fixed-size table indexed by variant. Outbound events
//! (chart → host) carry their payload in [`ChartEvent`].

use crate::actions::{AlertToastPayload, AxisMenuPayload, ContextMenuPayload};
use crate::model::VisualProps;
use serde_json::Value;
use std::fmt;

/// Events the host sends to the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundEvent {
    // Internal protocol events
    Initialize,
    InitializeComplete,
    GetDataQuery,
    ChartConfigValidate,
    VisualPropsValidate,
    TriggerRenderChart,

    // Developer-overridable events
    ChartModelUpdate,
    DataUpdate,
    VisualPropsUpdate,
    ContextMenuActionClick,
    AxisMenuActionClick,
    GlobalToastActionClick,
    MixpanelEvent,
    DownloadExcelTrigger,
}

impl InboundEvent {
    pub const COUNT: usize = 14;

    pub const ALL: [InboundEvent; Self::COUNT] = [
        InboundEvent::Initialize,
        InboundEvent::InitializeComplete,
        InboundEvent::GetDataQuery,
        InboundEvent::ChartConfigValidate,
        InboundEvent::VisualPropsValidate,
        InboundEvent::TriggerRenderChart,
        InboundEvent::ChartModelUpdate,
        InboundEvent::DataUpdate,
        InboundEvent::VisualPropsUpdate,
        InboundEvent::ContextMenuActionClick,
        InboundEvent::AxisMenuActionClick,
        InboundEvent::GlobalToastActionClick,
        InboundEvent::MixpanelEvent,
        InboundEvent::DownloadExcelTrigger,
    ];

    /// Slot of this event in per-event tables
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InboundEvent::Initialize => "Initialize",
            InboundEvent::InitializeComplete => "InitializeComplete",
            InboundEvent::GetDataQuery => "GetDataQuery",
            InboundEvent::ChartConfigValidate => "ChartConfigValidate",
            InboundEvent::VisualPropsValidate => "VisualPropsValidate",
            InboundEvent::TriggerRenderChart => "TriggerRenderChart",
            InboundEvent::ChartModelUpdate => "ChartModelUpdate",
            InboundEvent::DataUpdate => "DataUpdate",
            InboundEvent::VisualPropsUpdate => "VisualPropsUpdate",
            InboundEvent::ContextMenuActionClick => "ContextMenuActionClick",
            InboundEvent::AxisMenuActionClick => "AxisMenuActionClick",
            InboundEvent::GlobalToastActionClick => "GlobalToastActionClick",
            InboundEvent::MixpanelEvent => "MixpanelEvent",
            InboundEvent::DownloadExcelTrigger => "DownloadExcelTrigger",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.as_str() == name)
    }

    /// Internal events are answered by the SDK itself and cannot be overridden
    pub fn is_internal(self) -> bool {
        ExternalEvent::from_inbound(self).is_none()
    }

    /// Events whose handlers may run as a reverse-order chain
    pub fn supports_chaining(self) -> bool {
        matches!(self, InboundEvent::DownloadExcelTrigger)
    }
}

impl fmt::Display for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound events a chart developer may attach handlers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalEvent {
    ChartModelUpdate,
    DataUpdate,
    VisualPropsUpdate,
    ContextMenuActionClick,
    AxisMenuActionClick,
    GlobalToastActionClick,
    MixpanelEvent,
    DownloadExcelTrigger,
}

impl ExternalEvent {
    pub fn from_inbound(event: InboundEvent) -> Option<Self> {
        let external = match event {
            InboundEvent::ChartModelUpdate => ExternalEvent::ChartModelUpdate,
            InboundEvent::DataUpdate => ExternalEvent::DataUpdate,
            InboundEvent::VisualPropsUpdate => ExternalEvent::VisualPropsUpdate,
            InboundEvent::ContextMenuActionClick => ExternalEvent::ContextMenuActionClick,
            InboundEvent::AxisMenuActionClick => ExternalEvent::AxisMenuActionClick,
            InboundEvent::GlobalToastActionClick => ExternalEvent::GlobalToastActionClick,
            InboundEvent::MixpanelEvent => ExternalEvent::MixpanelEvent,
            InboundEvent::DownloadExcelTrigger => ExternalEvent::DownloadExcelTrigger,
            _ => return None,
        };
        Some(external)
    }
}

impl From<ExternalEvent> for InboundEvent {
    fn from(event: ExternalEvent) -> Self {
        match event {
            ExternalEvent::ChartModelUpdate => InboundEvent::ChartModelUpdate,
            ExternalEvent::DataUpdate => InboundEvent::DataUpdate,
            ExternalEvent::VisualPropsUpdate => InboundEvent::VisualPropsUpdate,
            ExternalEvent::ContextMenuActionClick => InboundEvent::ContextMenuActionClick,
            ExternalEvent::AxisMenuActionClick => InboundEvent::AxisMenuActionClick,
            ExternalEvent::GlobalToastActionClick => InboundEvent::GlobalToastActionClick,
            ExternalEvent::MixpanelEvent => InboundEvent::MixpanelEvent,
            ExternalEvent::DownloadExcelTrigger => InboundEvent::DownloadExcelTrigger,
        }
    }
}

/// Event types the chart sends to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundEvent {
    OpenContextMenu,
    CloseContextMenu,
    OpenAxisMenu,
    CloseAxisMenu,
    RenderStart,
    RenderError,
    RenderComplete,
    UpdateVisualProps,
    ShowGlobalAlertToast,
    TrackChartInteraction,
    ShowToolTip,
    HideToolTip,
    UpdateTml,
    GetDataForQuery,
    ShowLoader,
    HideLoader,
}

impl OutboundEvent {
    pub const ALL: [OutboundEvent; 16] = [
        OutboundEvent::OpenContextMenu,
        OutboundEvent::CloseContextMenu,
        OutboundEvent::OpenAxisMenu,
        OutboundEvent::CloseAxisMenu,
        OutboundEvent::RenderStart,
        OutboundEvent::RenderError,
        OutboundEvent::RenderComplete,
        OutboundEvent::UpdateVisualProps,
        OutboundEvent::ShowGlobalAlertToast,
        OutboundEvent::TrackChartInteraction,
        OutboundEvent::ShowToolTip,
        OutboundEvent::HideToolTip,
        OutboundEvent::UpdateTml,
        OutboundEvent::GetDataForQuery,
        OutboundEvent::ShowLoader,
        OutboundEvent::HideLoader,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutboundEvent::OpenContextMenu => "OpenContextMenu",
            OutboundEvent::CloseContextMenu => "CloseContextMenu",
            OutboundEvent::OpenAxisMenu => "OpenAxisMenu",
            OutboundEvent::CloseAxisMenu => "CloseAxisMenu",
            OutboundEvent::RenderStart => "RenderStart",
            OutboundEvent::RenderError => "RenderError",
            OutboundEvent::RenderComplete => "RenderComplete",
            OutboundEvent::UpdateVisualProps => "UpdateVisualProps",
            OutboundEvent::ShowGlobalAlertToast => "ShowGlobalAlertToast",
            OutboundEvent::TrackChartInteraction => "TrackChartInteraction",
            OutboundEvent::ShowToolTip => "ShowToolTip",
            OutboundEvent::HideToolTip => "HideToolTip",
            OutboundEvent::UpdateTml => "UpdateTML",
            OutboundEvent::GetDataForQuery => "GetDataForQuery",
            OutboundEvent::ShowLoader => "ShowLoader",
            OutboundEvent::HideLoader => "HideLoader",
        }
    }
}

impl fmt::Display for OutboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound event together with its payload
#[derive(Debug)]
pub enum ChartEvent {
    OpenContextMenu(ContextMenuPayload),
    CloseContextMenu,
    OpenAxisMenu(AxisMenuPayload),
    CloseAxisMenu,
    RenderStart,
    RenderError { error: String },
    RenderComplete,
    UpdateVisualProps { visual_props: VisualProps },
    ShowGlobalAlertToast(AlertToastPayload),
    TrackChartInteraction(Value),
    ShowToolTip(Value),
    HideToolTip,
    UpdateTml(Value),
    GetDataForQuery(Value),
    ShowLoader,
    HideLoader,
}

impl ChartEvent {
    pub fn event_type(&self) -> OutboundEvent {
        match self {
            ChartEvent::OpenContextMenu(_) => OutboundEvent::OpenContextMenu,
            ChartEvent::CloseContextMenu => OutboundEvent::CloseContextMenu,
            ChartEvent::OpenAxisMenu(_) => OutboundEvent::OpenAxisMenu,
            ChartEvent::CloseAxisMenu => OutboundEvent::CloseAxisMenu,
            ChartEvent::RenderStart => OutboundEvent::RenderStart,
            ChartEvent::RenderError { .. } => OutboundEvent::RenderError,
            ChartEvent::RenderComplete => OutboundEvent::RenderComplete,
            ChartEvent::UpdateVisualProps { .. } => OutboundEvent::UpdateVisualProps,
            ChartEvent::ShowGlobalAlertToast(_) => OutboundEvent::ShowGlobalAlertToast,
            ChartEvent::TrackChartInteraction(_) => OutboundEvent::TrackChartInteraction,
            ChartEvent::ShowToolTip(_) => OutboundEvent::ShowToolTip,
            ChartEvent::HideToolTip => OutboundEvent::HideToolTip,
            ChartEvent::UpdateTml(_) => OutboundEvent::UpdateTml,
            ChartEvent::GetDataForQuery(_) => OutboundEvent::GetDataForQuery,
            ChartEvent::ShowLoader => OutboundEvent::ShowLoader,
            ChartEvent::HideLoader => OutboundEvent::HideLoader,
        }
    }
}
