//! Chart context for embedding a chart in a host analytics application
//!
//! The context answers the host's lifecycle events (handshake, model
//! updates, validation, render requests, menu clicks) and sends chart
//! events back over a [`chart_sdk_bridge::ChartChannel`].

pub mod action_table;
pub mod context;
pub mod props;
pub mod registry;
pub mod singleton;

pub use action_table::{ActionHandlerTable, ToastActionSlot};
pub use context::{ChartContext, ContextOptions, ContextState};
pub use props::{
    ChartConfigEditorDefinition, ChartConfigSection, ChartContextProps, EditorDefinition,
    VisualPropEditorDefinition,
};
pub use registry::{Dispatch, EventHandler, EventRegistry, ExecutionOrder};
pub use singleton::ContextRegistry;

pub use chart_sdk_shared as shared;
