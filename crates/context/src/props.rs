//! Developer callbacks and editor definitions handed to a chart context

use crate::context::ChartContext;
use chart_sdk_shared::{
    ChartConfig, ChartModel, Deferred, Query, ValidationResponse, VisualProps,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

pub type DefaultChartConfigFn = Rc<dyn Fn(&ChartModel) -> Vec<ChartConfig>>;
pub type QueriesFromConfigFn = Rc<dyn Fn(&[ChartConfig], &ChartModel) -> Vec<Query>>;
pub type RenderChartFn = Rc<dyn Fn(ChartContext) -> Deferred<anyhow::Result<()>>>;
pub type ValidateConfigFn = Rc<dyn Fn(&[ChartConfig], &ChartModel) -> Deferred<ValidationResponse>>;
pub type ValidateVisualPropsFn =
    Rc<dyn Fn(Option<&VisualProps>, &ChartModel, Option<&str>) -> Deferred<ValidationResponse>>;
/// Receives the event payload and `{visualProps}` of the current model
pub type TrackEventFn = Rc<dyn Fn(&Value, &Value) -> Option<Value>>;

/// One section of the chart config editor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfigSection {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_attribute_columns: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_measure_columns: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_time_series_columns: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_column_count: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfigEditorDefinition {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_text: Option<String>,
    #[serde(default)]
    pub column_sections: Vec<ChartConfigSection>,
}

/// Layout of the visual properties editor; elements are passed through as-is
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VisualPropEditorDefinition {
    #[serde(default)]
    pub elements: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_settings_definition: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Editor definition that is either fixed or computed from the current model
pub enum EditorDefinition<T> {
    Static(T),
    Dynamic(Rc<dyn Fn(&ChartModel, &ChartContext, Option<&str>) -> T>),
}

impl<T: Clone> EditorDefinition<T> {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&ChartModel, &ChartContext, Option<&str>) -> T + 'static,
    {
        EditorDefinition::Dynamic(Rc::new(f))
    }

    pub fn resolve(
        &self,
        model: &ChartModel,
        context: &ChartContext,
        active_column_id: Option<&str>,
    ) -> T {
        match self {
            EditorDefinition::Static(value) => value.clone(),
            EditorDefinition::Dynamic(f) => f(model, context, active_column_id),
        }
    }
}

impl<T> Clone for EditorDefinition<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            EditorDefinition::Static(value) => EditorDefinition::Static(value.clone()),
            EditorDefinition::Dynamic(f) => EditorDefinition::Dynamic(f.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for EditorDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorDefinition::Static(value) => f.debug_tuple("Static").field(value).finish(),
            EditorDefinition::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Everything a chart developer supplies to [`ChartContext`]
///
/// The three callbacks passed to [`ChartContextProps::new`] are required;
/// the rest are optional and set with the `with_*` methods.
#[derive(Clone)]
pub struct ChartContextProps {
    pub(crate) get_default_chart_config: DefaultChartConfigFn,
    pub(crate) get_queries_from_chart_config: QueriesFromConfigFn,
    pub(crate) render_chart: RenderChartFn,
    pub(crate) validate_config: Option<ValidateConfigFn>,
    pub(crate) validate_visual_props: Option<ValidateVisualPropsFn>,
    pub(crate) chart_config_editor_definition:
        Option<EditorDefinition<Vec<ChartConfigEditorDefinition>>>,
    pub(crate) visual_prop_editor_definition: Option<EditorDefinition<VisualPropEditorDefinition>>,
    pub(crate) track_mixpanel_event: Option<TrackEventFn>,
    pub(crate) reverse_event_execution_order: bool,
}

impl ChartContextProps {
    pub fn new<D, Q, R>(get_default_chart_config: D, get_queries_from_chart_config: Q, render_chart: R) -> Self
    where
        D: Fn(&ChartModel) -> Vec<ChartConfig> + 'static,
        Q: Fn(&[ChartConfig], &ChartModel) -> Vec<Query> + 'static,
        R: Fn(ChartContext) -> Deferred<anyhow::Result<()>> + 'static,
    {
        Self {
            get_default_chart_config: Rc::new(get_default_chart_config),
            get_queries_from_chart_config: Rc::new(get_queries_from_chart_config),
            render_chart: Rc::new(render_chart),
            validate_config: None,
            validate_visual_props: None,
            chart_config_editor_definition: None,
            visual_prop_editor_definition: None,
            track_mixpanel_event: None,
            reverse_event_execution_order: false,
        }
    }

    pub fn with_validate_config<F>(mut self, validate: F) -> Self
    where
        F: Fn(&[ChartConfig], &ChartModel) -> Deferred<ValidationResponse> + 'static,
    {
        self.validate_config = Some(Rc::new(validate));
        self
    }

    pub fn with_validate_visual_props<F>(mut self, validate: F) -> Self
    where
        F: Fn(Option<&VisualProps>, &ChartModel, Option<&str>) -> Deferred<ValidationResponse>
            + 'static,
    {
        self.validate_visual_props = Some(Rc::new(validate));
        self
    }

    pub fn with_chart_config_editor_definition(
        mut self,
        definition: EditorDefinition<Vec<ChartConfigEditorDefinition>>,
    ) -> Self {
        self.chart_config_editor_definition = Some(definition);
        self
    }

    pub fn with_visual_prop_editor_definition(
        mut self,
        definition: EditorDefinition<VisualPropEditorDefinition>,
    ) -> Self {
        self.visual_prop_editor_definition = Some(definition);
        self
    }

    pub fn with_track_mixpanel_event<F>(mut self, track: F) -> Self
    where
        F: Fn(&Value, &Value) -> Option<Value> + 'static,
    {
        self.track_mixpanel_event = Some(Rc::new(track));
        self
    }

    /// Run download handlers newest first, each seeing the previous response
    pub fn with_reverse_event_execution_order(mut self, reverse: bool) -> Self {
        self.reverse_event_execution_order = reverse;
        self
    }
}
