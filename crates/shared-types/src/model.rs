//! Chart model and app config as mirrored from the host
//!
//! Fields the SDK does not interpret are kept in `extra` maps so that a
//! model received from the host serializes back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column role as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ColumnType {
    #[default]
    Unknown,
    Attribute,
    Measure,
}

impl From<u8> for ColumnType {
    fn from(value: u8) -> Self {
        match value {
            1 => ColumnType::Attribute,
            2 => ColumnType::Measure,
            _ => ColumnType::Unknown,
        }
    }
}

impl From<ColumnType> for u8 {
    fn from(value: ColumnType) -> Self {
        match value {
            ColumnType::Unknown => 0,
            ColumnType::Attribute => 1,
            ColumnType::Measure => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartColumn {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub column_type: ColumnType,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChartColumn {
    pub fn new(id: impl Into<String>, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column_type,
            extra: Map::new(),
        }
    }
}

/// Columns placed in one section of the chart config editor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfigDimension {
    pub key: String,
    #[serde(default)]
    pub columns: Vec<ChartColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub key: String,
    #[serde(default)]
    pub dimensions: Vec<ChartConfigDimension>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub query_columns: Vec<ChartColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<Value>,
}

/// Tabular result of one query, column ids in `columns` order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataPointsArray {
    pub columns: Vec<String>,
    pub data_value: Vec<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataPointsArray {
    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.columns.iter().position(|id| id == column_id)
    }

    pub fn value_at(&self, row_index: usize, column_id: &str) -> Option<&Value> {
        let column = self.column_index(column_id)?;
        self.data_value.get(row_index)?.get(column)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    pub data: DataPointsArray,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Developer-defined visual properties
///
/// The host may hold either a JSON document or an opaque string; both are
/// carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VisualProps {
    Raw(String),
    Structured(Value),
}

impl VisualProps {
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            VisualProps::Raw(raw) => Some(raw),
            VisualProps::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            VisualProps::Raw(_) => None,
            VisualProps::Structured(value) => Some(value),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            VisualProps::Raw(raw) => Value::String(raw.clone()),
            VisualProps::Structured(value) => value.clone(),
        }
    }
}

impl From<Value> for VisualProps {
    fn from(value: Value) -> Self {
        match value {
            Value::String(raw) => VisualProps::Raw(raw),
            other => VisualProps::Structured(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_config: Option<Vec<ChartConfig>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Local mirror of the host's chart state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartModel {
    #[serde(default)]
    pub columns: Vec<ChartColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<QueryData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_props: Option<VisualProps>,
    #[serde(default)]
    pub config: ChartModelConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_info: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChartModel {
    /// Persisted chart config, if the host sent a non-empty one
    pub fn persisted_chart_config(&self) -> Option<&[ChartConfig]> {
        match self.config.chart_config.as_deref() {
            Some(config) if !config.is_empty() => Some(config),
            _ => None,
        }
    }

    pub fn find_column(&self, column_id: &str) -> Option<&ChartColumn> {
        self.columns.iter().find(|column| column.id == column_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocaleOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter_start_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selling_year: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Host-wide settings handed over during the handshake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale_options: Option<LocaleOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_calendar_config: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_round_trip_keeps_unknown_fields() {
        let raw = json!({
            "columns": [{"id": "c1", "name": "Sales", "type": 2, "dataType": 3}],
            "data": [{"data": {"columns": ["c1"], "dataValue": [[10], [20]], "totalRowCount": 2}}],
            "visualProps": {"color": "red"},
            "config": {"chartConfig": [], "tml": "x"},
            "sortInfo": {"c1": "asc"},
            "hostOnly": true,
        });
        let model: ChartModel = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(model.columns[0].column_type, ColumnType::Measure);
        assert_eq!(serde_json::to_value(&model).unwrap(), raw);
    }

    #[test]
    fn test_visual_props_variants() {
        let raw: VisualProps = serde_json::from_value(json!("{\"not\":\"parsed\"}")).unwrap();
        assert_eq!(raw.as_raw(), Some("{\"not\":\"parsed\"}"));

        let structured: VisualProps = serde_json::from_value(json!({"a": [1, 2]})).unwrap();
        assert_eq!(structured.as_structured(), Some(&json!({"a": [1, 2]})));
        assert_eq!(serde_json::to_value(&structured).unwrap(), json!({"a": [1, 2]}));
        assert_eq!(VisualProps::from(json!("s")), VisualProps::Raw("s".to_string()));
    }

    #[test]
    fn test_persisted_chart_config() {
        let mut model = ChartModel::default();
        assert!(model.persisted_chart_config().is_none());
        model.config.chart_config = Some(vec![]);
        assert!(model.persisted_chart_config().is_none());
        model.config.chart_config = Some(vec![ChartConfig {
            key: "main".to_string(),
            dimensions: vec![],
        }]);
        assert_eq!(model.persisted_chart_config().map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_data_point_lookup() {
        let points = DataPointsArray {
            columns: vec!["a".to_string(), "b".to_string()],
            data_value: vec![vec![json!(1), json!("x")]],
            extra: Map::new(),
        };
        assert_eq!(points.value_at(0, "b"), Some(&json!("x")));
        assert_eq!(points.value_at(1, "b"), None);
        assert_eq!(points.value_at(0, "missing"), None);
    }
}
