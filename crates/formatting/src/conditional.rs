//! Conditional formatting rules evaluated against query data

use crate::{as_number, coerce_to_string};
use chart_sdk_shared::DataPointsArray;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    IsBetween,
    IsNotBetween,
    IsEqualTo,
    IsNotEqualTo,
    IsGreaterThan,
    IsGreaterThanOrEqualTo,
    IsLessThan,
    IsLessThanOrEqualTo,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Operands the operator reads
    pub fn arity(self) -> usize {
        match self {
            Operator::IsBetween | Operator::IsNotBetween => 2,
            Operator::IsNull | Operator::IsNotNull => 0,
            _ => 1,
        }
    }
}

/// Rule operand: a literal or a reference to a named parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    #[serde(rename_all = "camelCase")]
    Parameter { parameter_id: String },
    Literal(Value),
}

impl Operand {
    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    pub fn parameter(id: impl Into<String>) -> Self {
        Operand::Parameter {
            parameter_id: id.into(),
        }
    }

    fn resolve<'a>(&'a self, parameters: Option<&'a Map<String, Value>>) -> Option<&'a Value> {
        match self {
            Operand::Literal(value) => Some(value),
            Operand::Parameter { parameter_id } => parameters?.get(parameter_id),
        }
    }
}

/// One rule; the styling fields are opaque to the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalFormatRule {
    pub operator: Operator,
    #[serde(default)]
    pub value: Vec<Operand>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConditionalFormatRule {
    pub fn new(operator: Operator, value: Vec<Operand>) -> Self {
        Self {
            operator,
            value,
            extra: Map::new(),
        }
    }

    /// Whether `cell` satisfies the rule; unresolvable operands never match
    pub fn matches(&self, cell: &Value, parameters: Option<&Map<String, Value>>) -> bool {
        let operands: Option<Vec<&Value>> = self
            .value
            .iter()
            .take(self.operator.arity())
            .map(|operand| operand.resolve(parameters))
            .collect();
        let Some(operands) = operands else {
            log::debug!("conditional format rule references an unknown parameter");
            return false;
        };
        if operands.len() < self.operator.arity() {
            return false;
        }

        match self.operator {
            Operator::IsNull => is_null(cell),
            Operator::IsNotNull => !is_null(cell),
            Operator::IsBetween => between(cell, operands[0], operands[1]).unwrap_or(false),
            Operator::IsNotBetween => between(cell, operands[0], operands[1])
                .map(|inside| !inside)
                .unwrap_or(false),
            Operator::IsEqualTo => equals(cell, operands[0]),
            Operator::IsNotEqualTo => !is_null(cell) && !equals(cell, operands[0]),
            Operator::IsGreaterThan => compare(cell, operands[0], |a, b| a > b),
            Operator::IsGreaterThanOrEqualTo => compare(cell, operands[0], |a, b| a >= b),
            Operator::IsLessThan => compare(cell, operands[0], |a, b| a < b),
            Operator::IsLessThanOrEqualTo => compare(cell, operands[0], |a, b| a <= b),
            Operator::Contains => text_test(cell, operands[0], |a, b| a.contains(b)),
            Operator::DoesNotContain => {
                !is_null(cell) && !text_test(cell, operands[0], |a, b| a.contains(b))
            }
            Operator::StartsWith => text_test(cell, operands[0], |a, b| a.starts_with(b)),
            Operator::EndsWith => text_test(cell, operands[0], |a, b| a.ends_with(b)),
        }
    }
}

fn is_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn equals(cell: &Value, operand: &Value) -> bool {
    match (as_number(cell), as_number(operand)) {
        (Some(a), Some(b)) => a == b,
        _ => !is_null(cell) && coerce_to_string(cell) == coerce_to_string(operand),
    }
}

fn compare(cell: &Value, operand: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(cell), as_number(operand)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn between(cell: &Value, low: &Value, high: &Value) -> Option<bool> {
    let value = as_number(cell)?;
    let (a, b) = (as_number(low)?, as_number(high)?);
    Some(value >= a.min(b) && value <= a.max(b))
}

/// Case-insensitive substring tests
fn text_test(cell: &Value, operand: &Value, op: impl Fn(&str, &str) -> bool) -> bool {
    if is_null(cell) {
        return false;
    }
    let haystack = coerce_to_string(cell).to_lowercase();
    let needle = coerce_to_string(operand).to_lowercase();
    op(&haystack, &needle)
}

/// First rule in `rules` that matches the cell at `row_index` of `column_id`
pub fn evaluate_conditional_format<'r>(
    row_index: usize,
    column_id: &str,
    data_points: &DataPointsArray,
    rules: &'r [ConditionalFormatRule],
    parameters: Option<&Map<String, Value>>,
) -> Option<&'r ConditionalFormatRule> {
    let cell = data_points.value_at(row_index, column_id)?;
    rules.iter().find(|rule| rule.matches(cell, parameters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> DataPointsArray {
        serde_json::from_value(json!({
            "columns": ["region", "sales"],
            "dataValue": [
                ["North America", 120],
                ["Europe", "45.5"],
                [null, -3],
                ["", null],
            ],
        }))
        .unwrap()
    }

    fn rule(operator: Operator, value: Vec<Operand>) -> ConditionalFormatRule {
        ConditionalFormatRule::new(operator, value)
    }

    #[test]
    fn test_rule_deserialization() {
        let parsed: ConditionalFormatRule = serde_json::from_value(json!({
            "operator": "IsBetween",
            "value": [10, {"parameterId": "upper"}],
            "solidBackgroundAttrs": {"color": "#ff0000"},
        }))
        .unwrap();

        assert_eq!(parsed.operator, Operator::IsBetween);
        assert_eq!(parsed.value[0], Operand::literal(10));
        assert_eq!(parsed.value[1], Operand::parameter("upper"));
        assert_eq!(parsed.extra["solidBackgroundAttrs"], json!({"color": "#ff0000"}));
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            rule(Operator::IsGreaterThan, vec![Operand::literal(100)]),
            rule(Operator::IsGreaterThan, vec![Operand::literal(10)]),
        ];
        let data = data();

        let hit = evaluate_conditional_format(0, "sales", &data, &rules, None).unwrap();
        assert!(std::ptr::eq(hit, &rules[0]));

        let hit = evaluate_conditional_format(1, "sales", &data, &rules, None).unwrap();
        assert!(std::ptr::eq(hit, &rules[1]));

        assert!(evaluate_conditional_format(2, "sales", &data, &rules, None).is_none());
    }

    #[test]
    fn test_missing_row_or_column() {
        let rules = vec![rule(Operator::IsNull, vec![])];
        let data = data();
        assert!(evaluate_conditional_format(9, "sales", &data, &rules, None).is_none());
        assert!(evaluate_conditional_format(0, "profit", &data, &rules, None).is_none());
    }

    #[test]
    fn test_numeric_operators() {
        let cell = json!(45.5);
        let check = |operator, value: Vec<Operand>| rule(operator, value).matches(&cell, None);

        assert!(check(Operator::IsBetween, vec![Operand::literal(50), Operand::literal(40)]));
        assert!(!check(Operator::IsNotBetween, vec![Operand::literal(40), Operand::literal(50)]));
        assert!(check(Operator::IsNotBetween, vec![Operand::literal(0), Operand::literal(10)]));
        assert!(check(Operator::IsEqualTo, vec![Operand::literal("45.5")]));
        assert!(check(Operator::IsNotEqualTo, vec![Operand::literal(45)]));
        assert!(check(Operator::IsGreaterThanOrEqualTo, vec![Operand::literal(45.5)]));
        assert!(!check(Operator::IsLessThan, vec![Operand::literal(45.5)]));
        assert!(check(Operator::IsLessThanOrEqualTo, vec![Operand::literal(45.5)]));
        assert!(!check(Operator::IsGreaterThan, vec![Operand::literal("abc")]));
    }

    #[test]
    fn test_text_operators_ignore_case() {
        let cell = json!("North America");
        let check = |operator, needle: &str| {
            rule(operator, vec![Operand::literal(needle)]).matches(&cell, None)
        };

        assert!(check(Operator::Contains, "AMER"));
        assert!(check(Operator::DoesNotContain, "europe"));
        assert!(check(Operator::StartsWith, "north"));
        assert!(check(Operator::EndsWith, "ica"));
        assert!(!check(Operator::EndsWith, "north"));
        assert!(check(Operator::IsEqualTo, "North America"));
    }

    #[test]
    fn test_null_operators() {
        let data = data();
        let rules = vec![rule(Operator::IsNull, vec![])];
        assert!(evaluate_conditional_format(2, "region", &data, &rules, None).is_some());
        assert!(evaluate_conditional_format(3, "region", &data, &rules, None).is_some());
        assert!(evaluate_conditional_format(0, "region", &data, &rules, None).is_none());

        let rules = vec![rule(Operator::IsNotNull, vec![])];
        assert!(evaluate_conditional_format(0, "region", &data, &rules, None).is_some());
        assert!(evaluate_conditional_format(3, "sales", &data, &rules, None).is_none());

        let rules = vec![rule(Operator::DoesNotContain, vec![Operand::literal("x")])];
        assert!(evaluate_conditional_format(2, "region", &data, &rules, None).is_none());
    }

    #[test]
    fn test_parameter_operands() {
        let data = data();
        let rules = vec![rule(
            Operator::IsBetween,
            vec![Operand::literal(100), Operand::parameter("upper")],
        )];
        let mut parameters = Map::new();
        parameters.insert("upper".to_string(), json!(150));

        assert!(evaluate_conditional_format(0, "sales", &data, &rules, Some(&parameters)).is_some());
        assert!(evaluate_conditional_format(0, "sales", &data, &rules, None).is_none());

        parameters.insert("upper".to_string(), json!(110));
        assert!(evaluate_conditional_format(0, "sales", &data, &rules, Some(&parameters)).is_none());
    }

    #[test]
    fn test_missing_operands_never_match() {
        let cell = json!(5);
        assert!(!rule(Operator::IsBetween, vec![Operand::literal(1)]).matches(&cell, None));
        assert!(!rule(Operator::IsEqualTo, vec![]).matches(&cell, None));
    }
}
