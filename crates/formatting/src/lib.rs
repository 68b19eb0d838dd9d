//! Value formatting used while rendering chart visuals
//!
//! Every function here is pure and never panics. Input that cannot be
//! interpreted is rendered with [`coerce_to_string`].

pub mod conditional;
pub mod date;
pub mod number;

pub use conditional::{evaluate_conditional_format, ConditionalFormatRule, Operand, Operator};
pub use date::{format_date, parse_timestamp, DatePattern};
pub use number::{format_number, FormatCategory, FormatConfig, FormatUnit, NegativeStyle};

use serde_json::Value;

/// Plain string rendering of a JSON value; `null` becomes the empty string
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Numeric view of a cell: numbers and numeric strings
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
