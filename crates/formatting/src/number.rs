//! Number formatting for measure values

use crate::{as_number, coerce_to_string};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormatCategory {
    #[default]
    Number,
    Percentage,
    Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormatUnit {
    None,
    #[default]
    Auto,
    Thousand,
    Million,
    Billion,
    Trillion,
}

/// How a negative value is marked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NegativeStyle {
    /// `-1.00`
    #[default]
    Prefix,
    /// `1.00-`
    Suffix,
    /// `(1.00)`
    Parentheses,
}

/// Number format settings; unset fields fall back to the chart-level config
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FormatCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<FormatUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_separate_thousands: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_trailing_zeroes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_style: Option<NegativeStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
}

impl FormatConfig {
    /// `self` with every unset field taken from `fallback`
    pub fn or(&self, fallback: &FormatConfig) -> FormatConfig {
        FormatConfig {
            category: self.category.or(fallback.category),
            unit: self.unit.or(fallback.unit),
            decimals: self.decimals.or(fallback.decimals),
            to_separate_thousands: self.to_separate_thousands.or(fallback.to_separate_thousands),
            remove_trailing_zeroes: self.remove_trailing_zeroes.or(fallback.remove_trailing_zeroes),
            negative_style: self.negative_style.or(fallback.negative_style),
            currency_code: self.currency_code.clone().or_else(|| fallback.currency_code.clone()),
        }
    }
}

const DEFAULT_DECIMALS: usize = 2;
const MAX_DECIMALS: usize = 20;
const UNITS: &[(FormatUnit, f64, &str)] = &[
    (FormatUnit::Thousand, 1e3, "K"),
    (FormatUnit::Million, 1e6, "M"),
    (FormatUnit::Billion, 1e9, "B"),
    (FormatUnit::Trillion, 1e12, "T"),
];

fn currency_symbol(code: &str) -> String {
    match code.to_ascii_uppercase().as_str() {
        "USD" | "AUD" | "CAD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "JPY" | "CNY" => "¥".to_string(),
        "INR" => "₹".to_string(),
        other => format!("{other} "),
    }
}

/// `magnitude` as it reads after rounding to `decimals` places
fn rounded(magnitude: f64, decimals: usize) -> f64 {
    format!("{magnitude:.decimals$}").parse().unwrap_or(magnitude)
}

/// Scale `value` by the unit, returning the scaled value and its suffix
///
/// `Auto` picks the unit from the rounded magnitude so that a value such
/// as 999999 reads `1.00M` rather than `1,000.00K`.
fn apply_unit(value: f64, unit: FormatUnit, decimals: usize) -> (f64, &'static str) {
    match unit {
        FormatUnit::None => (value, ""),
        FormatUnit::Auto => {
            let mut size = value.abs();
            let mut unit_index = None;
            while unit_index.map_or(true, |i| i < UNITS.len() - 1) && rounded(size, decimals) >= 1000.0 {
                size /= 1000.0;
                unit_index = Some(unit_index.map_or(0, |i| i + 1));
            }
            match unit_index {
                Some(i) => (value / UNITS[i].1, UNITS[i].2),
                None => (value, ""),
            }
        }
        fixed => UNITS
            .iter()
            .find(|(unit, _, _)| *unit == fixed)
            .map(|(_, divisor, suffix)| (value / divisor, *suffix))
            .unwrap_or((value, "")),
    }
}

fn group_thousands(integer: &str) -> String {
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

fn render_magnitude(magnitude: f64, decimals: usize, grouping: bool, trim: bool) -> String {
    let text = format!("{magnitude:.decimals$}");
    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (text.as_str(), ""),
    };
    let fraction = if trim { fraction.trim_end_matches('0') } else { fraction };
    let integer = if grouping {
        group_thousands(integer)
    } else {
        integer.to_string()
    };

    if fraction.is_empty() {
        integer
    } else {
        format!("{integer}.{fraction}")
    }
}

/// Format `value` with the column config layered over the chart config
///
/// Values that are not finite numbers (or numeric strings) are returned
/// as plain strings.
pub fn format_number(
    value: &Value,
    format_config: Option<&FormatConfig>,
    column_format_config: Option<&FormatConfig>,
) -> String {
    let Some(number) = as_number(value) else {
        return coerce_to_string(value);
    };

    let chart_level = format_config.cloned().unwrap_or_default();
    let config = match column_format_config {
        Some(column) => column.or(&chart_level),
        None => chart_level,
    };
    let category = config.category.unwrap_or_default();
    let decimals = config.decimals.unwrap_or(DEFAULT_DECIMALS).min(MAX_DECIMALS);
    let grouping = config.to_separate_thousands.unwrap_or(true);
    let trim = config.remove_trailing_zeroes.unwrap_or(false);

    let (scaled, suffix) = match category {
        FormatCategory::Percentage => (number * 100.0, "%"),
        _ => apply_unit(number, config.unit.unwrap_or_default(), decimals),
    };

    let body = render_magnitude(scaled.abs(), decimals, grouping, trim);
    let negative = scaled < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0');
    let prefix = match category {
        FormatCategory::Currency => currency_symbol(config.currency_code.as_deref().unwrap_or("USD")),
        _ => String::new(),
    };
    let unsigned = format!("{prefix}{body}{suffix}");

    if !negative {
        return unsigned;
    }
    match config.negative_style.unwrap_or_default() {
        NegativeStyle::Prefix => format!("-{unsigned}"),
        NegativeStyle::Suffix => format!("{unsigned}-"),
        NegativeStyle::Parentheses => format!("({unsigned})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(unit: FormatUnit) -> FormatConfig {
        FormatConfig {
            unit: Some(unit),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(format_number(&json!(1234.5), None, None), "1.23K");
        assert_eq!(format_number(&json!(999), None, None), "999.00");
        assert_eq!(format_number(&json!("2500000"), None, None), "2.50M");
    }

    #[test]
    fn test_units() {
        let value = json!(1_234_567_890.0);
        assert_eq!(format_number(&value, Some(&config(FormatUnit::None)), None), "1,234,567,890.00");
        assert_eq!(format_number(&value, Some(&config(FormatUnit::Thousand)), None), "1,234,567.89K");
        assert_eq!(format_number(&value, Some(&config(FormatUnit::Million)), None), "1,234.57M");
        assert_eq!(format_number(&value, Some(&config(FormatUnit::Billion)), None), "1.23B");
        assert_eq!(format_number(&value, Some(&config(FormatUnit::Trillion)), None), "0.00T");
        assert_eq!(format_number(&json!(5e15), Some(&config(FormatUnit::Auto)), None), "5,000.00T");
    }

    #[test]
    fn test_auto_unit_follows_rounding() {
        assert_eq!(format_number(&json!(999999.0), None, None), "1.00M");
        assert_eq!(format_number(&json!(999.999), None, None), "1.00K");
        assert_eq!(format_number(&json!(-999999.0), None, None), "-1.00M");

        let precise = FormatConfig {
            decimals: Some(3),
            ..Default::default()
        };
        assert_eq!(format_number(&json!(999999.0), Some(&precise), None), "999.999K");
    }

    #[test]
    fn test_grouping_and_trailing_zeroes() {
        let config = FormatConfig {
            unit: Some(FormatUnit::None),
            decimals: Some(3),
            to_separate_thousands: Some(false),
            remove_trailing_zeroes: Some(true),
            ..Default::default()
        };
        assert_eq!(format_number(&json!(1234567.5), Some(&config), None), "1234567.5");
        assert_eq!(format_number(&json!(12.0), Some(&config), None), "12");
    }

    #[test]
    fn test_percentage_and_currency() {
        let percentage = FormatConfig {
            category: Some(FormatCategory::Percentage),
            decimals: Some(1),
            ..Default::default()
        };
        assert_eq!(format_number(&json!(0.1234), Some(&percentage), None), "12.3%");

        let currency = FormatConfig {
            category: Some(FormatCategory::Currency),
            currency_code: Some("eur".to_string()),
            unit: Some(FormatUnit::None),
            ..Default::default()
        };
        assert_eq!(format_number(&json!(1500), Some(&currency), None), "€1,500.00");
    }

    #[test]
    fn test_negative_styles() {
        let mut config = config(FormatUnit::None);
        assert_eq!(format_number(&json!(-1500), Some(&config), None), "-1,500.00");
        config.negative_style = Some(NegativeStyle::Suffix);
        assert_eq!(format_number(&json!(-1500), Some(&config), None), "1,500.00-");
        config.negative_style = Some(NegativeStyle::Parentheses);
        assert_eq!(format_number(&json!(-1500), Some(&config), None), "(1,500.00)");
        assert_eq!(format_number(&json!(-0.001), Some(&config), None), "0.00");
    }

    #[test]
    fn test_column_config_overrides_chart_config() {
        let chart = FormatConfig {
            unit: Some(FormatUnit::None),
            decimals: Some(0),
            ..Default::default()
        };
        let column = FormatConfig {
            decimals: Some(1),
            ..Default::default()
        };
        assert_eq!(format_number(&json!(1234.56), Some(&chart), Some(&column)), "1,234.6");
        assert_eq!(format_number(&json!(1234.56), Some(&chart), None), "1,235");
    }

    #[test]
    fn test_non_numeric_falls_back_to_string() {
        assert_eq!(format_number(&json!("n/a"), None, None), "n/a");
        assert_eq!(format_number(&json!(null), None, None), "");
        assert_eq!(format_number(&json!("NaN"), None, None), "NaN");
        assert_eq!(format_number(&json!({"a": 1}), None, None), "{\"a\":1}");
    }
}
