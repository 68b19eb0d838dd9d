//! Date formatting for time-bucketed attribute values

use crate::coerce_to_string;
use chart_sdk_shared::LocaleOptions;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde_json::Value;
use std::fmt::Write;

/// Epoch values at or above this magnitude are read as milliseconds
const MILLIS_THRESHOLD: f64 = 1e11;

/// Named time buckets the host uses for date columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePattern {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl DatePattern {
    pub fn parse(pattern: &str) -> Option<Self> {
        match pattern {
            "HOURLY" => Some(DatePattern::Hourly),
            "DAILY" => Some(DatePattern::Daily),
            "WEEKLY" => Some(DatePattern::Weekly),
            "MONTHLY" => Some(DatePattern::Monthly),
            "QUARTERLY" => Some(DatePattern::Quarterly),
            "YEARLY" => Some(DatePattern::Yearly),
            _ => None,
        }
    }
}

fn from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }
    let millis = if epoch.abs() >= MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };
    // Out of i64 range saturates and is then rejected by chrono
    DateTime::<Utc>::from_timestamp_millis(millis.round() as i64)
}

/// Parse epoch seconds, epoch millis, RFC 3339 or `YYYY-MM-DD`
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => from_epoch(number.as_f64()?),
        Value::String(text) => {
            let text = text.trim();
            if let Ok(epoch) = text.parse::<f64>() {
                return from_epoch(epoch);
            }
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            Some(date.and_hms_opt(0, 0, 0)?.and_utc())
        }
        _ => None,
    }
}

/// Quarter number and the year it belongs to
///
/// A fiscal year starting in month `start` is named after the calendar
/// year it ends in.
fn quarter_of(date: &DateTime<Utc>, start_month: u32) -> (u32, i32) {
    let month = date.month();
    let start_month = start_month.clamp(1, 12);
    let shifted = (month + 12 - start_month) % 12;
    let year = if start_month > 1 && month >= start_month {
        date.year() + 1
    } else {
        date.year()
    };
    (shifted / 3 + 1, year)
}

fn format_bucket(
    date: &DateTime<Utc>,
    pattern: DatePattern,
    use_system_calendar: bool,
    locale_options: Option<&LocaleOptions>,
) -> String {
    let fiscal_start = locale_options
        .and_then(|options| options.quarter_start_month)
        .filter(|_| !use_system_calendar);

    match pattern {
        DatePattern::Hourly => date.format("%m/%d/%Y %H:00").to_string(),
        DatePattern::Daily => date.format("%m/%d/%Y").to_string(),
        DatePattern::Weekly => {
            let offset = i64::from(date.weekday().num_days_from_sunday());
            let week_start = *date - Duration::days(offset);
            format!("Wk of {}", week_start.format("%m/%d/%Y"))
        }
        DatePattern::Monthly => date.format("%b %Y").to_string(),
        DatePattern::Quarterly => match fiscal_start {
            Some(start) => {
                let (quarter, year) = quarter_of(date, start);
                format!("Q{quarter} FY {year}")
            }
            None => {
                let (quarter, year) = quarter_of(date, 1);
                format!("Q{quarter} {year}")
            }
        },
        DatePattern::Yearly => match fiscal_start {
            Some(start) => format!("FY {}", quarter_of(date, start).1),
            None => date.year().to_string(),
        },
    }
}

/// Format a date value with a named bucket or a strftime pattern
///
/// Fiscal quarters and years follow `quarterStartMonth` from the locale
/// options unless `use_system_calendar` is set. Input that is not a date,
/// or a pattern chrono rejects, yields the plain string form of `value`.
pub fn format_date(
    value: &Value,
    pattern: &str,
    use_system_calendar: bool,
    locale_options: Option<&LocaleOptions>,
) -> String {
    let Some(date) = parse_timestamp(value) else {
        return coerce_to_string(value);
    };

    if let Some(bucket) = DatePattern::parse(pattern) {
        return format_bucket(&date, bucket, use_system_calendar, locale_options);
    }

    let pattern = if pattern.is_empty() { "%Y-%m-%d" } else { pattern };
    let mut rendered = String::new();
    match write!(rendered, "{}", date.format(pattern)) {
        Ok(()) => rendered,
        Err(_) => {
            log::warn!("Unsupported date pattern {pattern:?}");
            coerce_to_string(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2024-02-14T09:30:00Z, a Wednesday
    const SECONDS: i64 = 1_707_903_000;

    fn fiscal(start: u32) -> LocaleOptions {
        LocaleOptions {
            quarter_start_month: Some(start),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_inputs() {
        let expected = DateTime::<Utc>::from_timestamp(SECONDS, 0);
        assert_eq!(parse_timestamp(&json!(SECONDS)), expected);
        assert_eq!(parse_timestamp(&json!(SECONDS * 1000)), expected);
        assert_eq!(parse_timestamp(&json!(SECONDS.to_string())), expected);
        assert_eq!(parse_timestamp(&json!("2024-02-14T10:30:00+01:00")), expected);
        assert_eq!(
            parse_timestamp(&json!("2024-02-14")),
            DateTime::<Utc>::from_timestamp(1_707_868_800, 0)
        );
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
    }

    #[test]
    fn test_named_buckets() {
        let value = json!(SECONDS);
        let format = |pattern| format_date(&value, pattern, true, None);

        assert_eq!(format("HOURLY"), "02/14/2024 09:00");
        assert_eq!(format("DAILY"), "02/14/2024");
        assert_eq!(format("WEEKLY"), "Wk of 02/11/2024");
        assert_eq!(format("MONTHLY"), "Feb 2024");
        assert_eq!(format("QUARTERLY"), "Q1 2024");
        assert_eq!(format("YEARLY"), "2024");
    }

    #[test]
    fn test_fiscal_quarters() {
        let value = json!(SECONDS);
        let april = fiscal(4);

        assert_eq!(format_date(&value, "QUARTERLY", false, Some(&april)), "Q4 FY 2024");
        assert_eq!(format_date(&value, "YEARLY", false, Some(&april)), "FY 2024");
        assert_eq!(format_date(&value, "QUARTERLY", true, Some(&april)), "Q1 2024");

        let may = json!("2024-05-01");
        assert_eq!(format_date(&may, "QUARTERLY", false, Some(&april)), "Q1 FY 2025");
        assert_eq!(format_date(&may, "YEARLY", false, Some(&april)), "FY 2025");

        let february = fiscal(2);
        assert_eq!(format_date(&value, "QUARTERLY", false, Some(&february)), "Q1 FY 2025");
        let january = json!("2024-01-31");
        assert_eq!(format_date(&january, "QUARTERLY", false, Some(&february)), "Q4 FY 2024");
    }

    #[test]
    fn test_custom_calendar_without_start_month_uses_calendar_quarters() {
        let value = json!(SECONDS);
        let options = LocaleOptions::default();
        assert_eq!(format_date(&value, "QUARTERLY", false, Some(&options)), "Q1 2024");
        assert_eq!(format_date(&value, "QUARTERLY", false, None), "Q1 2024");
    }

    #[test]
    fn test_strftime_patterns() {
        let value = json!(SECONDS);
        assert_eq!(format_date(&value, "%Y/%m/%d %H:%M", true, None), "2024/02/14 09:30");
        assert_eq!(format_date(&value, "", true, None), "2024-02-14");
    }

    #[test]
    fn test_malformed_input_falls_back_to_string() {
        assert_eq!(format_date(&json!("not a date"), "DAILY", true, None), "not a date");
        assert_eq!(format_date(&json!(null), "DAILY", true, None), "");
        assert_eq!(format_date(&json!(f64::MAX), "DAILY", true, None), "1.7976931348623157e308");
        assert_eq!(format_date(&json!(SECONDS), "%Q", true, None), SECONDS.to_string());
    }
}
