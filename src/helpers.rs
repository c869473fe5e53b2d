//! Shared helpers for unit conversions and metric ordering.
//!
//! The conversion constants are fixed so that derived tables are reproducible
//! across runs:
//!
//! - `celsius_to_fahrenheit`: `°F = °C × 9/5 + 32`
//! - `ms_to_mph`: `mph = m/s × 2.23694`

use chrono::NaiveDate;
use std::cmp::Ordering;

/// Miles per hour in one metre per second.
pub const MS_TO_MPH: f64 = 2.23694;

/// Convert a temperature from Celsius to Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert a speed from metres per second to miles per hour.
pub fn ms_to_mph(speed_ms: f64) -> f64 {
    speed_ms * MS_TO_MPH
}

/// Date key used to name day datasets ("YYYY-MM-DD").
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Sort direction for a ranking metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Compare two optional metric values so that present values come first in
/// the requested direction and missing values (or NaN) always sort last.
pub fn compare_metric(a: Option<f64>, b: Option<f64>, order: SortOrder) -> Ordering {
    let a = a.filter(|v| !v.is_nan());
    let b = b.filter(|v| !v.is_nan());
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
