//! Lenient parsing of upstream string fields.
//!
//! The upstream catalogue ships every value as an optional string. These
//! helpers turn them into typed values and never fail: a blank or malformed
//! field becomes `None`, so one bad value degrades that field only and never
//! the whole record or pass.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a decimal number using a locale-invariant grammar (optional sign,
/// `.` as decimal point, optional exponent).
///
/// Non-finite results (`inf`, `NaN`) are rejected.
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    non_blank(raw)?.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Parse a latitude or longitude. Range checks belong to validation.
pub fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    parse_number(raw)
}

/// Parse a mass in grams. Sign checks belong to validation.
pub fn parse_mass(raw: Option<&str>) -> Option<f64> {
    parse_number(raw)
}

/// Extract a year, trying full date/time forms first and then a bare integer.
pub fn parse_year(raw: Option<&str>) -> Option<i32> {
    let value = non_blank(raw)?;
    year_from_date(value).or_else(|| value.parse::<i32>().ok())
}

fn year_from_date(value: &str) -> Option<i32> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.year());
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.year())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .map(|d| d.year())
        })
}
