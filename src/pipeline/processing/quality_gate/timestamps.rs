use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::DataFrame;

use crate::frame;
use crate::pipeline::processing::normalize::slugify;

/// Layout parsed timestamps are written back in.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a timestamp in any of the layouts survey exports use.
/// Offsets are normalized to UTC; date-only values land on midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Find a column by exact name, then case-insensitively, then by its slug.
pub fn resolve_column(df: &DataFrame, candidate: &str) -> Option<String> {
    let columns = frame::column_names(df);
    if columns.iter().any(|c| c == candidate) {
        return Some(candidate.to_string());
    }
    let lower = candidate.to_lowercase();
    if let Some(found) = columns.iter().find(|c| c.to_lowercase() == lower) {
        return Some(found.clone());
    }
    let slug = slugify(candidate);
    columns.into_iter().find(|c| *c == slug)
}
