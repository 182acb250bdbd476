use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;

/// Fixed-width so that lexical order in SQLite matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_optional_timestamp(value: Option<&NaiveDateTime>) -> Option<String> {
    value.map(format_timestamp)
}

pub fn parse_timestamp(value: &str, field: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

pub fn parse_optional_timestamp(value: Option<String>, field: &str) -> Result<Option<NaiveDateTime>> {
    match value {
        Some(raw) => parse_timestamp(&raw, field).map(Some),
        None => Ok(None),
    }
}
