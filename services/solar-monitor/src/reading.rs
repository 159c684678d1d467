//! Timestamped sensor snapshots and their timestamp format

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Format written into every new reading, local wall-clock time with microseconds
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Sensor name to value, in roster order. `None` is a failed read.
pub type SensorValues = IndexMap<String, Option<f64>>;

/// One poll cycle's snapshot of every sensor in the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: String,
    #[serde(default)]
    pub sensors: SensorValues,
}

impl Reading {
    pub fn new(at: NaiveDateTime, sensors: SensorValues) -> Self {
        Self {
            timestamp: format_timestamp(at),
            sensors,
        }
    }

    /// Parsed timestamp, `None` when the stored string is not a recognised ISO-8601 form
    pub fn time(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a reading timestamp.
///
/// Naive ISO-8601 (with or without fractional seconds) is taken as local
/// time. Offset-qualified RFC 3339 strings are converted to local time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(naive) = value.parse::<NaiveDateTime>() {
        return Some(naive);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
}

/// Current local wall-clock time
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// `now - window`, saturating at the earliest representable time
pub fn window_start(now: NaiveDateTime, window: Duration) -> NaiveDateTime {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(NaiveDateTime::MIN)
}
