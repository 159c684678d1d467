//! Read-side queries over the segments in a data directory

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::config::StorageConfig;
use crate::reading::{local_now, window_start, Reading};
use crate::segment::{self, SegmentDescriptor};
use crate::SolarError;

/// Query windows accepted by the history and summary endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    TwoDays,
    Week,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "24h",
            Period::TwoDays => "48h",
            Period::Week => "1w",
        }
    }

    pub fn hours(&self) -> u64 {
        match self {
            Period::Day => 24,
            Period::TwoDays => 48,
            Period::Week => 168,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.hours() * 3600)
    }
}

impl FromStr for Period {
    type Err = SolarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Period::Day),
            "48h" => Ok(Period::TwoDays),
            "1w" => Ok(Period::Week),
            other => Err(SolarError::InvalidPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Per-sensor statistics over a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Last non-absent value in chronological order
    pub current: f64,
}

/// Stateless reader; safe to clone into every request handler.
///
/// The writer may be appending to the newest segment while it is read.
/// A trailing partial line is skipped rather than failing the segment.
#[derive(Debug, Clone)]
pub struct DataReader {
    data_dir: PathBuf,
    prefix: String,
}

impl DataReader {
    pub fn new(data_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.data_dir.clone(), config.file_prefix.clone())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Segment files in the data directory, sorted by file name (chronological).
    /// A missing directory yields no segments.
    pub async fn list_segments(&self) -> Vec<SegmentDescriptor> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::error!("Failed to list data directory {:?}: {}", self.data_dir, e);
                return Vec::new();
            }
        };

        let mut segments = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if let Some(descriptor) = SegmentDescriptor::from_path(&path, &self.prefix) {
                        if path.is_file() {
                            segments.push(descriptor);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error listing {:?}: {}", self.data_dir, e);
                    break;
                }
            }
        }
        segments.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        segments
    }

    /// All readings recoverable from one segment, in file order
    pub async fn read_segment(&self, descriptor: &SegmentDescriptor) -> Vec<Reading> {
        let bytes = match tokio::fs::read(&descriptor.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Error reading {:?}: {}", descriptor.path, e);
                return Vec::new();
            }
        };

        let decoded = segment::decode(&String::from_utf8_lossy(&bytes));
        for reason in decoded.errors {
            let err = SolarError::SegmentParse {
                path: descriptor.path.clone(),
                reason,
            };
            tracing::warn!("{}", err);
        }
        decoded.readings
    }

    /// Readings from the last `window`, oldest first
    pub async fn readings_since(&self, window: Duration) -> Vec<Reading> {
        self.readings_since_at(window, local_now()).await
    }

    /// Readings with timestamp >= `now - window`, merged across segments and
    /// sorted ascending. Equal timestamps keep file order.
    pub async fn readings_since_at(&self, window: Duration, now: NaiveDateTime) -> Vec<Reading> {
        let cutoff = window_start(now, window);

        let mut timed = Vec::new();
        for descriptor in self.list_segments().await {
            for reading in self.read_segment(&descriptor).await {
                match reading.time() {
                    Some(at) if at >= cutoff => timed.push((at, reading)),
                    Some(_) => {}
                    None => tracing::warn!(
                        "Error parsing timestamp '{}' in {}",
                        reading.timestamp,
                        descriptor.file_name
                    ),
                }
            }
        }

        timed.sort_by_key(|(at, _)| *at);
        timed.into_iter().map(|(_, reading)| reading).collect()
    }

    /// Last reading of the lexicographically last segment
    pub async fn latest_reading(&self) -> Option<Reading> {
        let last = self.list_segments().await.pop()?;
        self.read_segment(&last).await.pop()
    }

    pub async fn summarize(&self, window: Duration) -> BTreeMap<String, SensorSummary> {
        self.summarize_at(window, local_now()).await
    }

    pub async fn summarize_at(
        &self,
        window: Duration,
        now: NaiveDateTime,
    ) -> BTreeMap<String, SensorSummary> {
        summarize_readings(&self.readings_since_at(window, now).await)
    }
}

/// Min, max, mean, and last value per sensor over `readings` (assumed oldest first).
///
/// Absent values are ignored. Sensors with no values at all are omitted.
pub fn summarize_readings(readings: &[Reading]) -> BTreeMap<String, SensorSummary> {
    struct Acc {
        min: f64,
        max: f64,
        sum: f64,
        count: usize,
        current: f64,
    }

    let mut accs: BTreeMap<&str, Acc> = BTreeMap::new();
    for reading in readings {
        for (name, value) in &reading.sensors {
            let Some(v) = *value else { continue };
            accs.entry(name.as_str())
                .and_modify(|acc| {
                    acc.min = acc.min.min(v);
                    acc.max = acc.max.max(v);
                    acc.sum += v;
                    acc.count += 1;
                    acc.current = v;
                })
                .or_insert(Acc {
                    min: v,
                    max: v,
                    sum: v,
                    count: 1,
                    current: v,
                });
        }
    }

    accs.into_iter()
        .map(|(name, acc)| {
            // Rounding in the sum can land the mean a hair outside [min, max]
            let avg = (acc.sum / acc.count as f64).clamp(acc.min, acc.max);
            (
                name.to_string(),
                SensorSummary {
                    min: acc.min,
                    max: acc.max,
                    avg,
                    current: acc.current,
                },
            )
        })
        .collect()
}
