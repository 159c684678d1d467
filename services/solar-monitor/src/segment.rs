//! Segment file naming and on-disk encoding
//!
//! A segment is one hourly log file named `<prefix>_<YYYYMMDD_HH>.jsonl`.
//! Each line holds one JSON-encoded [`Reading`]; appending a reading never
//! rewrites earlier bytes. Files written before the line format existed
//! are named `.json` and hold a single JSON array of readings.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::reading::Reading;

pub const LINES_EXTENSION: &str = "jsonl";
pub const LEGACY_EXTENSION: &str = "json";

const HOUR_STAMP_FORMAT: &str = "%Y%m%d_%H";
/// `YYYYMMDD_HH`
const HOUR_STAMP_LEN: usize = 11;

/// On-disk encoding of a segment, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentFormat {
    Lines,
    LegacyArray,
}

/// A segment file found in the data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub path: PathBuf,
    pub file_name: String,
    pub format: SegmentFormat,
}

impl SegmentDescriptor {
    /// Describe `path` if its file name is a segment of `prefix`
    pub fn from_path(path: &Path, prefix: &str) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let rest = file_name.strip_prefix(prefix)?.strip_prefix('_')?;
        let format = if rest.ends_with(&format!(".{LINES_EXTENSION}")) {
            SegmentFormat::Lines
        } else if rest.ends_with(&format!(".{LEGACY_EXTENSION}")) {
            SegmentFormat::LegacyArray
        } else {
            return None;
        };
        Some(Self {
            path: path.to_path_buf(),
            file_name,
            format,
        })
    }
}

/// Start of the hour containing `at`
pub fn truncate_to_hour(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_hms_opt(at.hour(), 0, 0).unwrap_or(at)
}

/// File name of the segment that starts at `hour`
pub fn segment_file_name(prefix: &str, hour: NaiveDateTime) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        hour.format(HOUR_STAMP_FORMAT),
        LINES_EXTENSION
    )
}

/// The `YYYYMMDD_HH` stamp embedded in a segment file name, if well-formed in length
pub fn hour_stamp<'a>(file_name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('_')?;
    let stamp = rest
        .strip_suffix(&format!(".{LINES_EXTENSION}"))
        .or_else(|| rest.strip_suffix(&format!(".{LEGACY_EXTENSION}")))?;
    if stamp.len() < HOUR_STAMP_LEN {
        return None;
    }
    Some(stamp)
}

/// Calendar date from the first eight characters of a segment's hour stamp
pub fn embedded_date(file_name: &str, prefix: &str) -> Option<NaiveDate> {
    let stamp = hour_stamp(file_name, prefix)?;
    let date_part = stamp.get(..8)?;
    NaiveDate::parse_from_str(date_part, "%Y%m%d").ok()
}

/// Encode a reading as one newline-terminated line
pub fn encode_line(reading: &Reading) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(reading)?;
    line.push('\n');
    Ok(line)
}

/// Result of decoding a segment: the readings recovered plus the problems skipped
#[derive(Debug, Default)]
pub struct Decoded {
    pub readings: Vec<Reading>,
    pub errors: Vec<String>,
}

/// Decode segment content in either on-disk format.
///
/// Content whose first non-whitespace character is `[` is treated as a
/// legacy JSON array; anything else as one reading per line. Malformed
/// lines or array elements are reported in `errors` and skipped, which
/// also covers a trailing line still being written by the logger.
pub fn decode(content: &str) -> Decoded {
    if content.trim_start().starts_with('[') {
        decode_array(content)
    } else {
        decode_lines(content)
    }
}

fn decode_lines(content: &str) -> Decoded {
    let mut decoded = Decoded::default();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Reading>(line) {
            Ok(reading) => decoded.readings.push(reading),
            Err(e) => decoded.errors.push(format!("line {}: {}", index + 1, e)),
        }
    }
    decoded
}

fn decode_array(content: &str) -> Decoded {
    let mut decoded = Decoded::default();
    let values: Vec<serde_json::Value> = match serde_json::from_str(content) {
        Ok(values) => values,
        Err(e) => {
            decoded.errors.push(format!("array: {}", e));
            return decoded;
        }
    };
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<Reading>(value) {
            Ok(reading) => decoded.readings.push(reading),
            Err(e) => decoded.errors.push(format!("element {}: {}", index, e)),
        }
    }
    decoded
}
