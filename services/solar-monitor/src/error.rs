//! Error types for the solar monitor service

use std::path::PathBuf;

/// Errors that can occur in the solar monitor service
#[derive(Debug, thiserror::Error)]
pub enum SolarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sensor '{sensor}' read failed: {reason}")]
    SensorRead { sensor: String, reason: String },

    #[error("Failed to write segment {path:?}: {source}")]
    SegmentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse segment {path:?}: {reason}")]
    SegmentParse { path: PathBuf, reason: String },

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Failed to delete expired segment {path:?}: {source}")]
    RetentionDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Dashboard error: {0}")]
    Dashboard(String),
}

/// Result type alias for solar monitor operations
pub type Result<T> = std::result::Result<T, SolarError>;
