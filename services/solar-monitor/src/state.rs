//! Live status shared between the poll loop and the dashboard

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::reading::Reading;
use crate::sensor::SensorKind;
use crate::store::UploadOutcome;

/// Status of a single roster slot
#[derive(Debug, Clone, Serialize)]
pub struct SensorStatus {
    pub name: String,
    pub kind: SensorKind,
    pub last_value: Option<f64>,
    pub consecutive_failures: u32,
}

/// Outcome of the most recent seal
#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    pub segment: String,
    #[serde(flatten)]
    pub outcome: UploadOutcome,
    pub timestamp_epoch_ms: u64,
}

/// State written by the poll loop and read by the dashboard
#[derive(Debug)]
pub struct MonitorStatus {
    pub sensors: Vec<SensorStatus>,
    pub active_segment: Option<String>,
    pub last_poll_epoch_ms: u64,
    pub cycles: u64,
    pub write_failures: u64,
    pub last_upload: Option<UploadRecord>,
    pub started_at: Instant,
}

impl MonitorStatus {
    pub fn new(roster: Vec<(String, SensorKind)>) -> Self {
        let sensors = roster
            .into_iter()
            .map(|(name, kind)| SensorStatus {
                name,
                kind,
                last_value: None,
                consecutive_failures: 0,
            })
            .collect();

        Self {
            sensors,
            active_segment: None,
            last_poll_epoch_ms: 0,
            cycles: 0,
            write_failures: 0,
            last_upload: None,
            started_at: Instant::now(),
        }
    }

    /// Update one sensor, returning its consecutive failure count
    pub fn update_sensor(&mut self, name: &str, value: Option<f64>) -> u32 {
        match self.sensors.iter_mut().find(|s| s.name == name) {
            Some(status) => {
                if value.is_some() {
                    status.consecutive_failures = 0;
                } else {
                    status.consecutive_failures += 1;
                }
                status.last_value = value;
                status.consecutive_failures
            }
            None => 0,
        }
    }

    /// Record a completed poll cycle. Returns the sensors whose failure
    /// count is now `threshold`, so each streak is reported once.
    pub fn record_cycle(&mut self, reading: &Reading, now_ms: u64, threshold: u32) -> Vec<String> {
        let mut reached = Vec::new();
        for (name, value) in &reading.sensors {
            if self.update_sensor(name, *value) == threshold {
                reached.push(name.clone());
            }
        }
        self.last_poll_epoch_ms = now_ms;
        self.cycles += 1;
        reached
    }

    pub fn record_upload(&mut self, segment: String, outcome: UploadOutcome, now_ms: u64) {
        self.last_upload = Some(UploadRecord {
            segment,
            outcome,
            timestamp_epoch_ms: now_ms,
        });
    }
}

/// Thread-safe status handle
pub type StatusHandle = Arc<RwLock<MonitorStatus>>;

pub fn new_status_handle(roster: Vec<(String, SensorKind)>) -> StatusHandle {
    Arc::new(RwLock::new(MonitorStatus::new(roster)))
}

pub fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
