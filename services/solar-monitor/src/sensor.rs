//! Temperature sensor capability trait and its hardware and simulated implementations

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::SolarError;

/// Whether a roster slot is backed by hardware or synthesised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Real,
    Simulated,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Real => write!(f, "Real"),
            SensorKind::Simulated => write!(f, "Simulated"),
        }
    }
}

/// A single temperature source polled once per cycle
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SensorSource: Send + Sync + fmt::Debug {
    /// Stable roster name, used as the key in every reading
    fn id(&self) -> &str;

    fn kind(&self) -> SensorKind;

    /// Current temperature in degrees Celsius
    async fn get_temperature(&self) -> crate::Result<f64>;
}

/// DS18B20 1-wire sensor read through the kernel's `w1_slave` file
#[derive(Debug, Clone)]
pub struct Ds18b20Sensor {
    id: String,
    device_path: PathBuf,
}

impl Ds18b20Sensor {
    pub fn new(id: impl Into<String>, device_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            device_path: device_path.into(),
        }
    }

    pub fn device_path(&self) -> &PathBuf {
        &self.device_path
    }
}

#[async_trait]
impl SensorSource for Ds18b20Sensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Real
    }

    async fn get_temperature(&self) -> crate::Result<f64> {
        let content = tokio::fs::read_to_string(&self.device_path)
            .await
            .map_err(|e| SolarError::SensorRead {
                sensor: self.id.clone(),
                reason: format!("reading {:?}: {}", self.device_path, e),
            })?;

        parse_w1_slave(&content).map_err(|reason| SolarError::SensorRead {
            sensor: self.id.clone(),
            reason,
        })
    }
}

/// Parse the two-line `w1_slave` payload into degrees Celsius.
///
/// The first line ends in `YES` when the CRC check passed; the second
/// carries the value as `t=<millidegrees>`.
pub fn parse_w1_slave(content: &str) -> Result<f64, String> {
    let mut lines = content.lines();
    let crc_line = lines.next().ok_or("empty w1_slave output")?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err("CRC check failed".to_string());
    }

    let temp_line = lines.next().ok_or("missing temperature line")?;
    let pos = temp_line
        .find("t=")
        .ok_or("temperature marker 't=' not found")?;
    let raw = temp_line[pos + 2..].trim();
    let millidegrees: f64 = raw
        .parse()
        .map_err(|e| format!("invalid temperature value '{}': {}", raw, e))?;

    Ok(millidegrees / 1000.0)
}

/// Synthetic sensor producing a baseline plus bounded uniform jitter
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    id: String,
    baseline: f64,
    jitter: f64,
}

impl SimulatedSensor {
    pub fn new(id: impl Into<String>, baseline: f64, jitter: f64) -> Self {
        Self {
            id: id.into(),
            baseline,
            jitter: jitter.abs(),
        }
    }
}

#[async_trait]
impl SensorSource for SimulatedSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Simulated
    }

    async fn get_temperature(&self) -> crate::Result<f64> {
        if self.jitter == 0.0 {
            return Ok(self.baseline);
        }
        let variation = rand::rng().random_range(-self.jitter..=self.jitter);
        Ok(self.baseline + variation)
    }
}
