//! Configuration types for the solar monitor service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Sensor roster and polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Roster size; real sensors fill slots first, simulated ones pad the rest
    #[serde(default = "default_sensor_count")]
    pub count: usize,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_w1_devices_dir")]
    pub w1_devices_dir: PathBuf,
    #[serde(default = "default_simulated_baseline")]
    pub simulated_baseline: f64,
    #[serde(default = "default_simulated_jitter")]
    pub simulated_jitter: f64,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            count: default_sensor_count(),
            poll_interval: default_poll_interval(),
            w1_devices_dir: default_w1_devices_dir(),
            simulated_baseline: default_simulated_baseline(),
            simulated_jitter: default_simulated_jitter(),
        }
    }
}

/// Segment storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_retention", with = "humantime_serde")]
    pub retention: Duration,
    /// fsync every append in addition to flushing it
    #[serde(default)]
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_prefix: default_file_prefix(),
            retention: default_retention(),
            sync_writes: false,
        }
    }
}

/// Remote upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub target: UploadTarget,
    #[serde(default = "default_upload_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            target: UploadTarget::default(),
            timeout: default_upload_timeout(),
        }
    }
}

/// Where sealed segments are copied to, tagged for extensibility
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadTarget {
    #[default]
    None,
    Directory {
        path: PathBuf,
    },
    Rclone {
        #[serde(default = "default_rclone_remote")]
        remote: String,
        #[serde(default = "default_rclone_folder")]
        folder: String,
        #[serde(default = "default_rclone_binary")]
        binary: String,
    },
}

impl UploadTarget {
    pub fn type_name(&self) -> &str {
        match self {
            UploadTarget::None => "none",
            UploadTarget::Directory { .. } => "directory",
            UploadTarget::Rclone { .. } => "rclone",
        }
    }
}

/// Dashboard and query API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            port: default_dashboard_port(),
            auth: None,
        }
    }
}

/// HTTP Basic Auth credentials; the password is stored as an argon2 PHC string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password_hash: String,
}

fn default_sensor_count() -> usize {
    4
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_w1_devices_dir() -> PathBuf {
    PathBuf::from("/sys/bus/w1/devices")
}

fn default_simulated_baseline() -> f64 {
    25.0
}

fn default_simulated_jitter() -> f64 {
    2.0
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_file_prefix() -> String {
    "temp_log".to_string()
}

fn default_retention() -> Duration {
    Duration::from_secs(90 * 24 * 60 * 60)
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_rclone_remote() -> String {
    "gdrive".to_string()
}

fn default_rclone_folder() -> String {
    "solar-monitor-data".to_string()
}

fn default_rclone_binary() -> String {
    "rclone".to_string()
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_dashboard_port() -> u16 {
    8080
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::SolarError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject values the poll loop and store cannot operate with
    pub fn validate(&self) -> crate::Result<()> {
        if self.sensors.poll_interval.is_zero() {
            return Err(crate::SolarError::Config(
                "sensors.poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.storage.file_prefix.is_empty() {
            return Err(crate::SolarError::Config(
                "storage.file_prefix must not be empty".to_string(),
            ));
        }
        if self.storage.file_prefix.contains(['/', '\\']) {
            return Err(crate::SolarError::Config(format!(
                "storage.file_prefix '{}' must not contain path separators",
                self.storage.file_prefix
            )));
        }
        Ok(())
    }
}
