//! BDD test world for the solar monitor

use std::path::PathBuf;

use cucumber::World;
use solar_monitor::poll::PollLoop;
use solar_monitor::registry::SensorRegistry;

#[derive(Debug, Default, World)]
pub struct MonitorWorld {
    pub scratch: Option<tempfile::TempDir>,

    // Log lifecycle
    pub registry: Option<SensorRegistry>,
    pub poll: Option<PollLoop>,

    // Query API
    pub response_status: Option<u16>,
    pub response_body: Option<serde_json::Value>,
}

impl MonitorWorld {
    pub fn data_dir(&self) -> PathBuf {
        self.scratch
            .as_ref()
            .expect("data directory not set")
            .path()
            .join("data")
    }
}
