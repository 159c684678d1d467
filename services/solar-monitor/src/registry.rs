//! Sensor discovery and roster assembly

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::SensorsConfig;
use crate::reading::{Reading, SensorValues};
use crate::sensor::{Ds18b20Sensor, SensorKind, SensorSource, SimulatedSensor};

/// Names given to real sensors in discovery order
pub const PREFERRED_NAMES: [&str; 4] = ["inlet", "collector", "tank_bottom", "tank_top"];

/// DS18B20 family code prefix on the 1-wire bus
const DS18B20_FAMILY_PREFIX: &str = "28-";

/// Fixed roster of sensors polled every cycle
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    sensors: Vec<Arc<dyn SensorSource>>,
}

impl SensorRegistry {
    /// Build a roster of exactly `config.count` sensors.
    ///
    /// Real sensors found on the bus take the first slots; simulated sensors
    /// pad the remainder. Finding no hardware is a valid, fully simulated roster.
    pub fn discover(config: &SensorsConfig) -> Self {
        let device_paths = scan_w1_devices(&config.w1_devices_dir);
        tracing::info!(
            "Sensor scan found {} DS18B20 device(s) under {:?}",
            device_paths.len(),
            config.w1_devices_dir
        );
        Self::from_device_paths(config, device_paths)
    }

    /// Roster from an already enumerated list of device files
    pub fn from_device_paths(config: &SensorsConfig, device_paths: Vec<PathBuf>) -> Self {
        let mut sensors: Vec<Arc<dyn SensorSource>> = Vec::with_capacity(config.count);

        for (i, path) in device_paths.into_iter().take(config.count).enumerate() {
            let name = real_sensor_name(i);
            tracing::info!("Initialized real sensor: {} at {:?}", name, path);
            sensors.push(Arc::new(Ds18b20Sensor::new(name, path)));
        }

        let real = sensors.len();
        for i in 0..config.count - real {
            let name = format!("simulated{}", i + 1);
            tracing::info!("Initialized simulated sensor: {}", name);
            sensors.push(Arc::new(SimulatedSensor::new(
                name,
                config.simulated_baseline,
                config.simulated_jitter,
            )));
        }

        tracing::info!(
            "Sensor initialization complete: {} real, {} simulated",
            real,
            config.count - real
        );
        Self { sensors }
    }

    /// Roster from explicit sources, in the given order
    pub fn from_sources(sensors: Vec<Arc<dyn SensorSource>>) -> Self {
        Self { sensors }
    }

    pub fn sensors(&self) -> &[Arc<dyn SensorSource>] {
        &self.sensors
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Roster as (name, kind) pairs
    pub fn roster(&self) -> Vec<(String, SensorKind)> {
        self.sensors
            .iter()
            .map(|s| (s.id().to_string(), s.kind()))
            .collect()
    }

    /// Poll every sensor once. A failing sensor contributes an absent value.
    pub async fn read_all(&self, at: NaiveDateTime) -> Reading {
        let mut values = SensorValues::with_capacity(self.sensors.len());
        for sensor in &self.sensors {
            let value = match sensor.get_temperature().await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            };
            values.insert(sensor.id().to_string(), value);
        }
        Reading::new(at, values)
    }
}

fn real_sensor_name(index: usize) -> String {
    PREFERRED_NAMES
        .get(index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("sensor_{}", index + 1))
}

/// Enumerate `28-*/w1_slave` device files, sorted by device id
pub fn scan_w1_devices(base_dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::info!("1-wire interface not available at {:?}: {}", base_dir, e);
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(DS18B20_FAMILY_PREFIX)
        })
        .map(|entry| entry.path().join("w1_slave"))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    for path in &paths {
        tracing::debug!("Found DS18B20 device file {:?}", path);
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::MockSensorSource;
    use crate::segment;
    use chrono::NaiveDate;

    fn config(count: usize, dir: &Path) -> SensorsConfig {
        SensorsConfig {
            count,
            w1_devices_dir: dir.to_path_buf(),
            simulated_jitter: 0.0,
            ..SensorsConfig::default()
        }
    }

    fn add_device(dir: &Path, id: &str, millidegrees: i32) {
        let device = dir.join(id);
        std::fs::create_dir_all(&device).unwrap();
        std::fs::write(
            device.join("w1_slave"),
            format!("aa bb : crc=cc YES\naa bb t={}\n", millidegrees),
        )
        .unwrap();
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn no_hardware_gives_fully_simulated_roster() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SensorRegistry::discover(&config(4, &dir.path().join("missing")));

        let roster = registry.roster();
        assert_eq!(roster.len(), 4);
        assert_eq!(roster[0], ("simulated1".to_string(), SensorKind::Simulated));
        assert_eq!(roster[3], ("simulated4".to_string(), SensorKind::Simulated));
    }

    #[test]
    fn real_sensors_fill_first_slots_in_preferred_order() {
        let dir = tempfile::tempdir().unwrap();
        add_device(dir.path(), "28-000000000002", 30000);
        add_device(dir.path(), "28-000000000001", 20000);
        // Not a DS18B20 family device
        add_device(dir.path(), "10-000000000003", 10000);

        let registry = SensorRegistry::discover(&config(4, dir.path()));
        let roster = registry.roster();

        assert_eq!(
            roster,
            vec![
                ("inlet".to_string(), SensorKind::Real),
                ("collector".to_string(), SensorKind::Real),
                ("simulated1".to_string(), SensorKind::Simulated),
                ("simulated2".to_string(), SensorKind::Simulated),
            ]
        );
    }

    #[test]
    fn extra_real_sensors_are_truncated_to_count() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            add_device(dir.path(), &format!("28-00000000000{i}"), 20000);
        }

        let registry = SensorRegistry::discover(&config(2, dir.path()));
        assert_eq!(registry.len(), 2);
        assert!(registry
            .roster()
            .iter()
            .all(|(_, kind)| *kind == SensorKind::Real));
    }

    #[test]
    fn real_sensors_beyond_preferred_names_are_numbered() {
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| PathBuf::from(format!("/dev/null/28-{i}/w1_slave")))
            .collect();
        let registry = SensorRegistry::from_device_paths(&config(6, Path::new("/")), paths);
        let names: Vec<String> = registry.roster().into_iter().map(|(n, _)| n).collect();

        assert_eq!(
            names,
            vec![
                "inlet",
                "collector",
                "tank_bottom",
                "tank_top",
                "sensor_5",
                "sensor_6"
            ]
        );
    }

    #[tokio::test]
    async fn read_all_reads_real_and_simulated() {
        let dir = tempfile::tempdir().unwrap();
        add_device(dir.path(), "28-000000000001", 41500);

        let registry = SensorRegistry::discover(&config(2, dir.path()));
        let reading = registry.read_all(noon()).await;

        assert_eq!(reading.timestamp, "2024-06-01T12:00:00.000000");
        assert_eq!(reading.sensors.len(), 2);
        assert_eq!(reading.sensors["inlet"], Some(41.5));
        assert_eq!(reading.sensors["simulated1"], Some(25.0));
    }

    #[tokio::test]
    async fn readings_keep_roster_order() {
        let dir = tempfile::tempdir().unwrap();
        for (i, millis) in [10000, 20000, 30000, 40000].into_iter().enumerate() {
            add_device(dir.path(), &format!("28-00000000000{}", i + 1), millis);
        }

        let registry = SensorRegistry::discover(&config(4, dir.path()));
        let reading = registry.read_all(noon()).await;

        let names: Vec<&str> = reading.sensors.keys().map(String::as_str).collect();
        assert_eq!(names, ["inlet", "collector", "tank_bottom", "tank_top"]);
        assert!(segment::encode_line(&reading).unwrap().contains(
            r#""sensors":{"inlet":10.0,"collector":20.0,"tank_bottom":30.0,"tank_top":40.0}"#
        ));
    }

    #[tokio::test]
    async fn failing_sensor_yields_absent_value() {
        let mut failing = MockSensorSource::new();
        failing.expect_id().return_const("tank_top".to_string());
        failing.expect_get_temperature().returning(|| {
            Box::pin(async {
                Err(crate::SolarError::SensorRead {
                    sensor: "tank_top".to_string(),
                    reason: "CRC check failed".to_string(),
                })
            })
        });

        let registry = SensorRegistry::from_sources(vec![
            Arc::new(SimulatedSensor::new("inlet", 20.0, 0.0)),
            Arc::new(failing),
        ]);
        let reading = registry.read_all(noon()).await;

        assert_eq!(reading.sensors["inlet"], Some(20.0));
        assert_eq!(reading.sensors["tank_top"], None);
        assert!(reading.sensors.contains_key("tank_top"));
    }
}
