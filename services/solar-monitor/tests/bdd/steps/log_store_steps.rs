//! BDD step definitions for the segment log lifecycle

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use cucumber::{given, then, when};
use tokio_util::sync::CancellationToken;

use solar_monitor::config::StorageConfig;
use solar_monitor::poll::PollLoop;
use solar_monitor::reading::{parse_timestamp, Reading};
use solar_monitor::registry::SensorRegistry;
use solar_monitor::segment;
use solar_monitor::sensor::{SensorSource, SimulatedSensor};
use solar_monitor::state::new_status_handle;
use solar_monitor::store::LogStore;

use crate::world::MonitorWorld;

fn parse_time(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap_or_else(|| panic!("bad time: {}", s))
}

#[given("an empty data directory")]
fn empty_data_directory(world: &mut MonitorWorld) {
    let scratch = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(scratch.path().join("data")).expect("create data dir");
    world.scratch = Some(scratch);
}

#[given(expr = "a roster of {int} simulated sensors")]
fn simulated_roster(world: &mut MonitorWorld, count: usize) {
    let sensors: Vec<Arc<dyn SensorSource>> = (0..count)
        .map(|i| {
            Arc::new(SimulatedSensor::new(format!("simulated{}", i + 1), 25.0, 2.0))
                as Arc<dyn SensorSource>
        })
        .collect();
    world.registry = Some(SensorRegistry::from_sources(sensors));
}

#[given(expr = "a stored segment {string}")]
fn stored_segment(world: &mut MonitorWorld, name: String) {
    std::fs::write(world.data_dir().join(name), "").expect("write segment");
}

#[given(expr = "segment {string} already holds {int} readings")]
fn segment_with_readings(world: &mut MonitorWorld, name: String, count: usize) {
    let content: String = (0..count)
        .map(|i| {
            let at = parse_time("2024-06-01T12:00:00") + TimeDelta::seconds(i as i64);
            segment::encode_line(&Reading::new(at, Default::default())).expect("encode")
        })
        .collect();
    std::fs::write(world.data_dir().join(name), content).expect("write segment");
}

#[when(expr = "the poll loop runs {int} cycle(s) {int} seconds apart starting at {string}")]
async fn run_cycles(world: &mut MonitorWorld, cycles: usize, spacing: i64, start: String) {
    let registry = world.registry.take().expect("roster not set");
    let store = LogStore::new(&StorageConfig {
        data_dir: world.data_dir(),
        ..StorageConfig::default()
    })
    .expect("open store");
    let status = new_status_handle(registry.roster());
    let mut poll = PollLoop::new(
        registry,
        store,
        status,
        Duration::from_secs(spacing as u64),
        CancellationToken::new(),
    );

    let start = parse_time(&start);
    for i in 0..cycles {
        poll.cycle(start + TimeDelta::seconds(spacing * i as i64)).await;
    }
    world.poll = Some(poll);
}

#[then(expr = "the data directory holds {int} segment file(s)")]
fn segment_count(world: &mut MonitorWorld, expected: usize) {
    let count = std::fs::read_dir(world.data_dir())
        .expect("read data dir")
        .filter_map(|e| e.ok())
        .filter(|e| segment::SegmentDescriptor::from_path(&e.path(), "temp_log").is_some())
        .count();
    assert_eq!(count, expected);
}

#[then(expr = "segment {string} has {int} line(s)")]
fn segment_line_count(world: &mut MonitorWorld, name: String, expected: usize) {
    let content = std::fs::read_to_string(world.data_dir().join(name)).expect("read segment");
    assert_eq!(content.lines().count(), expected);
}

#[then(expr = "every line of segment {string} has {int} sensor values")]
fn every_line_has_sensors(world: &mut MonitorWorld, name: String, expected: usize) {
    let content = std::fs::read_to_string(world.data_dir().join(name)).expect("read segment");
    for line in content.lines() {
        let value: serde_json::Value = serde_json::from_str(line).expect("line is valid JSON");
        let sensors = value["sensors"].as_object().expect("sensors map");
        assert_eq!(sensors.len(), expected);
    }
}

#[then(expr = "segment {string} exists")]
fn segment_exists(world: &mut MonitorWorld, name: String) {
    assert!(world.data_dir().join(name).exists());
}

#[then(expr = "segment {string} does not exist")]
fn segment_absent(world: &mut MonitorWorld, name: String) {
    assert!(!world.data_dir().join(name).exists());
}

#[then(expr = "the active segment is {string}")]
fn active_segment(world: &mut MonitorWorld, name: String) {
    let poll = world.poll.as_ref().expect("poll loop not run");
    let active = poll.store().active_segment().expect("no active segment");
    assert!(active.path.ends_with(&name), "{:?}", active.path);
}
