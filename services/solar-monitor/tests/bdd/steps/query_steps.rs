//! BDD step definitions for the query API

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::Request;
use chrono::TimeDelta;
use cucumber::{given, then, when};
use tower::ServiceExt;

use solar_monitor::dashboard::{build_router, DashboardState};
use solar_monitor::reader::DataReader;
use solar_monitor::reading::{local_now, Reading, SensorValues};
use solar_monitor::segment;
use solar_monitor::state::new_status_handle;

use crate::world::MonitorWorld;

#[given(expr = "recent readings for sensor {string}: {string}")]
fn recent_readings(world: &mut MonitorWorld, sensor: String, values: String) {
    let values: Vec<f64> = values
        .split(',')
        .map(|v| v.trim().parse().expect("numeric value"))
        .collect();
    let start = local_now() - TimeDelta::minutes(values.len() as i64 + 1);

    let mut by_segment: BTreeMap<String, String> = BTreeMap::new();
    for (i, value) in values.iter().enumerate() {
        let at = start + TimeDelta::minutes(i as i64);
        let mut sensors = SensorValues::new();
        sensors.insert(sensor.clone(), Some(*value));
        let name = segment::segment_file_name("temp_log", segment::truncate_to_hour(at));
        by_segment
            .entry(name)
            .or_default()
            .push_str(&segment::encode_line(&Reading::new(at, sensors)).expect("encode"));
    }
    for (name, content) in by_segment {
        std::fs::write(world.data_dir().join(name), content).expect("write segment");
    }
}

#[when(expr = "I request {string}")]
async fn request(world: &mut MonitorWorld, uri: String) {
    let state = DashboardState {
        reader: DataReader::new(world.data_dir(), "temp_log"),
        status: new_status_handle(Vec::new()),
    };
    let response = build_router(state, None)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    world.response_status = Some(response.status().as_u16());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    world.response_body = serde_json::from_slice(&body).ok();
}

#[then(expr = "the response status is {int}")]
fn response_status(world: &mut MonitorWorld, expected: u16) {
    assert_eq!(world.response_status, Some(expected));
}

#[then(expr = "the response field {string} equals {int}")]
fn response_field_number(world: &mut MonitorWorld, field: String, expected: i64) {
    let body = world.response_body.as_ref().expect("no JSON body");
    assert_eq!(body[&field], serde_json::json!(expected));
}

#[then(expr = "the response field {string} is the text {string}")]
fn response_field_text(world: &mut MonitorWorld, field: String, expected: String) {
    let body = world.response_body.as_ref().expect("no JSON body");
    assert_eq!(body[&field], serde_json::json!(expected));
}

#[then(expr = "the response data is empty")]
fn response_data_empty(world: &mut MonitorWorld) {
    let body = world.response_body.as_ref().expect("no JSON body");
    assert_eq!(body["data"], serde_json::json!([]));
}

#[then(expr = "the response error is {string}")]
fn response_error(world: &mut MonitorWorld, expected: String) {
    let body = world.response_body.as_ref().expect("no JSON body");
    assert_eq!(body["error"], serde_json::json!(expected));
}

#[then(expr = "the summary for {string} has min {float}, max {float} and avg {float}")]
fn summary_values(world: &mut MonitorWorld, sensor: String, min: f64, max: f64, avg: f64) {
    let body = world.response_body.as_ref().expect("no JSON body");
    let summary = &body["summary"][&sensor];
    assert_eq!(summary["min"].as_f64(), Some(min));
    assert_eq!(summary["max"].as_f64(), Some(max));
    let got = summary["avg"].as_f64().expect("avg");
    assert!((got - avg).abs() < 1e-9, "avg {} != {}", got, avg);
}
