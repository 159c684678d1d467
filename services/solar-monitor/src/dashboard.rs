//! Web dashboard and JSON query API

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{require_basic_auth, CredentialCheck};
use crate::reader::{summarize_readings, DataReader, Period, SensorSummary};
use crate::reading::Reading;
use crate::state::StatusHandle;
use crate::SolarError;

pub const AUTH_REALM: &str = "solar-monitor";

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub reader: DataReader,
    pub status: StatusHandle,
}

/// Errors surfaced to HTTP clients as `{"error": ...}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid period")]
    InvalidPeriod(String),

    #[error("No data available")]
    NoData,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Internal server error")]
    Internal(String),
}

impl From<SolarError> for ApiError {
    fn from(err: SolarError) -> Self {
        match err {
            SolarError::InvalidPeriod(period) => ApiError::InvalidPeriod(period),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidPeriod(period) => {
                tracing::debug!("Rejected period '{}'", period);
                StatusCode::BAD_REQUEST
            }
            ApiError::NoData => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(message) => {
                tracing::error!("Request failed: {}", message);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));

        if matches!(self, ApiError::Unauthorized) {
            let challenge = format!("Basic realm=\"{}\"", AUTH_REALM);
            return (status, [(header::WWW_AUTHENTICATE, challenge)], body).into_response();
        }
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub period: Period,
    pub data: Vec<Reading>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub period: Period,
    pub summary: BTreeMap<String, SensorSummary>,
    pub data_points: usize,
}

/// Build the dashboard router.
///
/// With `auth` set, every route except `/health` requires Basic Auth.
pub fn build_router(state: DashboardState, auth: Option<Arc<dyn CredentialCheck>>) -> Router {
    let protected = Router::new()
        .route("/", get(index_handler))
        .route("/api/current", get(current_handler))
        .route("/api/data/{period}", get(history_handler))
        .route("/api/summary/{period}", get(summary_handler))
        .route("/api/status", get(status_handler))
        .with_state(state);

    let protected = match auth {
        Some(check) => {
            protected.route_layer(middleware::from_fn_with_state(check, require_basic_auth))
        }
        None => protected,
    };

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve `router` until `cancel` fires
pub async fn serve(addr: &str, router: Router, cancel: CancellationToken) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SolarError::Dashboard(format!("failed to bind {}: {}", addr, e)))?;
    tracing::info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| SolarError::Dashboard(format!("server error: {}", e)))
}

async fn current_handler(
    State(dashboard): State<DashboardState>,
) -> Result<Json<Reading>, ApiError> {
    dashboard
        .reader
        .latest_reading()
        .await
        .map(Json)
        .ok_or(ApiError::NoData)
}

async fn history_handler(
    State(dashboard): State<DashboardState>,
    Path(period): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let period: Period = period.parse()?;
    let data = dashboard.reader.readings_since(period.duration()).await;
    Ok(Json(HistoryResponse {
        period,
        count: data.len(),
        data,
    }))
}

async fn summary_handler(
    State(dashboard): State<DashboardState>,
    Path(period): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let period: Period = period.parse()?;
    let data = dashboard.reader.readings_since(period.duration()).await;
    if data.is_empty() {
        return Err(ApiError::NoData);
    }
    Ok(Json(SummaryResponse {
        period,
        summary: summarize_readings(&data),
        data_points: data.len(),
    }))
}

async fn status_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let status = dashboard.status.read().await;

    Json(serde_json::json!({
        "sensors": status.sensors,
        "active_segment": status.active_segment,
        "last_poll_epoch_ms": status.last_poll_epoch_ms,
        "cycles": status.cycles,
        "write_failures": status.write_failures,
        "last_upload": status.last_upload,
        "uptime_secs": status.started_at.elapsed().as_secs(),
    }))
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let status = dashboard.status.read().await;

    let sensor_rows: String = status
        .sensors
        .iter()
        .map(|s| {
            let value = s
                .last_value
                .map(|v| format!("{:.1}&deg;C", v))
                .unwrap_or_else(|| "N/A".to_string());
            format!(
                r#"<tr><td>{}</td><td>{}</td><td id="current-{}">{}</td><td>{}</td></tr>"#,
                s.name, s.kind, s.name, value, s.consecutive_failures
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Solar Monitor</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem; }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 0.5rem; text-align: left; border-bottom: 1px solid #dee2e6; }}
    </style>
    <script>
        function fmt(v) {{ return v === null || v === undefined ? 'N/A' : v.toFixed(1) + '°C'; }}
        function refreshData() {{
            const period = document.getElementById('period').value;
            fetch('/api/current')
                .then(r => r.ok ? r.json() : null)
                .then(data => {{
                    document.getElementById('updated').textContent = data ? data.timestamp : 'No data';
                    if (!data) return;
                    for (const [name, value] of Object.entries(data.sensors)) {{
                        const cell = document.getElementById('current-' + name);
                        if (cell) cell.textContent = fmt(value);
                    }}
                }});
            fetch('/api/summary/' + period)
                .then(r => r.ok ? r.json() : {{ summary: {{}}, data_points: 0 }})
                .then(data => {{
                    document.getElementById('data-points').textContent = data.data_points;
                    document.getElementById('summary-body').innerHTML = Object.entries(data.summary)
                        .map(([name, s]) => `<tr><td>${{name}}</td><td>${{fmt(s.min)}}</td><td>${{fmt(s.max)}}</td><td>${{fmt(s.avg)}}</td><td>${{fmt(s.current)}}</td></tr>`)
                        .join('');
                }});
        }}
        setInterval(refreshData, 5000);
        window.addEventListener('load', refreshData);
    </script>
</head>
<body>
    <h1>Solar Monitor</h1>
    <p>Last reading: <span id="updated">-</span></p>
    <section>
        <h2>Sensors</h2>
        <table>
            <thead><tr><th>Name</th><th>Kind</th><th>Current</th><th>Failed Reads</th></tr></thead>
            <tbody>{sensor_rows}</tbody>
        </table>
    </section>
    <section>
        <h2>Summary</h2>
        <select id="period" onchange="refreshData()">
            <option value="24h">24 hours</option>
            <option value="48h">48 hours</option>
            <option value="1w">1 week</option>
        </select>
        <span><span id="data-points">0</span> data points</span>
        <table>
            <thead><tr><th>Sensor</th><th>Min</th><th>Max</th><th>Avg</th><th>Current</th></tr></thead>
            <tbody id="summary-body"></tbody>
        </table>
    </section>
</body>
</html>"#,
        sensor_rows = sensor_rows,
    );

    Html(html)
}
