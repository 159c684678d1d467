//! Solar monitor - temperature logger for a solar water heater
//!
//! Polls temperature sensors, appends readings to hourly segment files,
//! uploads sealed segments, prunes old ones, and serves the history over HTTP.

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod migrate;
pub mod poll;
pub mod reader;
pub mod reading;
pub mod registry;
pub mod segment;
pub mod sensor;
pub mod state;
pub mod store;
pub mod upload;

pub use config::{load_config, Config};
pub use error::{Result, SolarError};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::{Argon2Credentials, CredentialCheck};
use crate::dashboard::DashboardState;
use crate::poll::PollLoop;
use crate::reader::DataReader;
use crate::registry::SensorRegistry;
use crate::store::LogStore;
use crate::upload::build_uploader;

/// Run the monitor until Ctrl-C, then seal the active segment and return
pub async fn run(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let registry = SensorRegistry::discover(&config.sensors);

    let mut store = LogStore::new(&config.storage)?;
    match build_uploader(&config.upload.target) {
        Some(uploader) => {
            tracing::info!("Uploading sealed segments via {}", uploader.type_name());
            store = store.with_uploader(uploader, config.upload.timeout);
        }
        None => tracing::info!("Uploads disabled, segments are kept locally only"),
    }

    let auth: Option<Arc<dyn CredentialCheck>> = match &config.dashboard.auth {
        Some(auth_config) => Some(Arc::new(Argon2Credentials::from_config(auth_config)?)),
        None => None,
    };

    let status = state::new_status_handle(registry.roster());

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    // Start dashboard if enabled
    let dashboard_handle = if config.dashboard.enabled {
        let addr = format!("{}:{}", config.dashboard.bind_address, config.dashboard.port);
        let dashboard_state = DashboardState {
            reader: DataReader::from_config(&config.storage),
            status: Arc::clone(&status),
        };
        let cancel_for_dashboard = cancel.clone();

        Some(tokio::spawn(async move {
            let router = dashboard::build_router(dashboard_state, auth);
            match dashboard::serve(&addr, router, cancel_for_dashboard).await {
                Ok(()) => tracing::debug!("Dashboard stopped"),
                Err(e) => tracing::error!("{}. Continuing without dashboard.", e),
            }
        }))
    } else {
        None
    };

    // Blocks until cancelled, then performs the final seal
    PollLoop::new(
        registry,
        store,
        status,
        config.sensors.poll_interval,
        cancel.clone(),
    )
    .run()
    .await;

    if let Some(handle) = dashboard_handle {
        let _ = handle.await;
    }
    Ok(())
}
