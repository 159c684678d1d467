//! Poll loop: read sensors, append, rotate, until cancelled

use std::time::Duration;

use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;

use crate::reading::{local_now, Reading};
use crate::registry::SensorRegistry;
use crate::state::{current_epoch_ms, StatusHandle};
use crate::store::{LogStore, SealReport};

/// Consecutive failed reads before a sensor is reported
pub const FAILURE_WARN_THRESHOLD: u32 = 5;

/// Sole owner of the [`LogStore`] for its lifetime
#[derive(Debug)]
pub struct PollLoop {
    registry: SensorRegistry,
    store: LogStore,
    status: StatusHandle,
    interval: Duration,
    cancel: CancellationToken,
}

impl PollLoop {
    pub fn new(
        registry: SensorRegistry,
        store: LogStore,
        status: StatusHandle,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            store,
            status,
            interval,
            cancel,
        }
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// One cycle at `now`: rotation check, read every sensor, append.
    ///
    /// Every failure is logged and absorbed so the next cycle still runs.
    pub async fn cycle(&mut self, now: NaiveDateTime) -> Reading {
        match self.store.rotate_if_due(now).await {
            Ok(Some(report)) => self.record_seal(report).await,
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to open log segment: {}", e),
        }

        let reading = self.registry.read_all(now).await;
        tracing::info!("Readings - {}", self.describe(&reading));

        let write_failed = match self.store.append(&reading).await {
            Ok(()) => false,
            Err(e) => {
                tracing::error!("Failed to save reading: {}", e);
                true
            }
        };

        let mut status = self.status.write().await;
        for name in status.record_cycle(&reading, current_epoch_ms(), FAILURE_WARN_THRESHOLD) {
            tracing::warn!(
                "Sensor '{}' has {} consecutive failed reads",
                name,
                FAILURE_WARN_THRESHOLD
            );
        }
        if write_failed {
            status.write_failures += 1;
        }
        status.active_segment = self
            .store
            .active_segment()
            .and_then(|a| a.path.file_name())
            .map(|n| n.to_string_lossy().into_owned());
        drop(status);

        reading
    }

    /// Poll until cancelled, then seal the active segment
    pub async fn run(mut self) {
        tracing::info!(
            "Starting temperature monitoring of {} sensors every {}",
            self.registry.len(),
            humantime::format_duration(self.interval)
        );

        loop {
            self.cycle(local_now()).await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Poll loop cancelled");
                    break;
                }
            }
        }

        self.shutdown(local_now()).await;
        tracing::info!("Temperature monitoring stopped");
    }

    /// Final seal: upload and sweep the active segment
    pub async fn shutdown(&mut self, now: NaiveDateTime) {
        if let Some(report) = self.store.seal_active(now).await {
            self.record_seal(report).await;
        }
        self.status.write().await.active_segment = None;
    }

    async fn record_seal(&self, report: SealReport) {
        if report.sweep.failed > 0 {
            tracing::warn!(
                "{} expired segment(s) could not be deleted, retrying next sweep",
                report.sweep.failed
            );
        }
        let segment = report
            .sealed
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.status
            .write()
            .await
            .record_upload(segment, report.upload, current_epoch_ms());
    }

    fn describe(&self, reading: &Reading) -> String {
        self.registry
            .sensors()
            .iter()
            .map(|s| match reading.sensors.get(s.id()).copied().flatten() {
                Some(v) => format!("{}: {:.1}°C", s.id(), v),
                None => format!("{}: N/A", s.id()),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
