//! Append-only hourly log store with rotation, upload hand-off, and retention

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::reading::{local_now, window_start, Reading};
use crate::segment::{self, SegmentDescriptor};
use crate::upload::UploadSink;
use crate::SolarError;

/// The segment currently open for appends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSegment {
    pub path: PathBuf,
    pub start_hour: NaiveDateTime,
}

/// What happened to a sealed segment's upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Disabled,
    Uploaded { remote: String },
    Failed { error: String },
}

/// Result of a retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<PathBuf>,
    /// Deletions that failed; those files are retried on the next sweep
    pub failed: usize,
    /// Segment-like names whose hour stamp could not be parsed
    pub skipped: usize,
}

/// Result of sealing the active segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealReport {
    pub sealed: PathBuf,
    pub upload: UploadOutcome,
    pub sweep: SweepReport,
}

/// Owns the active segment. There is exactly one writer per data directory.
#[derive(Debug)]
pub struct LogStore {
    data_dir: PathBuf,
    prefix: String,
    retention: Duration,
    sync_writes: bool,
    /// Upload target and the time allowed per upload
    uploader: Option<(Arc<dyn UploadSink>, Duration)>,
    active: Option<ActiveSegment>,
}

impl LogStore {
    /// Create the store, creating the data directory if needed.
    ///
    /// Failing to create the data directory is the one unrecoverable startup error.
    pub fn new(config: &StorageConfig) -> crate::Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            SolarError::Config(format!(
                "Failed to create data directory {:?}: {}",
                config.data_dir, e
            ))
        })?;

        Ok(Self {
            data_dir: config.data_dir.clone(),
            prefix: config.file_prefix.clone(),
            retention: config.retention,
            sync_writes: config.sync_writes,
            uploader: None,
            active: None,
        })
    }

    /// Hand every sealed segment to `uploader`, giving up after `timeout`
    pub fn with_uploader(mut self, uploader: Arc<dyn UploadSink>, timeout: Duration) -> Self {
        self.uploader = Some((uploader, timeout));
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn active_segment(&self) -> Option<&ActiveSegment> {
        self.active.as_ref()
    }

    /// Append one reading as a single line and flush it before returning.
    ///
    /// Without an active segment, the segment for the reading's own hour is opened.
    pub async fn append(&mut self, reading: &Reading) -> crate::Result<()> {
        let path = match &self.active {
            Some(active) => active.path.clone(),
            None => {
                let at = reading.time().unwrap_or_else(local_now);
                self.open_segment(segment::truncate_to_hour(at)).await?;
                self.segment_path(segment::truncate_to_hour(at))
            }
        };

        let line = segment::encode_line(reading)?;
        let write_err = |source| SolarError::SegmentWrite {
            path: path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        file.write_all(line.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        if self.sync_writes {
            file.sync_data().await.map_err(write_err)?;
        }
        Ok(())
    }

    /// Rotate when `now` falls in a different hour than the active segment.
    ///
    /// The first call only opens a segment. Later calls that cross an hour
    /// boundary seal the current segment (upload, then retention sweep) and
    /// open the segment for `now`'s hour. Returns the seal report when a
    /// segment was sealed.
    pub async fn rotate_if_due(&mut self, now: NaiveDateTime) -> crate::Result<Option<SealReport>> {
        let hour = segment::truncate_to_hour(now);
        match &self.active {
            Some(active) if active.start_hour == hour => Ok(None),
            Some(_) => {
                let report = self.seal_active(now).await;
                self.open_segment(hour).await?;
                Ok(report)
            }
            None => {
                self.open_segment(hour).await?;
                Ok(None)
            }
        }
    }

    /// Seal the active segment: best-effort upload, then a retention sweep.
    ///
    /// Leaves the store without an active segment. Returns `None` if nothing was open.
    pub async fn seal_active(&mut self, now: NaiveDateTime) -> Option<SealReport> {
        let active = self.active.take()?;
        tracing::info!("Closing log file: {:?}", active.path);

        let upload = if tokio::fs::try_exists(&active.path).await.unwrap_or(false) {
            self.upload(&active.path).await
        } else {
            tracing::warn!("Sealed segment {:?} does not exist on disk", active.path);
            UploadOutcome::Failed {
                error: "segment file missing".to_string(),
            }
        };

        let sweep = self.sweep_retention(now).await;
        Some(SealReport {
            sealed: active.path,
            upload,
            sweep,
        })
    }

    async fn upload(&self, path: &Path) -> UploadOutcome {
        let Some((uploader, timeout)) = &self.uploader else {
            tracing::debug!("Uploads disabled, keeping {:?} locally only", path);
            return UploadOutcome::Disabled;
        };

        match tokio::time::timeout(*timeout, uploader.upload(path)).await {
            Ok(Ok(remote)) => {
                tracing::info!(
                    "Uploaded {:?} via {} ({})",
                    path,
                    uploader.type_name(),
                    remote
                );
                UploadOutcome::Uploaded { remote }
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to upload {:?}: {}", path, e);
                UploadOutcome::Failed {
                    error: e.to_string(),
                }
            }
            Err(_) => {
                let error = format!(
                    "upload timed out after {}",
                    humantime::format_duration(*timeout)
                );
                tracing::error!("Failed to upload {:?}: {}", path, error);
                UploadOutcome::Failed { error }
            }
        }
    }

    /// Delete segments whose embedded date, taken as midnight, is before `now - retention`.
    ///
    /// Per-file failures are logged and counted; the sweep always runs to the
    /// end. The active segment is never deleted.
    pub async fn sweep_retention(&self, now: NaiveDateTime) -> SweepReport {
        let cutoff = window_start(now, self.retention);
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Error during file cleanup of {:?}: {}", self.data_dir, e);
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error listing {:?}: {}", self.data_dir, e);
                    break;
                }
            };

            let path = entry.path();
            let Some(descriptor) = SegmentDescriptor::from_path(&path, &self.prefix) else {
                continue;
            };
            if self.active.as_ref().is_some_and(|a| a.path == path) {
                continue;
            }

            let Some(date) = segment::embedded_date(&descriptor.file_name, &self.prefix) else {
                tracing::warn!(
                    "Skipping {} during cleanup: no valid date in file name",
                    descriptor.file_name
                );
                report.skipped += 1;
                continue;
            };
            if date.and_time(NaiveTime::MIN) >= cutoff {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!("Deleted old data file: {}", descriptor.file_name);
                    report.deleted.push(path);
                }
                Err(source) => {
                    let err = SolarError::RetentionDelete { path, source };
                    tracing::warn!("{}", err);
                    report.failed += 1;
                }
            }
        }

        if !report.deleted.is_empty() {
            tracing::info!(
                "Cleanup completed: removed {} files older than {}",
                report.deleted.len(),
                humantime::format_duration(self.retention)
            );
        }
        report
    }

    fn segment_path(&self, hour: NaiveDateTime) -> PathBuf {
        self.data_dir
            .join(segment::segment_file_name(&self.prefix, hour))
    }

    /// Make the segment for `hour` active, creating it empty if absent.
    /// An existing file (restart within the same hour) is kept as is.
    async fn open_segment(&mut self, hour: NaiveDateTime) -> crate::Result<()> {
        let path = self.segment_path(hour);
        self.active = Some(ActiveSegment {
            path: path.clone(),
            start_hour: hour,
        });

        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| SolarError::SegmentWrite {
                path: path.clone(),
                source,
            })?;

        tracing::info!("Created new log file: {:?}", path);
        Ok(())
    }
}
