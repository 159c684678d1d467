//! One-shot conversion of legacy array segments to the line format

use std::path::{Path, PathBuf};

use crate::segment::{self, SegmentDescriptor, SegmentFormat, LINES_EXTENSION};
use crate::SolarError;

/// Originals are moved here after conversion
pub const BACKUP_DIR_NAME: &str = "backup_json_files";

#[derive(Debug, Default)]
pub struct MigrationReport {
    /// New `.jsonl` files
    pub migrated: Vec<PathBuf>,
    /// Sources left alone because their `.jsonl` already exists
    pub skipped: Vec<PathBuf>,
    /// Sources left alone because they could not be fully converted
    pub failed: Vec<(PathBuf, String)>,
    pub backup_dir: PathBuf,
}

/// Convert every `<prefix>_*.json` array file in `data_dir`.
///
/// Each converted original is moved into [`BACKUP_DIR_NAME`]. A file with
/// any unreadable element is not converted, so no reading is dropped.
pub async fn migrate_legacy_segments(data_dir: &Path, prefix: &str) -> crate::Result<MigrationReport> {
    let backup_dir = data_dir.join(BACKUP_DIR_NAME);
    let mut report = MigrationReport {
        backup_dir: backup_dir.clone(),
        ..MigrationReport::default()
    };

    let mut sources = Vec::new();
    let mut entries = tokio::fs::read_dir(data_dir).await.map_err(|e| {
        SolarError::Config(format!("Data directory {:?} is not readable: {}", data_dir, e))
    })?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(descriptor) = SegmentDescriptor::from_path(&path, prefix) {
            if descriptor.format == SegmentFormat::LegacyArray && path.is_file() {
                sources.push(descriptor);
            }
        }
    }
    sources.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    if sources.is_empty() {
        tracing::info!("No legacy JSON data files found to migrate");
        return Ok(report);
    }
    tracing::info!("Found {} legacy JSON files to migrate", sources.len());
    tokio::fs::create_dir_all(&backup_dir).await?;

    for source in sources {
        let target = source.path.with_extension(LINES_EXTENSION);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            tracing::warn!(
                "Skipping {}: {:?} already exists",
                source.file_name,
                target
            );
            report.skipped.push(source.path);
            continue;
        }

        match convert(&source.path, &target).await {
            Ok(count) => {
                let backup = backup_dir.join(&source.file_name);
                tokio::fs::rename(&source.path, &backup).await?;
                tracing::info!(
                    "Migrated {} ({} readings), original moved to {:?}",
                    source.file_name,
                    count,
                    backup
                );
                report.migrated.push(target);
            }
            Err(reason) => {
                tracing::error!("Error migrating {}: {}", source.file_name, reason);
                report.failed.push((source.path, reason));
            }
        }
    }

    Ok(report)
}

/// Write `source`'s readings to `target` one per line, via a temporary file
async fn convert(source: &Path, target: &Path) -> Result<usize, String> {
    let content = tokio::fs::read_to_string(source)
        .await
        .map_err(|e| e.to_string())?;
    let decoded = segment::decode(&content);
    if let Some(first) = decoded.errors.first() {
        return Err(format!("{} unreadable element(s), first: {}", decoded.errors.len(), first));
    }

    let mut lines = String::new();
    for reading in &decoded.readings {
        lines.push_str(&segment::encode_line(reading).map_err(|e| e.to_string())?);
    }

    let partial = target.with_extension("jsonl.partial");
    tokio::fs::write(&partial, lines)
        .await
        .map_err(|e| e.to_string())?;
    tokio::fs::rename(&partial, target)
        .await
        .map_err(|e| e.to_string())?;
    Ok(decoded.readings.len())
}
