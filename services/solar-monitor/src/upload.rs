//! Remote copies of sealed segments

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::config::UploadTarget;
use crate::SolarError;

/// A file present at the upload destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub size: u64,
}

/// Destination for sealed, fully written segment files
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UploadSink: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    /// Copy `local_path` to the destination, returning its remote identifier
    async fn upload(&self, local_path: &Path) -> crate::Result<String>;

    /// Files currently at the destination
    async fn list(&self) -> crate::Result<Vec<RemoteFile>>;
}

/// Build the configured sink; `None` when uploads are disabled
pub fn build_uploader(target: &UploadTarget) -> Option<Arc<dyn UploadSink>> {
    match target {
        UploadTarget::None => None,
        UploadTarget::Directory { path } => Some(Arc::new(DirectoryUploader::new(path.clone()))),
        UploadTarget::Rclone {
            remote,
            folder,
            binary,
        } => Some(Arc::new(RcloneUploader::new(
            binary.clone(),
            remote.clone(),
            folder.clone(),
        ))),
    }
}

fn file_name_of(local_path: &Path) -> crate::Result<String> {
    local_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| SolarError::Upload(format!("{:?} has no file name", local_path)))
}

/// Copies segments into a local or mounted directory
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    destination: PathBuf,
}

impl DirectoryUploader {
    pub fn new(destination: PathBuf) -> Self {
        tracing::debug!("Created DirectoryUploader for {:?}", destination);
        Self { destination }
    }
}

#[async_trait]
impl UploadSink for DirectoryUploader {
    fn type_name(&self) -> &str {
        "directory"
    }

    async fn upload(&self, local_path: &Path) -> crate::Result<String> {
        let name = file_name_of(local_path)?;
        tokio::fs::create_dir_all(&self.destination)
            .await
            .map_err(|e| {
                SolarError::Upload(format!("creating {:?}: {}", self.destination, e))
            })?;

        let target = self.destination.join(&name);
        let bytes = tokio::fs::copy(local_path, &target).await.map_err(|e| {
            SolarError::Upload(format!("copying {:?} to {:?}: {}", local_path, target, e))
        })?;

        tracing::debug!("Copied {} bytes to {:?}", bytes, target);
        Ok(target.to_string_lossy().into_owned())
    }

    async fn list(&self) -> crate::Result<Vec<RemoteFile>> {
        let mut entries = match tokio::fs::read_dir(&self.destination).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SolarError::Upload(format!(
                    "listing {:?}: {}",
                    self.destination, e
                )))
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                files.push(RemoteFile {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: metadata.len(),
                });
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

/// Copies segments to any rclone remote (Google Drive, S3, WebDAV, ...)
#[derive(Debug, Clone)]
pub struct RcloneUploader {
    binary: String,
    remote: String,
    folder: String,
}

/// One entry of `rclone lsjson` output
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsJsonEntry {
    name: String,
    size: i64,
    #[serde(default)]
    is_dir: bool,
}

impl RcloneUploader {
    pub fn new(binary: String, remote: String, folder: String) -> Self {
        tracing::debug!("Created RcloneUploader for {}:{}", remote, folder);
        Self {
            binary,
            remote,
            folder,
        }
    }

    fn destination(&self) -> String {
        format!("{}:{}", self.remote, self.folder)
    }

    async fn run(&self, args: &[&str]) -> crate::Result<String> {
        tracing::debug!("Running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SolarError::Upload(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(SolarError::Upload(format!(
                "{} {} exited with {}: {}",
                self.binary,
                args.first().unwrap_or(&""),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl UploadSink for RcloneUploader {
    fn type_name(&self) -> &str {
        "rclone"
    }

    async fn upload(&self, local_path: &Path) -> crate::Result<String> {
        let name = file_name_of(local_path)?;
        let source = local_path.to_string_lossy().into_owned();
        let destination = self.destination();
        self.run(&["copy", source.as_str(), destination.as_str()])
            .await?;
        Ok(format!("{}/{}", destination, name))
    }

    async fn list(&self) -> crate::Result<Vec<RemoteFile>> {
        let destination = self.destination();
        let stdout = self.run(&["lsjson", destination.as_str()]).await?;
        let entries: Vec<LsJsonEntry> = serde_json::from_str(&stdout)?;
        Ok(entries
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| RemoteFile {
                name: e.name,
                size: e.size.max(0) as u64,
            })
            .collect())
    }
}
