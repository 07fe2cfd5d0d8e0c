//! Downloads collaborator

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::filename::sanitize_filename;
use crate::constants::download::PAGE_ORIGIN;
use crate::error::Error;

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Whether downloads can currently be written
    async fn has_permission(&self) -> bool;

    /// Save `url` as `filename`, returning a download id.
    ///
    /// Fails with [`Error::PermissionDenied`] when [`Self::has_permission`]
    /// would return `false`.
    async fn download(&self, url: &str, filename: &str) -> Result<u64>;
}

/// Fetches over HTTP and writes into a local directory
pub struct HttpDownloader {
    client: Client,
    dir: PathBuf,
    next_id: AtomicU64,
}

impl HttpDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            dir: dir.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Absolute URL for a possibly root-relative page link
pub fn absolute_url(url: &str) -> String {
    if url.starts_with('/') && !url.starts_with("//") {
        format!("{PAGE_ORIGIN}{url}")
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn has_permission(&self) -> bool {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Download directory unavailable");
                false
            }
        }
    }

    async fn download(&self, url: &str, filename: &str) -> Result<u64> {
        if !self.has_permission().await {
            return Err(Error::PermissionDenied(format!(
                "cannot write to {}",
                self.dir.display()
            ))
            .into());
        }

        let url = absolute_url(url);
        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .context(format!("Failed to fetch {url}"))?
            .error_for_status()?
            .bytes()
            .await?;

        let target = self.dir.join(sanitize_filename(filename));
        tokio::fs::write(&target, &bytes)
            .await
            .context(format!("Failed to write {}", target.display()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(id, path = %target.display(), size = bytes.len(), "Download complete");
        Ok(id)
    }
}
