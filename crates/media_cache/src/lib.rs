use std::{
    collections::HashMap,
    future::Future,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use shared::protocol::Media;
use tokio::sync::OnceCell;
use tracing::{debug, info};

mod extension;
mod fs_store;

pub use extension::infer_extension;
pub use fs_store::{blob_file_name, FsBlobStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub hash: String,
    pub path: PathBuf,
    pub url: String,
    pub extension: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn add_blob(&self, hash: &str, extension: &str, bytes: &[u8]) -> Result<BlobEntry>;
}

/// Content-addressed attachment cache shared by every session of the process.
///
/// Each hash owns a `OnceCell`: the first caller downloads and stores, later
/// callers wait for that result. A failed or dropped attempt leaves the cell
/// empty so the next caller tries again.
pub struct MediaCache {
    store: Arc<dyn BlobStore>,
    entries: Mutex<HashMap<String, Arc<OnceCell<BlobEntry>>>>,
}

impl MediaCache {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, hash: &str) -> Option<BlobEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stored entry for `media`, running `fetch` only when no
    /// session has stored this hash yet.
    pub async fn resolve<F, Fut>(&self, media: &Media, fetch: F) -> Result<BlobEntry>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        if media.file_hash.is_empty() {
            bail!("media attachment has no content hash");
        }

        let cell = self.cell(&media.file_hash);
        if let Some(entry) = cell.get() {
            debug!(hash = %media.file_hash, "media: cache hit");
            return Ok(entry.clone());
        }

        let entry = cell
            .get_or_try_init(|| async {
                let bytes = fetch()
                    .await
                    .with_context(|| format!("failed to download media {}", media.file_hash))?;
                let extension = infer_extension(
                    media.mime_type.as_deref(),
                    &bytes,
                    media.filename.as_deref(),
                );
                let entry = self
                    .store
                    .add_blob(&media.file_hash, &extension, &bytes)
                    .await
                    .with_context(|| format!("failed to store media {}", media.file_hash))?;
                info!(
                    hash = %media.file_hash,
                    size = bytes.len(),
                    url = %entry.url,
                    "media: stored blob"
                );
                Ok::<_, anyhow::Error>(entry)
            })
            .await?;

        Ok(entry.clone())
    }

    fn cell(&self, hash: &str) -> Arc<OnceCell<BlobEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(hash.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
