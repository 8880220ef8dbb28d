use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use tracing::debug;
use url::Url;

use crate::{BlobEntry, BlobStore};

/// Writes blobs into one flat directory served by the companion file server.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_url: Url,
}

impl FsBlobStore {
    pub async fn open(root: impl Into<PathBuf>, public_url: &str) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create blob directory '{}'", root.display()))?;

        let mut public_url = Url::parse(public_url)
            .with_context(|| format!("invalid public file url '{public_url}'"))?;
        if !public_url.path().ends_with('/') {
            let path = format!("{}/", public_url.path());
            public_url.set_path(&path);
        }

        Ok(Self { root, public_url })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn add_blob(&self, hash: &str, extension: &str, bytes: &[u8]) -> Result<BlobEntry> {
        let file_name = blob_file_name(hash, extension);
        let path = self.root.join(&file_name);
        let partial = self.root.join(format!(".{file_name}.part"));

        let written = match tokio::fs::write(&partial, bytes).await {
            Ok(()) => tokio::fs::rename(&partial, &path)
                .await
                .with_context(|| format!("failed to move blob into '{}'", path.display())),
            Err(error) => Err(error)
                .with_context(|| format!("failed to write blob '{}'", partial.display())),
        };
        if let Err(error) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                debug!(path = %partial.display(), error = %cleanup, "media: no partial blob to remove");
            }
            return Err(error);
        }

        let url = self
            .public_url
            .join(&file_name)
            .with_context(|| format!("failed to build url for '{file_name}'"))?;

        Ok(BlobEntry {
            hash: hash.to_string(),
            path,
            url: url.to_string(),
            extension: extension.to_string(),
        })
    }
}

/// Content hashes arrive as standard base64, which is not path or url safe.
/// Anything else is encoded whole behind a `~`, which url-safe base64 never
/// produces, so distinct hashes always get distinct names.
pub fn blob_file_name(hash: &str, extension: &str) -> String {
    let stem = STANDARD
        .decode(hash)
        .map(|raw| URL_SAFE_NO_PAD.encode(raw))
        .unwrap_or_else(|_| format!("~{}", URL_SAFE_NO_PAD.encode(hash)));

    if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    }
}
