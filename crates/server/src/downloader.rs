use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bridge::MediaDownloader;
use reqwest::Client;
use shared::protocol::Media;

/// Fetches attachment bytes from the url the chat-service integration attaches
/// to each media payload.
#[derive(Clone, Default)]
pub struct HttpMediaDownloader {
    http: Client,
}

impl HttpMediaDownloader {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

#[async_trait]
impl MediaDownloader for HttpMediaDownloader {
    async fn download_media(&self, media: &Media) -> Result<Vec<u8>> {
        let url = media
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("media {} has no download url", media.file_hash))?;

        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to request {url}"))?
            .error_for_status()?
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {url}"))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn media_without_url_is_rejected() {
        let err = HttpMediaDownloader::new()
            .download_media(&Media {
                file_hash: "aGFzaA==".to_string(),
                ..Media::default()
            })
            .await
            .expect_err("no url");
        assert!(err.to_string().contains("has no download url"));
    }
}
