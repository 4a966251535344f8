//! Thumbnail source backed by the device's HTTP media endpoint

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};

use super::{FetchError, ThumbnailSource};
use crate::models::Owner;

/// Path under the device base URL where thumbnails are served
pub const THUMBNAILS_PATH: &str = "/data/thumbnails";

/// Fetches thumbnails with `GET {base_url}/data/thumbnails/{uid}`.
#[derive(Debug, Clone)]
pub struct HttpThumbnailSource {
    client: Client,
    base_url: String,
}

impl HttpThumbnailSource {
    /// Create a source for the device at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the thumbnail of `owner`.
    pub fn thumbnail_url(&self, owner: &Owner) -> String {
        format!("{}{THUMBNAILS_PATH}/{}", self.base_url, owner.uid())
    }
}

impl ThumbnailSource for HttpThumbnailSource {
    async fn fetch(&self, owner: &Owner) -> Result<Bytes, FetchError> {
        let url = self.thumbnail_url(owner);
        tracing::debug!("Downloading thumbnail: {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(owner.uid().to_string())),
            status if !status.is_success() => return Err(FetchError::Status(status.as_u16())),
            _ => {}
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if bytes.is_empty() {
            return Err(FetchError::Empty(owner.uid().to_string()));
        }

        Ok(bytes)
    }
}
