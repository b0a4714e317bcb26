//! Image acquisition.
//!
//! [`ImageFetcher`] turns an [`ImageRef`] into raw bytes. The production
//! implementation, [`HttpFetcher`], downloads URLs with [`reqwest`] and reads
//! local paths with `tokio::fs`. A single attempt is made per image.

use std::time::Duration;

use async_trait::async_trait;
use imgbatch_core::image_ref::ImageRef;

use crate::error::FetchError;

/// Source of raw image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the full contents of the referenced image.
    async fn fetch(&self, reference: &ImageRef) -> Result<Vec<u8>, FetchError>;
}

/// Fetches remote images over HTTP(S) and local images from disk.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody(url.to_string()));
        }
        Ok(body.to_vec())
    }

    async fn fetch_local(&self, path: &std::path::Path) -> Result<Vec<u8>, FetchError> {
        tokio::fs::read(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(path.to_path_buf())
            } else {
                FetchError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, reference: &ImageRef) -> Result<Vec<u8>, FetchError> {
        match reference {
            ImageRef::Url(url) => self.fetch_url(url).await,
            ImageRef::Local(path) => self.fetch_local(path).await,
        }
    }
}
