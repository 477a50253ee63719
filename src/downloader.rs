use crate::model::{AssetError, FetchError, ImageAsset};
use crate::scraper::Fetcher;

use futures::stream::{self, StreamExt};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY: usize = 8;

/// Result of one image download within a batch.
#[derive(Debug)]
pub enum AssetOutcome {
    Downloaded(ImageAsset),
    Skipped { url: String, error: FetchError },
}

/// Maps a response content type onto a file extension. Unknown or absent types get `.bin`.
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        _ => ".bin",
    }
}

pub struct AssetDownloader {
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
    headers: HeaderMap,
}

impl AssetDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, concurrency: usize) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/avif,image/webp,image/*,*/*;q=0.8"));
        Self {
            fetcher,
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            headers,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    async fn download_one(&self, url: String) -> AssetOutcome {
        match self.fetcher.fetch(&url, &self.headers).await {
            Ok(page) => AssetOutcome::Downloaded(ImageAsset {
                extension: extension_for(page.content_type.as_deref()).to_string(),
                source_url: url,
                content: page.body,
            }),
            Err(error) => AssetOutcome::Skipped { url, error },
        }
    }

    /// Downloads every URL with at most `concurrency` requests in flight.
    /// Outcomes come back in input order.
    pub async fn download_outcomes(&self, urls: &[String]) -> Vec<AssetOutcome> {
        stream::iter(urls.iter().cloned())
            .map(|url| self.download_one(url))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Downloads all images, skipping individual failures. Fails only when every download fails.
    pub async fn download_all(&self, urls: &[String]) -> Result<Vec<ImageAsset>, AssetError> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let outcomes = self.download_outcomes(urls).await;
        let mut assets = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                AssetOutcome::Downloaded(asset) => assets.push(asset),
                AssetOutcome::Skipped { url, error } => {
                    warn!("Skipping image {}: {}", url, error);
                }
            }
        }

        if assets.is_empty() {
            return Err(AssetError::AllDownloadsFailed { attempted: urls.len() });
        }

        info!("Downloaded {}/{} images", assets.len(), urls.len());
        Ok(assets)
    }
}
