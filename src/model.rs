// Core structs: ScrapeResult, ImageAsset, ListingDetails and the error taxonomy
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Review ordering requested by the caller. Carried through to the result as
/// request metadata; never read from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Recommended,
    HighestRated,
    LowestRated,
    Newest,
    Oldest,
    Elites,
}

impl SortMode {
    /// Value sent as the `sort_by` query parameter.
    pub fn as_query_value(&self) -> &'static str {
        match self {
            SortMode::Recommended => "relevance_desc",
            SortMode::HighestRated => "rating_desc",
            SortMode::LowestRated => "rating_asc",
            SortMode::Newest => "date_desc",
            SortMode::Oldest => "date_asc",
            SortMode::Elites => "elites_desc",
        }
    }
}

/// Raw response of a single fetch.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Fields pulled out of a listing page by a `PageExtractor`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingDetails {
    pub business_name: String,
    pub location: String,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub categories: Vec<String>,
    pub menu_items: Vec<MenuItem>,
    pub image_urls: Vec<String>,
}

/// One dish from the listing's menu. Price is kept as displayed ("$12.50").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub name: String,
    pub price: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAsset {
    pub source_url: String,
    #[serde(skip)]
    pub content: Vec<u8>,
    pub extension: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub url: String,
    pub business_name: String,
    pub location: String,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub categories: Vec<String>,
    pub menu_items: Vec<MenuItem>,
    pub sort_mode: SortMode,
    pub fetched_at: DateTime<Utc>,
    pub images: Vec<ImageAsset>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProxyConfigError {
    #[error("invalid proxy url: {0}")]
    InvalidUrl(String),
    #[error("unsupported proxy scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("proxy url has no host")]
    MissingHost,
    #[error("proxy url has no port")]
    MissingPort,
    #[error("invalid proxy credentials: {0}")]
    InvalidCredentials(&'static str),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error("request timed out")]
    Timeout,
    #[error("proxy rejected credentials (407)")]
    ProxyAuth,
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Timeouts, connection failures, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::HttpStatus(code) => *code == 429 || (500..600).contains(code),
            FetchError::InvalidUrl(_) | FetchError::ProxyAuth => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("document is not a business listing page")]
    MalformedDocument,
    #[error("required field missing: {0}")]
    RequiredFieldMissing(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("all {attempted} image downloads failed")]
    AllDownloadsFailed { attempted: usize },
}

/// Top-level failure of a scrape, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("fetch stage: {0}")]
    Fetch(#[source] FetchError),
    #[error("extract stage: {0}")]
    Extract(#[source] ExtractError),
    #[error("asset stage: {0}")]
    Assets(#[source] AssetError),
    #[error("scrape cancelled")]
    Cancelled,
    #[error("scrape exceeded its deadline")]
    TimedOut,
}
