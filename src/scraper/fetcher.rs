use crate::model::{FetchError, FetchedPage};
use crate::proxy::ProxyConfig;
use crate::scraper::retry::RetryPolicy;
use crate::scraper::traits::Fetcher;

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) BizSniperBot/0.1";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Fetcher that routes every request through one proxy.
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(proxy: &ProxyConfig, settings: FetchSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .proxy(proxy.to_reqwest().map_err(|e| FetchError::Network(e.to_string()))?)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            retry: settings.retry,
        })
    }

    async fn attempt(&self, url: &Url, headers: &HeaderMap) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if status == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
            return Err(FetchError::ProxyAuth);
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(FetchError::from)?.to_vec();

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// A CONNECT tunnel refused with 407 surfaces as a send error rather than a response.
fn classify_send_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        return FetchError::Timeout;
    }
    let mut source = std::error::Error::source(&e);
    while let Some(err) = source {
        if err.to_string().to_ascii_lowercase().contains("proxy authentication required") {
            return FetchError::ProxyAuth;
        }
        source = err.source();
    }
    FetchError::from(e)
}

pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(FetchError::InvalidUrl(raw.to_string())),
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<FetchedPage, FetchError> {
        let url = validate_url(url)?;

        let mut attempt = 1;
        loop {
            debug!("GET {} (attempt {}/{})", url, attempt, self.retry.max_attempts);
            match self.attempt(&url, headers).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    warn!("Fetch of {} failed ({}), retrying in {:?}", url, e, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Fetch of {} failed after {} attempt(s): {}", url, attempt, e);
                    return Err(e);
                }
            }
        }
    }
}
