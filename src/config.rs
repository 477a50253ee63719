use crate::client::ClientOptions;
use crate::downloader::DEFAULT_CONCURRENCY;
use crate::model::{ProxyConfigError, SortMode};
use crate::proxy::ProxyConfig;
use crate::scraper::{FetchSettings, RetryPolicy};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid proxy settings: {0}")]
    Proxy(#[from] ProxyConfigError),
}

#[derive(Debug, Deserialize)]
pub struct ProxySettings {
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub proxy: ProxySettings,
    #[serde(default)]
    pub target_url: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub geo_location: String,
    #[serde(default)]
    pub sort_mode: SortMode,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default = "default_asset_concurrency")]
    pub asset_concurrency: usize,
    #[serde(default)]
    pub scrape_timeout_secs: Option<u64>,
}

fn default_locale() -> String {
    "en_US".to_string()
}

fn default_output_dir() -> String {
    "./output".to_string()
}

fn default_asset_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl AppConfig {
    pub fn proxy_config(&self) -> Result<ProxyConfig, ConfigError> {
        Ok(ProxyConfig::parse(
            &self.proxy.url,
            &self.proxy.username,
            &self.proxy.password,
        )?)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            locale: self.locale.clone(),
            geo_location: self.geo_location.clone(),
            sort_mode: self.sort_mode,
            asset_concurrency: self.asset_concurrency,
            scrape_timeout: self.scrape_timeout_secs.map(Duration::from_secs),
            fetch: FetchSettings {
                timeout: Duration::from_secs(self.fetch.timeout_secs.max(1)),
                retry: RetryPolicy::new(
                    self.fetch.max_attempts,
                    Duration::from_millis(self.fetch.initial_backoff_ms),
                ),
                ..FetchSettings::default()
            },
        }
    }
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
