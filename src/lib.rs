pub mod client;
pub mod config;
pub mod downloader;
pub mod model;
pub mod output;
pub mod parser;
pub mod proxy;
pub mod scraper;
pub mod utils;

pub use client::{ClientOptions, ScrapeClient, ScrapeState, Stage};
pub use model::{
    AssetError, ExtractError, FetchError, ImageAsset, MenuItem, ProxyConfigError, ScrapeError, ScrapeResult,
    SortMode,
};
pub use proxy::ProxyConfig;
