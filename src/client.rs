use crate::downloader::{AssetDownloader, DEFAULT_CONCURRENCY};
use crate::model::{FetchError, ScrapeError, ScrapeResult, SortMode};
use crate::parser::{PageExtractor, YelpParser};
use crate::proxy::ProxyConfig;
use crate::scraper::fetcher::validate_url;
use crate::scraper::{FetchSettings, Fetcher, HttpFetcher};
use crate::utils::{accept_language, encode_cookie_value};

use chrono::Utc;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// e.g. `es_MX`; drives `Accept-Language` and the `hl` cookie.
    pub locale: String,
    /// e.g. `San Francisco, CA`; sent as the `location` cookie.
    pub geo_location: String,
    pub sort_mode: SortMode,
    pub asset_concurrency: usize,
    /// Deadline for a whole scrape, page and images together.
    pub scrape_timeout: Option<Duration>,
    pub fetch: FetchSettings,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            locale: "en_US".to_string(),
            geo_location: String::new(),
            sort_mode: SortMode::default(),
            asset_concurrency: DEFAULT_CONCURRENCY,
            scrape_timeout: None,
            fetch: FetchSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    Assets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Init,
    Fetched,
    Extracted,
    AssetsResolved,
    Done,
    Failed(Stage),
}

impl ScrapeState {
    pub fn advance(self) -> Self {
        match self {
            ScrapeState::Init => ScrapeState::Fetched,
            ScrapeState::Fetched => ScrapeState::Extracted,
            ScrapeState::Extracted => ScrapeState::AssetsResolved,
            ScrapeState::AssetsResolved => ScrapeState::Done,
            terminal => terminal,
        }
    }

    /// The stage running while in `self` is the one that failed.
    pub fn fail(self) -> Self {
        match self {
            ScrapeState::Init => ScrapeState::Failed(Stage::Fetch),
            ScrapeState::Fetched => ScrapeState::Failed(Stage::Extract),
            ScrapeState::Extracted => ScrapeState::Failed(Stage::Assets),
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScrapeState::Done | ScrapeState::Failed(_))
    }
}

impl ScrapeError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ScrapeError::Fetch(_) => Some(Stage::Fetch),
            ScrapeError::Extract(_) => Some(Stage::Extract),
            ScrapeError::Assets(_) => Some(Stage::Assets),
            ScrapeError::Cancelled | ScrapeError::TimedOut => None,
        }
    }
}

/// Fetches one listing page, extracts it and downloads its images.
pub struct ScrapeClient {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PageExtractor>,
    downloader: AssetDownloader,
    page_headers: HeaderMap,
    options: ClientOptions,
}

impl ScrapeClient {
    /// Client with the proxied HTTP fetcher and the Yelp extractor.
    pub fn new(proxy: ProxyConfig, options: ClientOptions) -> Result<Self, FetchError> {
        info!("Routing requests through proxy {}", proxy);
        let fetcher = Arc::new(HttpFetcher::new(&proxy, options.fetch.clone())?);
        Ok(Self::with_parts(fetcher, Arc::new(YelpParser::new()), options))
    }

    pub fn with_parts(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn PageExtractor>,
        options: ClientOptions,
    ) -> Self {
        let downloader = AssetDownloader::new(fetcher.clone(), options.asset_concurrency);
        let page_headers = build_page_headers(&options.locale, &options.geo_location);
        Self {
            fetcher,
            extractor,
            downloader,
            page_headers,
            options,
        }
    }

    /// Target URL with the requested review ordering applied.
    pub fn page_url(&self, target: &str) -> Result<Url, FetchError> {
        let mut url = validate_url(target)?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "sort_by")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("sort_by", self.options.sort_mode.as_query_value());
        Ok(url)
    }

    pub async fn scrape(&self, target: &str) -> Result<ScrapeResult, ScrapeError> {
        self.scrape_with_state(target).await.1
    }

    /// Runs a scrape and also reports the state it ended in: `Done` on success,
    /// `Failed(stage)` otherwise. A scrape cut off by the deadline is attributed to
    /// the stage that was running.
    pub async fn scrape_with_state(
        &self,
        target: &str,
    ) -> (ScrapeState, Result<ScrapeResult, ScrapeError>) {
        let mut state = ScrapeState::Init;
        let finished = match self.options.scrape_timeout {
            Some(limit) => timeout(limit, self.run(target, &mut state)).await.ok(),
            None => Some(self.run(target, &mut state).await),
        };

        let result = match finished {
            Some(result) => result,
            None => Err(self.failed(&mut state, ScrapeError::TimedOut)),
        };
        (state, result)
    }

    /// Like `scrape`, but gives up as soon as `cancel` resolves. In-flight requests are dropped.
    pub async fn scrape_until<F>(&self, target: &str, cancel: F) -> Result<ScrapeResult, ScrapeError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.scrape(target) => result,
            _ = cancel => {
                warn!("Scrape of {} cancelled", target);
                Err(ScrapeError::Cancelled)
            }
        }
    }

    async fn run(&self, target: &str, state: &mut ScrapeState) -> Result<ScrapeResult, ScrapeError> {
        let page = match self.fetch_page(target).await {
            Ok(page) => page,
            Err(e) => return Err(self.failed(state, ScrapeError::Fetch(e))),
        };
        self.advance(state);

        let details = match self.extractor.extract(&page.text()) {
            Ok(details) => details,
            Err(e) => return Err(self.failed(state, ScrapeError::Extract(e))),
        };
        self.advance(state);
        info!(
            "Extracted '{}' ({} menu item(s), {} image(s) referenced)",
            details.business_name,
            details.menu_items.len(),
            details.image_urls.len()
        );

        let image_urls = resolve_image_urls(&page.url, &details.image_urls);
        let images = match self.downloader.download_all(&image_urls).await {
            Ok(images) => images,
            Err(e) => return Err(self.failed(state, ScrapeError::Assets(e))),
        };
        self.advance(state);

        let result = ScrapeResult {
            url: target.to_string(),
            business_name: details.business_name,
            location: details.location,
            rating: details.rating,
            review_count: details.review_count,
            categories: details.categories,
            menu_items: details.menu_items,
            sort_mode: self.options.sort_mode,
            fetched_at: Utc::now(),
            images,
        };
        self.advance(state);
        Ok(result)
    }

    async fn fetch_page(&self, target: &str) -> Result<crate::model::FetchedPage, FetchError> {
        let url = self.page_url(target)?;
        info!("Fetching listing page {}", url);
        self.fetcher.fetch(url.as_str(), &self.page_headers).await
    }

    fn advance(&self, state: &mut ScrapeState) {
        let next = state.advance();
        debug!("Scrape state {:?} -> {:?}", state, next);
        *state = next;
    }

    fn failed(&self, state: &mut ScrapeState, error: ScrapeError) -> ScrapeError {
        let next = state.fail();
        warn!("Scrape state {:?} -> {:?}: {}", state, next, error);
        *state = next;
        error
    }
}

fn build_page_headers(locale: &str, geo_location: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );

    match HeaderValue::from_str(&accept_language(locale)) {
        Ok(v) => {
            headers.insert(ACCEPT_LANGUAGE, v);
        }
        Err(_) => warn!("Ignoring locale '{}': not a valid header value", locale),
    }

    let mut cookie = format!("hl={}", encode_cookie_value(locale.trim()));
    if !geo_location.trim().is_empty() {
        cookie.push_str(&format!("; location={}", encode_cookie_value(geo_location.trim())));
    }
    if let Ok(v) = HeaderValue::from_str(&cookie) {
        headers.insert(COOKIE, v);
    }

    headers
}

/// Resolves image references against the page URL, dropping non-http(s) and duplicates.
fn resolve_image_urls(page_url: &str, raw: &[String]) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for reference in raw {
        let resolved = match &base {
            Some(base) => base.join(reference),
            None => Url::parse(reference),
        };
        match resolved {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let url = url.to_string();
                if !out.contains(&url) {
                    out.push(url);
                }
            }
            _ => debug!("Dropping image reference {}", reference),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_walks_forward() {
        let mut state = ScrapeState::Init;
        let mut seen = vec![state];
        while !state.is_terminal() {
            state = state.advance();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                ScrapeState::Init,
                ScrapeState::Fetched,
                ScrapeState::Extracted,
                ScrapeState::AssetsResolved,
                ScrapeState::Done,
            ]
        );
        assert_eq!(ScrapeState::Done.fail(), ScrapeState::Done);
    }

    #[test]
    fn failure_is_attributed_to_running_stage() {
        assert_eq!(ScrapeState::Init.fail(), ScrapeState::Failed(Stage::Fetch));
        assert_eq!(ScrapeState::Fetched.fail(), ScrapeState::Failed(Stage::Extract));
        assert_eq!(ScrapeState::Extracted.fail(), ScrapeState::Failed(Stage::Assets));
        assert_eq!(
            ScrapeState::Failed(Stage::Fetch).advance(),
            ScrapeState::Failed(Stage::Fetch)
        );
    }

    #[test]
    fn page_headers_carry_locale_and_geo() {
        let headers = build_page_headers("es_MX", "San Francisco, CA");
        assert_eq!(headers[ACCEPT_LANGUAGE], "es-MX,es;q=0.9");
        assert_eq!(headers[COOKIE], "hl=es_MX; location=San+Francisco%2C+CA");

        let headers = build_page_headers("en_US", "");
        assert_eq!(headers[COOKIE], "hl=en_US");
    }

    #[test]
    fn image_urls_are_resolved_and_deduplicated() {
        let raw = vec![
            "/bphoto/a/o.jpg".to_string(),
            "https://cdn.test/b.png".to_string(),
            "https://www.yelp.com/bphoto/a/o.jpg".to_string(),
            "javascript:void(0)".to_string(),
        ];
        assert_eq!(
            resolve_image_urls("https://www.yelp.com/biz/x?sort_by=rating_desc", &raw),
            vec!["https://www.yelp.com/bphoto/a/o.jpg", "https://cdn.test/b.png"]
        );
    }

    #[test]
    fn page_url_sets_sort_by() {
        struct Never;
        #[async_trait::async_trait]
        impl Fetcher for Never {
            async fn fetch(
                &self,
                url: &str,
                _headers: &HeaderMap,
            ) -> Result<crate::model::FetchedPage, FetchError> {
                Err(FetchError::InvalidUrl(url.to_string()))
            }
        }

        let options = ClientOptions {
            sort_mode: SortMode::HighestRated,
            ..ClientOptions::default()
        };
        let client = ScrapeClient::with_parts(Arc::new(Never), Arc::new(YelpParser::new()), options);
        let url = client
            .page_url("https://www.yelp.com.mx/biz/foo?osq=tacos&sort_by=date_desc")
            .unwrap();
        assert_eq!(url.as_str(), "https://www.yelp.com.mx/biz/foo?osq=tacos&sort_by=rating_desc");
        assert!(matches!(client.page_url("biz/foo"), Err(FetchError::InvalidUrl(_))));
    }
}
