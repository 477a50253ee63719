use crate::model::{FetchError, FetchedPage};
use reqwest::header::HeaderMap;

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<FetchedPage, FetchError>;
}
