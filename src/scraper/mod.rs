pub mod fetcher;
pub mod retry;
pub mod traits;

pub use fetcher::{FetchSettings, HttpFetcher};
pub use retry::RetryPolicy;
pub use traits::Fetcher;
