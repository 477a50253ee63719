pub mod yelp_parser;

use crate::model::{ExtractError, ListingDetails};

pub use yelp_parser::YelpParser;

/// Site-specific extraction strategy. One implementation per page layout.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<ListingDetails, ExtractError>;
}
