//! Blog search over the WordPress REST API.

mod client;
mod query;

pub use client::{SearchClient, SearchResult};
pub use query::{build_search_url, parse_query, SearchParams, DEFAULT_PER_PAGE};

use thiserror::Error;

use crate::feed::FetchError;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("API request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unexpected API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API base URL cannot take path segments: {0}")]
    InvalidBase(String),
}
