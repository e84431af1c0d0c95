use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::fetcher::{FetchError, Fetcher};
use super::parser::{parse_feed, FeedError};
use crate::notify::{Notifier, Toast};
use crate::storage::Article;

/// Failure to load one page, carrying the underlying layer's error unchanged.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Anything that can deliver one page of articles.
///
/// Pages are 1-based. Implementations do not validate how many articles they
/// return; the loader decides what a short page means.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn load_page(&self, page: usize, page_size: usize) -> Result<Vec<Article>, PageError>;
}

/// Query string for one page of the RSS 2.0 feed.
pub fn page_query(page: usize, page_size: usize) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("feed", "rss2")
        .append_pair("posts_per_page", &page_size.to_string())
        .append_pair("paged", &page.to_string())
        .finish()
}

/// Loads feed pages over HTTP.
pub struct PageLoader {
    fetcher: Fetcher,
    notifier: Arc<dyn Notifier>,
}

impl PageLoader {
    pub fn new(fetcher: Fetcher, notifier: Arc<dyn Notifier>) -> Self {
        Self { fetcher, notifier }
    }
}

#[async_trait]
impl PageSource for PageLoader {
    async fn load_page(&self, page: usize, page_size: usize) -> Result<Vec<Article>, PageError> {
        tracing::debug!(page = page, per_page = page_size, "Fetching page");

        let xml = self.fetcher.fetch(&page_query(page, page_size)).await?;

        match parse_feed(&xml) {
            Ok(articles) => Ok(articles),
            // Past the last page WordPress serves an empty channel.
            Err(FeedError::EmptyChannel) if page > 1 => {
                tracing::debug!(page = page, "Empty page, end of feed");
                Ok(Vec::new())
            }
            Err(e) => {
                tracing::warn!(page = page, error = %e, "Error parsing RSS feed");
                self.notifier
                    .notify(Toast::failure("Error parsing RSS feed").with_message(e.to_string()));
                Err(e.into())
            }
        }
    }
}
