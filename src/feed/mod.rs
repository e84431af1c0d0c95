//! Article retrieval from the blog's RSS feed.
//!
//! The layers stack leaf-first:
//!
//! - [`fetcher`] - GET with manual redirects, a 30 second timeout and a size limit
//! - [`parser`] - RSS 2.0 XML into [`Article`](crate::storage::Article) records
//! - [`page`] - one page of the feed (`feed=rss2&posts_per_page=N&paged=P`)
//! - [`loader`] - cache check, synchronous first page, background continuation
//!
//! # Example
//!
//! ```ignore
//! let loader = ArticleLoader::new(pages, store, notifier, LoaderSettings::default());
//! let id = loader.subscribe(|articles| println!("{} articles", articles.len()));
//! let first_page = loader.load(false).await;
//! loader.wait_for_background().await;
//! loader.unsubscribe(id);
//! ```

mod fetcher;
mod loader;
mod page;
mod parser;
mod subscribers;

pub use fetcher::{FetchError, Fetcher, FETCH_TIMEOUT};
pub use loader::{
    dedupe_articles, ArticleLoader, LoadReport, LoadStatus, LoaderSettings, CACHE_EXPIRATION,
    DEFAULT_MAX_POSTS, DEFAULT_POSTS_PER_PAGE, PAGE_DELAY,
};
pub use page::{page_query, PageError, PageLoader, PageSource};
pub use parser::{parse_feed, FeedError, UNTITLED};
pub use subscribers::{ArticlesCallback, Subscribers, SubscriptionId};
