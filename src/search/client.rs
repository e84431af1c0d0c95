use chrono::NaiveDateTime;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use url::Url;

use super::query::{build_search_url, parse_query, DEFAULT_PER_PAGE};
use super::SearchError;
use crate::feed::Fetcher;
use crate::util::strip_html;

const EXCERPT_CHARS: usize = 150;
const UNKNOWN_AUTHOR: &str = "Unknown author";
const AUTHOR_CACHE_CAPACITY: usize = 256;

/// One hit, shaped for an assistant surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct WpPost {
    #[serde(default)]
    date: String,
    title: Rendered,
    #[serde(default)]
    link: String,
    excerpt: Rendered,
    #[serde(default)]
    author: u64,
}

#[derive(Debug, Deserialize)]
struct WpUser {
    name: String,
}

/// Searches posts through the WordPress REST API.
///
/// Author display names are resolved with one extra request per author id and
/// remembered for the lifetime of the client.
pub struct SearchClient {
    fetcher: Fetcher,
    api_base: Url,
    per_page: usize,
    authors: Mutex<LruCache<u64, String>>,
}

impl SearchClient {
    pub fn new(api_base: Url) -> Result<Self, SearchError> {
        let fetcher = Fetcher::new(api_base.clone())?;
        Ok(Self::with_fetcher(fetcher, api_base))
    }

    pub fn with_fetcher(fetcher: Fetcher, api_base: Url) -> Self {
        let capacity = NonZeroUsize::new(AUTHOR_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            fetcher,
            api_base,
            per_page: DEFAULT_PER_PAGE,
            authors: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of results requested per search.
    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Run a search. Every failure is logged and yields an empty list.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        match self.try_search(query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Error searching blog");
                Vec::new()
            }
        }
    }

    pub async fn try_search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let mut params = parse_query(query);
        params.per_page = self.per_page;

        let url = build_search_url(&self.api_base, &params)?;
        tracing::debug!(url = %url, "Searching posts");

        let body = self.fetcher.fetch_url(url).await?;
        let posts: Vec<WpPost> = serde_json::from_str(&body)?;

        self.resolve_authors(&posts).await;

        let authors = self.lock_authors();
        let results = posts
            .iter()
            .map(|post| SearchResult {
                title: strip_html(&post.title.rendered),
                url: post.link.clone(),
                snippet: format_snippet(
                    &post.date,
                    authors.peek(&post.author).map(String::as_str),
                    &post.excerpt.rendered,
                ),
            })
            .collect();

        Ok(results)
    }

    async fn resolve_authors(&self, posts: &[WpPost]) {
        let mut seen = HashSet::new();
        for id in posts.iter().map(|p| p.author) {
            if !seen.insert(id) {
                continue;
            }
            let known = self.lock_authors().get(&id).is_some();
            if known {
                continue;
            }
            match self.fetch_author(id).await {
                Ok(name) => {
                    self.lock_authors().put(id, name);
                }
                Err(e) => {
                    tracing::warn!(author_id = id, error = %e, "Error fetching author data");
                }
            }
        }
    }

    async fn fetch_author(&self, id: u64) -> Result<String, SearchError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| SearchError::InvalidBase(self.api_base.to_string()))?
            .pop_if_empty()
            .push("users")
            .push(&id.to_string());

        let body = self.fetcher.fetch_url(url).await?;
        let user: WpUser = serde_json::from_str(&body)?;
        Ok(user.name)
    }

    fn lock_authors(&self) -> std::sync::MutexGuard<'_, LruCache<u64, String>> {
        self.authors.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `D.M.YYYY | author | excerpt...`
fn format_snippet(date: &str, author: Option<&str>, excerpt_html: &str) -> String {
    let date = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S")
        .map(|d| d.format("%-d.%-m.%Y").to_string())
        .unwrap_or_else(|_| date.to_string());
    let author = author.unwrap_or(UNKNOWN_AUTHOR);
    let excerpt: String = strip_html(excerpt_html).chars().take(EXCERPT_CHARS).collect();
    format!("{date} | {author} | {excerpt}...")
}
