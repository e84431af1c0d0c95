//! Progressive article loading.
//!
//! [`ArticleLoader::load`] answers from a fresh cache when it can. Otherwise it
//! fetches page 1, returns it right away, and leaves a background task that
//! keeps fetching pages, publishing the growing deduplicated set to
//! subscribers and finally replacing the cached snapshot.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::page::{PageError, PageSource};
use super::subscribers::{Subscribers, SubscriptionId};
use crate::notify::{Notifier, Toast};
use crate::storage::{Article, CacheStore, CachedSnapshot};

pub const DEFAULT_POSTS_PER_PAGE: usize = 30;
pub const DEFAULT_MAX_POSTS: usize = 90;
/// Snapshots younger than this are served without touching the network.
pub const CACHE_EXPIRATION: Duration = Duration::from_secs(60 * 60);
/// Pause between successive background page requests.
pub const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Limits and timings for one loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub posts_per_page: usize,
    pub max_posts: usize,
    pub cache_ttl: Duration,
    pub page_delay: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            posts_per_page: DEFAULT_POSTS_PER_PAGE,
            max_posts: DEFAULT_MAX_POSTS,
            cache_ttl: CACHE_EXPIRATION,
            page_delay: PAGE_DELAY,
        }
    }
}

impl LoaderSettings {
    /// Upper bound on pages one load cycle may request.
    pub fn max_pages(&self) -> usize {
        self.max_posts.div_ceil(self.posts_per_page.max(1))
    }
}

/// How a background cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Stopped at the end of the feed, the post limit or the page limit.
    Complete,
    /// A page failed; everything up to the previous page was kept and cached.
    Partial { failed_page: usize, error: String },
}

/// Summary of a finished background cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub status: LoadStatus,
    pub total: usize,
    pub pages_fetched: usize,
    pub duplicates_removed: usize,
}

/// Remove later articles whose identity key was already seen.
///
/// First occurrence wins and order is preserved. Returns how many were removed.
pub fn dedupe_articles(articles: &mut Vec<Article>) -> usize {
    let before = articles.len();
    let mut seen = HashSet::with_capacity(before);
    articles.retain(|a| seen.insert(a.identity_key().to_owned()));
    before - articles.len()
}

struct Shared {
    source: Arc<dyn PageSource>,
    store: Arc<dyn CacheStore>,
    notifier: Arc<dyn Notifier>,
    subscribers: Subscribers,
    settings: LoaderSettings,
}

/// Cache-first, progressively refreshing article loader.
///
/// At most one background continuation runs per loader: a load that goes to
/// the network aborts the previous continuation before fetching page 1.
pub struct ArticleLoader {
    shared: Arc<Shared>,
    background: Mutex<Option<JoinHandle<LoadReport>>>,
}

impl ArticleLoader {
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Arc<dyn CacheStore>,
        notifier: Arc<dyn Notifier>,
        settings: LoaderSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                store,
                notifier,
                subscribers: Subscribers::new(),
                settings,
            }),
            background: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.shared.settings
    }

    /// Register for "articles updated" notifications.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Article]) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(callback)
    }

    /// Idempotent; returns `false` if the subscription was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscribers.unsubscribe(id)
    }

    /// Load articles, returning as soon as a usable set is known.
    ///
    /// Never fails: on a first-page error the cached snapshot is returned
    /// whatever its age, or an empty list when there is none.
    pub async fn load(&self, force_refresh: bool) -> Vec<Article> {
        let started = Instant::now();
        let shared = &self.shared;
        let settings = &shared.settings;

        if force_refresh {
            // A running continuation would otherwise re-persist after the clear.
            self.cancel_background();
            self.clear_cache().await;
        } else {
            match shared.store.get().await {
                Ok(Some(snapshot)) => {
                    let age = snapshot.age(Utc::now());
                    if snapshot.is_fresh(Utc::now(), settings.cache_ttl) {
                        tracing::info!(
                            age_minutes = age.as_secs() / 60,
                            count = snapshot.articles.len(),
                            "Using cached articles"
                        );
                        return snapshot.articles;
                    }
                    tracing::info!(age_minutes = age.as_secs() / 60, "Cache expired");
                }
                Ok(None) => tracing::debug!("No cached articles"),
                Err(e) => tracing::warn!(error = %e, "Failed to read article cache"),
            }
        }

        self.cancel_background();

        let mut first_page = match shared.source.load_page(1, settings.posts_per_page).await {
            Ok(articles) => articles,
            Err(e) => return self.fall_back_to_cache(e).await,
        };
        let page_len = first_page.len();
        let duplicates = dedupe_articles(&mut first_page);
        tracing::info!(count = page_len, "Fetched page 1");

        shared.subscribers.publish(&first_page);

        if page_len == settings.posts_per_page && first_page.len() < settings.max_posts {
            shared.notifier.notify(
                Toast::animated("Loading more articles...")
                    .with_message("Fetching additional pages in background"),
            );
            let task = tokio::spawn(continue_in_background(
                Arc::clone(shared),
                first_page.clone(),
                duplicates,
                started,
            ));
            *self.background_slot() = Some(task);
        } else {
            // The feed fits on one page: this set is already complete.
            first_page.truncate(settings.max_posts);
            persist(shared, &first_page).await;
        }

        first_page
    }

    /// Wait for the running background continuation, if any.
    ///
    /// Returns `None` when nothing was running or the task was aborted.
    pub async fn wait_for_background(&self) -> Option<LoadReport> {
        let handle = self.background_slot().take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                tracing::error!(error = %e, "Background article loading panicked");
                None
            }
        }
    }

    /// True while a background continuation is still fetching pages.
    pub fn is_loading(&self) -> bool {
        self.background_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drop the cached snapshot.
    pub async fn clear_cache(&self) {
        match self.shared.store.clear().await {
            Ok(()) => tracing::info!("Cache cleared successfully"),
            Err(e) => tracing::warn!(error = %e, "Error clearing cache"),
        }
    }

    /// The cached snapshot's articles regardless of age.
    pub async fn cached_articles(&self) -> Option<Vec<Article>> {
        match self.shared.store.get().await {
            Ok(snapshot) => snapshot.map(|s| s.articles),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read article cache");
                None
            }
        }
    }

    async fn fall_back_to_cache(&self, error: PageError) -> Vec<Article> {
        tracing::error!(error = %error, "Error fetching articles");

        if let Some(articles) = self.cached_articles().await {
            tracing::info!(
                count = articles.len(),
                "Using cached articles as fallback due to error"
            );
            self.shared.notifier.notify(
                Toast::failure("Error loading fresh articles")
                    .with_message("Using cached articles instead"),
            );
            return articles;
        }

        self.shared
            .notifier
            .notify(Toast::failure("Error loading articles").with_message(error.to_string()));
        Vec::new()
    }

    fn cancel_background(&self) {
        if let Some(handle) = self.background_slot().take() {
            if !handle.is_finished() {
                tracing::info!("Aborting previous background load");
                handle.abort();
            }
        }
    }

    fn background_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<LoadReport>>> {
        self.background.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ArticleLoader {
    fn drop(&mut self) {
        self.cancel_background();
    }
}

/// Fetch pages 2.. until the feed ends or a limit is hit, then cache the result.
async fn continue_in_background(
    shared: Arc<Shared>,
    mut articles: Vec<Article>,
    mut duplicates_removed: usize,
    started: Instant,
) -> LoadReport {
    let settings = &shared.settings;
    let max_pages = settings.max_pages();
    let mut status = LoadStatus::Complete;
    let mut pages_fetched = 1;
    let mut page = 2;

    while page <= max_pages && articles.len() < settings.max_posts {
        let fetched = match shared.source.load_page(page, settings.posts_per_page).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(page = page, error = %e, "Error fetching page, keeping partial results");
                status = LoadStatus::Partial {
                    failed_page: page,
                    error: e.to_string(),
                };
                break;
            }
        };
        pages_fetched += 1;

        let page_len = fetched.len();
        let mut has_more = page_len >= settings.posts_per_page;
        articles.extend(fetched);
        duplicates_removed += dedupe_articles(&mut articles);
        tracing::info!(
            page = page,
            count = page_len,
            total = articles.len(),
            "Fetched page"
        );

        if articles.len() >= settings.max_posts {
            tracing::info!(
                max_posts = settings.max_posts,
                "Reached maximum number of posts, stopping fetch"
            );
            articles.truncate(settings.max_posts);
            has_more = false;
        }

        shared.subscribers.publish(&articles);

        if !has_more || page == max_pages {
            break;
        }
        tokio::time::sleep(settings.page_delay).await;
        page += 1;
    }

    duplicates_removed += dedupe_articles(&mut articles);
    if duplicates_removed > 0 {
        tracing::info!(removed = duplicates_removed, "Removed duplicate articles");
    }
    tracing::info!(
        total = articles.len(),
        pages = pages_fetched,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Background article loading finished"
    );

    persist(&shared, &articles).await;

    let total = articles.len();
    let toast = match &status {
        LoadStatus::Complete => {
            Toast::success("All articles loaded").with_message(format!("{total} articles fetched"))
        }
        LoadStatus::Partial { failed_page, .. } => Toast::failure("Some articles could not be loaded")
            .with_message(format!("{total} articles fetched, page {failed_page} failed")),
    };
    shared.notifier.notify(toast);

    LoadReport {
        status,
        total,
        pages_fetched,
        duplicates_removed,
    }
}

async fn persist(shared: &Shared, articles: &[Article]) {
    let snapshot = CachedSnapshot::new(articles.to_vec());
    match shared.store.set(&snapshot).await {
        Ok(()) => tracing::info!(count = articles.len(), "Articles cached successfully"),
        Err(e) => tracing::warn!(error = %e, "Failed to cache articles"),
    }
}
