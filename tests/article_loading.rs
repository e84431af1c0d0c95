//! Integration tests for the progressive article pipeline.
//!
//! A wiremock server plays the blog's paged RSS feed and each test gets its
//! own in-memory SQLite cache, so the whole path runs: HTTP fetch, XML parse,
//! background continuation, deduplication and snapshot persistence.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use caschy::feed::{ArticleLoader, Fetcher, LoadStatus, LoaderSettings, PageLoader};
use caschy::notify::{Notifier, Toast, ToastStyle};
use caschy::storage::{Article, CacheStore, CachedSnapshot, Database};
use chrono::Utc;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Recorder(Mutex<Vec<Toast>>);

impl Notifier for Recorder {
    fn notify(&self, toast: Toast) {
        self.0.lock().unwrap().push(toast);
    }
}

impl Recorder {
    fn titles(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|t| t.title.clone()).collect()
    }
}

fn rss_page(ids: impl IntoIterator<Item = usize>) -> String {
    let items: String = ids
        .into_iter()
        .map(|id| {
            format!(
                r#"<item>
  <title>Artikel {id}</title>
  <link>https://blog.example.com/artikel-{id}/</link>
  <pubDate>Mon, 04 Mar 2024 10:{:02}:00 +0000</pubDate>
  <dc:creator><![CDATA[Carsten Knobloch]]></dc:creator>
  <category><![CDATA[Android]]></category>
  <guid isPermaLink="false">https://blog.example.com/?p={id}</guid>
  <description><![CDATA[<p>Kurz {id}</p>]]></description>
</item>"#,
                id % 60
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel><title>Caschys Blog</title>{items}</channel>
</rss>"#
    )
}

async fn mount_page(server: &MockServer, page: usize, body: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/feed/"))
        .and(query_param("feed", "rss2"))
        .and(query_param("paged", page.to_string()))
        .respond_with(body)
        .expect(1)
        .mount(server)
        .await;
}

fn rss(ids: impl IntoIterator<Item = usize>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/rss+xml; charset=UTF-8")
        .set_body_string(rss_page(ids))
}

fn settings() -> LoaderSettings {
    LoaderSettings {
        page_delay: Duration::from_millis(10),
        ..LoaderSettings::default()
    }
}

struct Harness {
    loader: ArticleLoader,
    db: Database,
    toasts: Arc<Recorder>,
}

async fn harness(server: &MockServer, settings: LoaderSettings) -> Harness {
    let db = Database::open(":memory:").await.unwrap();
    let toasts = Arc::new(Recorder::default());
    let base = Url::parse(&format!("{}/feed/", server.uri())).unwrap();
    let pages = PageLoader::new(Fetcher::new(base).unwrap(), toasts.clone());
    let loader = ArticleLoader::new(
        Arc::new(pages),
        Arc::new(db.clone()),
        toasts.clone(),
        settings,
    );
    Harness { loader, db, toasts }
}

#[tokio::test]
async fn test_progressive_load_caches_complete_set() {
    let server = MockServer::start().await;
    mount_page(&server, 1, rss(1..=30)).await;
    mount_page(&server, 2, rss(31..=60)).await;
    mount_page(&server, 3, rss(61..=70)).await;

    let h = harness(&server, settings()).await;

    let sizes = Arc::new(Mutex::new(Vec::new()));
    let seen = sizes.clone();
    h.loader
        .subscribe(move |articles| seen.lock().unwrap().push(articles.len()));

    let first = h.loader.load(false).await;
    assert_eq!(first.len(), 30);
    assert_eq!(first[0].title, "Artikel 1");
    assert_eq!(first[0].creator.as_deref(), Some("Carsten Knobloch"));

    let report = h.loader.wait_for_background().await.unwrap();
    assert_eq!(report.status, LoadStatus::Complete);
    assert_eq!(report.total, 70);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(*sizes.lock().unwrap(), vec![30, 60, 70]);

    let snapshot = h.db.get().await.unwrap().unwrap();
    assert_eq!(snapshot.articles.len(), 70);
    assert_eq!(snapshot.articles[69].link, "https://blog.example.com/artikel-70/");

    assert_eq!(
        h.toasts.titles(),
        vec!["Loading more articles...", "All articles loaded"]
    );

    // Fresh cache: served without another request (each page mock expects 1).
    let cached = h.loader.load(false).await;
    assert_eq!(cached.len(), 70);
    assert!(h.loader.wait_for_background().await.is_none());
}

#[tokio::test]
async fn test_failed_page_keeps_partial_results() {
    let server = MockServer::start().await;
    mount_page(&server, 1, rss(1..=30)).await;
    mount_page(&server, 2, ResponseTemplate::new(503)).await;

    let h = harness(&server, settings()).await;

    assert_eq!(h.loader.load(false).await.len(), 30);
    let report = h.loader.wait_for_background().await.unwrap();

    match report.status {
        LoadStatus::Partial { failed_page, error } => {
            assert_eq!(failed_page, 2);
            assert!(error.contains("503"), "unexpected error: {error}");
        }
        other => panic!("expected partial load, got {other:?}"),
    }

    let snapshot = h.db.get().await.unwrap().unwrap();
    assert_eq!(snapshot.articles.len(), 30);

    let toasts = h.toasts.0.lock().unwrap();
    let last = toasts.last().unwrap();
    assert_eq!(last.style, ToastStyle::Failure);
    assert_eq!(last.title, "Some articles could not be loaded");
}

#[tokio::test]
async fn test_duplicates_across_pages_are_removed() {
    let server = MockServer::start().await;
    mount_page(&server, 1, rss(1..=30)).await;
    // The feed shifted by five posts between requests.
    mount_page(&server, 2, rss(26..=55)).await;
    mount_page(&server, 3, rss(56..=60)).await;

    let h = harness(&server, settings()).await;

    h.loader.load(false).await;
    let report = h.loader.wait_for_background().await.unwrap();

    assert_eq!(report.total, 60);
    assert_eq!(report.duplicates_removed, 5);

    let snapshot = h.db.get().await.unwrap().unwrap();
    let mut keys: Vec<&str> = snapshot.articles.iter().map(Article::identity_key).collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), 60);
}

#[tokio::test]
async fn test_max_posts_bounds_the_cycle() {
    let server = MockServer::start().await;
    mount_page(&server, 1, rss(1..=30)).await;
    mount_page(&server, 2, rss(31..=60)).await;

    let h = harness(
        &server,
        LoaderSettings {
            max_posts: 45,
            ..settings()
        },
    )
    .await;

    h.loader.load(false).await;
    let report = h.loader.wait_for_background().await.unwrap();

    assert_eq!(report.total, 45);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(h.db.get().await.unwrap().unwrap().articles.len(), 45);
}

#[tokio::test]
async fn test_short_first_page_is_cached_immediately() {
    let server = MockServer::start().await;
    mount_page(&server, 1, rss(1..=12)).await;

    let h = harness(&server, settings()).await;

    assert_eq!(h.loader.load(false).await.len(), 12);
    assert!(h.loader.wait_for_background().await.is_none());
    assert_eq!(h.db.get().await.unwrap().unwrap().articles.len(), 12);
    assert!(h.toasts.titles().is_empty());
}

#[tokio::test]
async fn test_outage_falls_back_to_stale_cache() {
    let server = MockServer::start().await;
    mount_page(&server, 1, ResponseTemplate::new(500)).await;

    let h = harness(&server, settings()).await;

    let mut stale = CachedSnapshot::new(vec![Article {
        title: "Von gestern".to_string(),
        link: "https://blog.example.com/gestern/".to_string(),
        published_at: String::new(),
        description: String::new(),
        content: None,
        creator: None,
        categories: Vec::new(),
        guid: None,
    }]);
    stale.fetched_at = Utc::now() - chrono::Duration::hours(3);
    h.db.set(&stale).await.unwrap();

    let articles = h.loader.load(false).await;
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Von gestern");
    assert_eq!(h.toasts.titles(), vec!["Error loading fresh articles"]);
}

#[tokio::test]
async fn test_outage_without_cache_yields_empty_list() {
    let server = MockServer::start().await;
    mount_page(&server, 1, ResponseTemplate::new(200).set_body_string("<html/>")).await;

    let h = harness(&server, settings()).await;

    assert!(h.loader.load(false).await.is_empty());
    assert_eq!(
        h.toasts.titles(),
        vec!["Error parsing RSS feed", "Error loading articles"]
    );
    assert!(h.db.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_force_refresh_bypasses_fresh_cache() {
    let server = MockServer::start().await;
    mount_page(&server, 1, rss(1..=5)).await;

    let h = harness(&server, settings()).await;
    h.db.set(&CachedSnapshot::new(Vec::new())).await.unwrap();

    let articles = h.loader.load(true).await;
    assert_eq!(articles.len(), 5);
    assert_eq!(h.db.get().await.unwrap().unwrap().articles.len(), 5);
}

#[tokio::test]
async fn test_empty_channel_after_full_pages_ends_the_feed() {
    let server = MockServer::start().await;
    mount_page(&server, 1, rss(1..=30)).await;
    mount_page(&server, 2, rss(31..=60)).await;
    // Exactly 60 posts: WordPress answers the next page with an empty channel.
    mount_page(&server, 3, rss(std::iter::empty::<usize>())).await;

    let h = harness(
        &server,
        LoaderSettings {
            max_posts: 120,
            ..settings()
        },
    )
    .await;

    h.loader.load(false).await;
    let report = h.loader.wait_for_background().await.unwrap();

    assert_eq!(report.status, LoadStatus::Complete);
    assert_eq!(report.total, 60);
    assert_eq!(h.db.get().await.unwrap().unwrap().articles.len(), 60);
    assert_eq!(
        h.toasts.titles(),
        vec!["Loading more articles...", "All articles loaded"]
    );
}
