use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use caschy::config::Config;
use caschy::feed::{ArticleLoader, Fetcher, LoadStatus, PageLoader};
use caschy::notify::{ConsoleNotifier, Notifier};
use caschy::render::{detail_markdown, list_row};
use caschy::search::SearchClient;
use caschy::storage::{Article, CacheStore, Database, DatabaseError, MemoryCacheStore};
use caschy::welcome::welcome_message;

/// Get the config directory path (~/.config/caschy/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("caschy"))
}

#[derive(Parser, Debug)]
#[command(name = "caschy", version, about = "Read and search Caschys Blog from the terminal")]
struct Args {
    /// Keep the article cache in memory only
    #[arg(long, global = true)]
    no_cache_file: bool,

    /// Config file (default: ~/.config/caschy/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the latest articles
    Latest {
        /// Ignore the cache and fetch fresh articles
        #[arg(long)]
        refresh: bool,

        /// Print at most N articles
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Return after the first page instead of waiting for the rest
        #[arg(long)]
        no_wait: bool,
    },
    /// Show one article from the last list as markdown
    Show {
        /// 1-based position in `caschy latest`
        index: usize,
    },
    /// Open one article from the last list in the browser
    Open {
        /// 1-based position in `caschy latest`
        index: usize,
    },
    /// Search the blog, e.g. `caschy search kindle by Carsten after 2024-01-01`
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the welcome message with sample queries as JSON
    Welcome,
    /// Delete the cached article list
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // SEC-007: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env();

    match args.command {
        Command::Welcome => {
            println!("{}", serde_json::to_string_pretty(&welcome_message())?);
        }
        Command::Search { query, json } => {
            let client = SearchClient::new(config.api_base_url()?)
                .context("Failed to create search client")?
                .with_per_page(config.search_results);
            let results = client.search(&query.join(" ")).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                eprintln!("No results.");
            } else {
                for result in &results {
                    println!("{}\n  {}\n  {}\n", result.title, result.url, result.snippet);
                }
            }
        }
        Command::ClearCache => {
            let loader = build_loader(&config, &config_dir, args.no_cache_file).await?;
            loader.clear_cache().await;
            println!("Cache cleared.");
        }
        Command::Latest {
            refresh,
            limit,
            no_wait,
        } => {
            let loader = build_loader(&config, &config_dir, args.no_cache_file).await?;

            let latest: Arc<Mutex<Option<Vec<Article>>>> = Arc::new(Mutex::new(None));
            let sink = Arc::clone(&latest);
            let subscription = loader.subscribe(move |articles| {
                if let Ok(mut slot) = sink.lock() {
                    *slot = Some(articles.to_vec());
                }
            });

            let mut articles = loader.load(refresh).await;

            if !no_wait {
                if let Some(report) = loader.wait_for_background().await {
                    if let LoadStatus::Partial { failed_page, error } = &report.status {
                        tracing::warn!(failed_page, error = %error, "Article list is incomplete");
                    }
                    if let Some(full) = latest.lock().ok().and_then(|mut slot| slot.take()) {
                        articles = full;
                    }
                }
            }
            loader.unsubscribe(subscription);

            let now = Local::now();
            let shown = limit.unwrap_or(articles.len());
            for (i, article) in articles.iter().take(shown).enumerate() {
                println!("{}", list_row(i + 1, article, &now));
            }
            if articles.is_empty() {
                eprintln!("No articles.");
            }
        }
        Command::Show { index } => {
            let loader = build_loader(&config, &config_dir, args.no_cache_file).await?;
            let article = article_at(&loader, index).await?;
            println!("{}", detail_markdown(&article, &Local::now()));
        }
        Command::Open { index } => {
            let loader = build_loader(&config, &config_dir, args.no_cache_file).await?;
            let article = article_at(&loader, index).await?;
            open::that(&article.link)
                .with_context(|| format!("Failed to open {}", article.link))?;
            println!("Opened {}", article.link);
        }
    }

    Ok(())
}

async fn build_loader(
    config: &Config,
    config_dir: &std::path::Path,
    in_memory: bool,
) -> Result<ArticleLoader> {
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

    let store: Arc<dyn CacheStore> = if in_memory {
        Arc::new(MemoryCacheStore::new())
    } else {
        let db_path = config_dir.join("cache.db");
        let db_path_str = db_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
        match Database::open(db_path_str).await {
            Ok(db) => Arc::new(db),
            Err(DatabaseError::InstanceLocked) => {
                anyhow::bail!(
                    "Another instance of caschy appears to be running. Please close it and try again."
                );
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
        }
    };

    let fetcher = Fetcher::new(config.feed_url()?).context("Failed to create HTTP client")?;
    let pages = Arc::new(PageLoader::new(fetcher, Arc::clone(&notifier)));

    Ok(ArticleLoader::new(
        pages,
        store,
        notifier,
        config.loader_settings(),
    ))
}

/// Article at 1-based `index` in the cached list, loading it first if needed.
async fn article_at(loader: &ArticleLoader, index: usize) -> Result<Article> {
    let articles = match loader.cached_articles().await {
        Some(articles) => articles,
        None => {
            let first = loader.load(false).await;
            loader.wait_for_background().await;
            loader.cached_articles().await.unwrap_or(first)
        }
    };

    let count = articles.len();
    index
        .checked_sub(1)
        .and_then(|i| articles.into_iter().nth(i))
        .ok_or_else(|| anyhow::anyhow!("No article #{index} (have {count})"))
}
