//! Configuration file parser for ~/.config/caschy/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::{LoaderSettings, DEFAULT_MAX_POSTS, DEFAULT_POSTS_PER_PAGE};

pub const DEFAULT_FEED_URL: &str = "https://www.stadt-bremerhaven.de/feed/";
pub const DEFAULT_API_BASE_URL: &str = "https://stadt-bremerhaven.de/wp-json/wp/v2";

const ENV_POSTS_PER_PAGE: &str = "CASCHY_POSTS_PER_PAGE";
const ENV_MAX_POSTS: &str = "CASCHY_MAX_POSTS";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid URL for `{key}`: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The two page limits accept numbers or strings; anything that is not a
/// positive integer counts as unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Articles requested per feed page.
    #[serde(deserialize_with = "lenient_count")]
    pub posts_per_page: Option<usize>,

    /// Upper bound on articles kept per load cycle.
    #[serde(deserialize_with = "lenient_count")]
    pub max_posts: Option<usize>,

    /// RSS feed endpoint; page parameters are appended as a query string.
    pub feed_url: String,

    /// WordPress REST API base used by search.
    pub api_base_url: String,

    /// Minutes a cached article list stays fresh.
    pub cache_ttl_minutes: u64,

    /// Pause between background page requests, in milliseconds.
    pub page_delay_ms: u64,

    /// Number of search results requested.
    pub search_results: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            posts_per_page: None,
            max_posts: None,
            feed_url: DEFAULT_FEED_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_ttl_minutes: 60,
            page_delay_ms: 500,
            search_results: 10,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "posts_per_page",
        "max_posts",
        "feed_url",
        "api_base_url",
        "cache_ttl_minutes",
        "page_delay_ms",
        "search_results",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            posts_per_page = config.posts_per_page(),
            max_posts = config.max_posts(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply `CASCHY_POSTS_PER_PAGE` / `CASCHY_MAX_POSTS` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Invalid values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(ENV_POSTS_PER_PAGE) {
            match parse_count(&value) {
                Some(n) => self.posts_per_page = Some(n),
                None => tracing::warn!(value = %value, "Ignoring invalid {ENV_POSTS_PER_PAGE}"),
            }
        }
        if let Some(value) = lookup(ENV_MAX_POSTS) {
            match parse_count(&value) {
                Some(n) => self.max_posts = Some(n),
                None => tracing::warn!(value = %value, "Ignoring invalid {ENV_MAX_POSTS}"),
            }
        }
    }

    pub fn posts_per_page(&self) -> usize {
        self.posts_per_page.unwrap_or(DEFAULT_POSTS_PER_PAGE)
    }

    pub fn max_posts(&self) -> usize {
        self.max_posts.unwrap_or(DEFAULT_MAX_POSTS)
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            posts_per_page: self.posts_per_page(),
            max_posts: self.max_posts(),
            cache_ttl: Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60)),
            page_delay: Duration::from_millis(self.page_delay_ms),
        }
    }

    pub fn feed_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.feed_url).map_err(|source| ConfigError::InvalidUrl {
            key: "feed_url",
            source,
        })
    }

    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api_base_url).map_err(|source| ConfigError::InvalidUrl {
            key: "api_base_url",
            source,
        })
    }
}

/// Parse a positive integer count; zero, negative and non-numeric are `None`.
pub fn parse_count(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
        Other(toml::Value),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => usize::try_from(n).ok().filter(|n| *n > 0),
        Raw::Text(s) => parse_count(&s),
        Raw::Other(value) => {
            tracing::warn!(value = %value, "Ignoring non-numeric page limit");
            None
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
