//! Article snapshot persistence.
//!
//! The loader only talks to the [`CacheStore`] contract. [`Database`] is the
//! persistent implementation; [`MemoryCacheStore`] keeps the snapshot for the
//! lifetime of the process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use super::schema::Database;
use super::types::CachedSnapshot;

/// Storage key holding the JSON-serialized snapshot.
pub const CACHE_KEY: &str = "cached_articles";

/// Persistence contract for the most recent complete article set.
///
/// Implementations only need last-write-wins semantics.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self) -> Result<Option<CachedSnapshot>>;
    async fn set(&self, snapshot: &CachedSnapshot) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl CacheStore for Database {
    async fn get(&self) -> Result<Option<CachedSnapshot>> {
        let Some(raw) = self.get_value(CACHE_KEY).await? else {
            return Ok(None);
        };

        // A snapshot written by an incompatible build is as good as no snapshot.
        match serde_json::from_str::<CachedSnapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable article cache");
                Ok(None)
            }
        }
    }

    async fn set(&self, snapshot: &CachedSnapshot) -> Result<()> {
        let raw = serde_json::to_string(snapshot).context("Failed to serialize article cache")?;
        self.set_value(CACHE_KEY, &raw).await
    }

    async fn clear(&self) -> Result<()> {
        self.remove_value(CACHE_KEY).await?;
        Ok(())
    }
}

/// In-process snapshot store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    snapshot: Mutex<Option<CachedSnapshot>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: CachedSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CachedSnapshot>> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self) -> Result<Option<CachedSnapshot>> {
        Ok(self.slot().clone())
    }

    async fn set(&self, snapshot: &CachedSnapshot) -> Result<()> {
        *self.slot() = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}
