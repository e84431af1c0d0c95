mod cache;
mod kv;
mod schema;
mod types;

pub use cache::{CacheStore, MemoryCacheStore, CACHE_KEY};
pub use schema::Database;
pub use types::{Article, CachedSnapshot, DatabaseError};
