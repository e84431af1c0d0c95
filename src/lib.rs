//! Client for Caschys Blog: progressive RSS loading with a local cache, plus
//! search through the WordPress REST API.

pub mod config;
pub mod feed;
pub mod notify;
pub mod render;
pub mod search;
pub mod storage;
pub mod util;
pub mod welcome;
