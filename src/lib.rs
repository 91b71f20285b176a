//! Bucket Cache - A sharded in-process key/value cache
//!
//! Provides per-item TTL expiration, atomic numeric mutation, eviction
//! notification, background expiry sweeps and snapshot persistence.

pub mod bucket;
pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use bucket::BucketCache;
pub use cache::{ShardedCache, Ttl, Value};
pub use config::Config;
pub use error::{CacheError, Result};
