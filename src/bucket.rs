//! Bucket Cache Facade
//!
//! Assembles a [`ShardedCache`] with an optional expiry janitor and ties the
//! janitor's lifetime to the facade.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::ShardedCache;
use crate::config::Config;
use crate::error::Result;
use crate::tasks::{Janitor, JanitorState};

// == Bucket Cache ==
/// Public entry point: a sharded cache plus its background sweeper.
///
/// The whole [`ShardedCache`] surface is available through `Deref`. Call
/// [`BucketCache::close`] (or drop the facade) to stop the janitor; there
/// is no finalizer-based cleanup.
#[derive(Debug)]
pub struct BucketCache {
    cache: Arc<ShardedCache>,
    janitor: Option<Janitor>,
}

impl BucketCache {
    // == Constructors ==
    /// Creates a cache with `shard_count` shards.
    ///
    /// A zero `cleanup_interval` disables the janitor. A positive one
    /// spawns it on the current tokio runtime, which must exist.
    pub fn new(
        shard_count: usize,
        default_ttl: Option<Duration>,
        cleanup_interval: Duration,
    ) -> Result<Self> {
        Self::with_cache(ShardedCache::new(shard_count, default_ttl), cleanup_interval)
    }

    /// Creates a cache from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.shard_count, config.ttl(), config.sweep_interval())
    }

    /// Wraps an already-built sharded cache.
    pub fn with_cache(cache: ShardedCache, cleanup_interval: Duration) -> Result<Self> {
        let cache = Arc::new(cache);

        let janitor = if cleanup_interval.is_zero() {
            info!("Cleanup interval is zero, expiry janitor disabled");
            None
        } else {
            let janitor = Janitor::new(cleanup_interval);
            janitor.start(Arc::clone(&cache))?;
            Some(janitor)
        };

        Ok(Self { cache, janitor })
    }

    /// Shared handle to the underlying sharded cache.
    pub fn shared(&self) -> Arc<ShardedCache> {
        Arc::clone(&self.cache)
    }

    /// Janitor lifecycle state, or None if no janitor was configured.
    pub fn janitor_state(&self) -> Option<JanitorState> {
        self.janitor.as_ref().map(Janitor::state)
    }

    // == Close ==
    /// Stops the janitor. Returns false if there was nothing to stop.
    ///
    /// The stop takes effect at the janitor's next await point, so one
    /// sweep already in progress may still complete.
    pub fn close(&self) -> bool {
        self.janitor.as_ref().is_some_and(Janitor::stop)
    }

    /// Stops the janitor and waits for its task to exit.
    pub async fn shutdown(&self) {
        if let Some(janitor) = &self.janitor {
            janitor.shutdown().await;
        }
    }
}

impl Deref for BucketCache {
    type Target = ShardedCache;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl Drop for BucketCache {
    fn drop(&mut self) {
        self.close();
    }
}
