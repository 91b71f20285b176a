//! Sharded Cache Module
//!
//! Routes each key to one of N independently locked shards and fans
//! whole-cache operations out across all of them.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::hash::{djb33, generate_seed, OsSeedSource, SeedOrigin, SeedSource};
use crate::cache::item::now_nanos;
use crate::cache::shard::EvictionCallback;
use crate::cache::{snapshot, Item, Numeric, Shard, Ttl, Value};
use crate::error::Result;

// == Sharded Cache ==
/// A cache partitioned into a fixed number of shards.
///
/// The seed and shard count never change after construction, so a key
/// always routes to the same shard for the lifetime of an instance.
/// Fan-out operations visit shards one at a time with no cross-shard
/// atomicity.
#[derive(Debug)]
pub struct ShardedCache {
    seed: u32,
    seed_origin: SeedOrigin,
    shards: Vec<Shard>,
}

impl ShardedCache {
    // == Constructors ==
    /// Creates a cache with a seed drawn from the OS random source.
    ///
    /// A `shard_count` of 0 is clamped to 1. A `default_ttl` of None or
    /// zero means items written with `Ttl::Default` never expire.
    pub fn new(shard_count: usize, default_ttl: Option<Duration>) -> Self {
        Self::with_seed_source(shard_count, default_ttl, &OsSeedSource)
    }

    /// Creates a cache drawing its seed from `source`.
    pub fn with_seed_source(
        shard_count: usize,
        default_ttl: Option<Duration>,
        source: &dyn SeedSource,
    ) -> Self {
        let (seed, origin) = generate_seed(source);
        Self::build(shard_count, default_ttl, seed, origin)
    }

    /// Creates a cache with a fixed seed.
    pub fn with_seed(shard_count: usize, default_ttl: Option<Duration>, seed: u32) -> Self {
        Self::build(shard_count, default_ttl, seed, SeedOrigin::Secure)
    }

    fn build(
        shard_count: usize,
        default_ttl: Option<Duration>,
        seed: u32,
        seed_origin: SeedOrigin,
    ) -> Self {
        let shard_count = if shard_count == 0 {
            warn!("Shard count of 0 requested, using 1 shard");
            1
        } else {
            shard_count.min(u32::MAX as usize)
        };
        let default_ttl = default_ttl.filter(|d| !d.is_zero());

        let shards = (0..shard_count).map(|_| Shard::new(default_ttl)).collect();
        info!(
            "Sharded cache created: shards={}, default_ttl={:?}",
            shard_count, default_ttl
        );

        Self {
            seed,
            seed_origin,
            shards,
        }
    }

    // == Routing ==
    /// Returns the index of the shard that owns `key`.
    pub fn route_key(&self, key: &str) -> usize {
        let n = self.shards.len();
        if n == 1 {
            return 0;
        }
        (djb33(self.seed, key) % n as u32) as usize
    }

    fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.route_key(key)]
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Whether the seed came from the secure source or the fallback.
    pub fn seed_origin(&self) -> SeedOrigin {
        self.seed_origin
    }

    // == Single-Key Operations ==
    pub fn get(&self, key: &str) -> Option<Value> {
        self.shard(key).get(key)
    }

    pub fn get_with_expiration(&self, key: &str) -> Option<(Value, Option<DateTime<Utc>>)> {
        self.shard(key).get_with_expiration(key)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>, ttl: Ttl) {
        let key = key.into();
        let shard = self.shard(&key);
        shard.set(key, value, ttl);
    }

    /// Sets with the configured default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.set(key, value, Ttl::Default);
    }

    /// Inserts with a raw deadline unless the key holds a live item.
    pub fn set_recover(&self, key: impl Into<String>, value: Value, expires_at: Option<i64>) -> bool {
        let key = key.into();
        let shard = self.shard(&key);
        shard.set_recover(key, value, expires_at)
    }

    pub fn add(&self, key: impl Into<String>, value: impl Into<Value>, ttl: Ttl) -> Result<()> {
        let key = key.into();
        let shard = self.shard(&key);
        shard.add(key, value, ttl)
    }

    pub fn replace(&self, key: impl Into<String>, value: impl Into<Value>, ttl: Ttl) -> Result<()> {
        let key = key.into();
        let shard = self.shard(&key);
        shard.replace(key, value, ttl)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.shard(key).delete(key)
    }

    pub fn increment(&self, key: &str, delta: i64) -> Result<()> {
        self.shard(key).increment(key, delta)
    }

    pub fn decrement(&self, key: &str, delta: i64) -> Result<()> {
        self.shard(key).decrement(key, delta)
    }

    pub fn increment_float(&self, key: &str, delta: f64) -> Result<()> {
        self.shard(key).increment_float(key, delta)
    }

    pub fn decrement_float(&self, key: &str, delta: f64) -> Result<()> {
        self.shard(key).decrement_float(key, delta)
    }

    pub fn increment_by<N: Numeric>(&self, key: &str, delta: N) -> Result<N> {
        self.shard(key).increment_by(key, delta)
    }

    pub fn decrement_by<N: Numeric>(&self, key: &str, delta: N) -> Result<N> {
        self.shard(key).decrement_by(key, delta)
    }

    // == Fan-out Operations ==
    /// Clears every shard. Eviction callbacks are not fired.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.flush();
        }
    }

    /// Sweeps expired items from every shard. Returns the total removed.
    pub fn sweep_expired(&self) -> usize {
        self.shards.iter().map(Shard::sweep_expired).sum()
    }

    /// Installs the same eviction callback on every shard.
    ///
    /// The callback may run concurrently from different shards.
    pub fn on_evicted<F>(&self, callback: F)
    where
        F: Fn(&str, Value) + Send + Sync + 'static,
    {
        let callback: EvictionCallback = std::sync::Arc::new(callback);
        for shard in &self.shards {
            shard.set_eviction_callback(Some(callback.clone()));
        }
    }

    pub fn clear_eviction_callback(&self) {
        for shard in &self.shards {
            shard.set_eviction_callback(None);
        }
    }

    /// Live items of each shard, indexed by shard.
    pub fn snapshot_all(&self) -> Vec<HashMap<String, Item>> {
        self.shards.iter().map(Shard::snapshot_live_items).collect()
    }

    /// Stored item count of each shard, expired-but-unswept included.
    pub fn count_all(&self) -> Vec<usize> {
        self.shards.iter().map(Shard::count).collect()
    }

    /// Total stored item count across shards.
    pub fn len(&self) -> usize {
        self.count_all().iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Persistence ==
    /// Writes shard `i` to `{base}_{i}`. Returns the number of records written.
    ///
    /// Files left at higher indexes by an earlier save with more shards are
    /// removed, so [`ShardedCache::load_shard_files`] reads only this save.
    pub fn save_to_file(&self, base: impl AsRef<Path>) -> Result<usize> {
        let base = base.as_ref();
        let mut written = 0;
        for (index, shard) in self.shards.iter().enumerate() {
            let path = shard_file(base, index);
            let file = File::create(&path)?;
            written += shard.save(file)?;
            debug!("Saved shard {} to {}", index, path.display());
        }

        for index in self.shards.len().. {
            let path = shard_file(base, index);
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale snapshot {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            "Snapshot saved: {} records across {} files at {}_*",
            written,
            self.shards.len(),
            base.display()
        );
        Ok(written)
    }

    /// Restores one snapshot stream, routing each record by key.
    ///
    /// Records already expired are dropped and live keys are not
    /// overwritten. Returns the number of items restored.
    pub fn load<R: Read>(&self, reader: R) -> Result<usize> {
        let records = snapshot::read_items(reader)?;
        let now = now_nanos();

        let mut restored = 0;
        for (key, item) in records {
            if !item.is_expired_at(now) && self.set_recover(key, item.value, item.expires_at) {
                restored += 1;
            }
        }
        Ok(restored)
    }

    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let file = File::open(path.as_ref())?;
        self.load(file)
    }

    /// Restores every `{base}_{i}` file, starting at 0 and stopping at the
    /// first missing index. The shard count that wrote them may differ.
    pub fn load_shard_files(&self, base: impl AsRef<Path>) -> Result<usize> {
        let base = base.as_ref();
        let mut restored = 0;

        for index in 0.. {
            let path = shard_file(base, index);
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            };
            restored += self.load(file)?;
            debug!("Loaded {}", path.display());
        }

        info!("Snapshot restored: {} items from {}_*", restored, base.display());
        Ok(restored)
    }
}

fn shard_file(base: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!("_{}", index));
    PathBuf::from(name)
}
