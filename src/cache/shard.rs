//! Cache Shard Module
//!
//! An independently locked partition of the key space with TTL expiry,
//! numeric mutation and snapshot support.

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::cache::item::now_nanos;
use crate::cache::snapshot;
use crate::cache::value::Step;
use crate::cache::{Item, Numeric, Ttl, Value};
use crate::error::{CacheError, Result};

/// Hook invoked with the key and value of an item removed by `delete` or
/// by an expiry sweep. Never invoked on overwrite or flush.
pub type EvictionCallback = Arc<dyn Fn(&str, Value) + Send + Sync>;

struct ShardState {
    items: HashMap<String, Item>,
    on_evicted: Option<EvictionCallback>,
}

// == Shard ==
/// Thread-safe storage for one partition of the cache.
///
/// Reads take the shared lock, writes the exclusive one. No call holds the
/// lock after it returns, and eviction callbacks always run after release.
pub struct Shard {
    /// Default TTL for `Ttl::Default` writes, None = never expire
    default_ttl: Option<Duration>,
    state: RwLock<ShardState>,
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Shard")
            .field("default_ttl", &self.default_ttl)
            .field("items", &state.items.len())
            .field("on_evicted", &state.on_evicted.is_some())
            .finish()
    }
}

impl Shard {
    // == Constructor ==
    /// Creates an empty shard. `default_ttl` of None means items written
    /// with `Ttl::Default` never expire.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            default_ttl,
            state: RwLock::new(ShardState {
                items: HashMap::new(),
                on_evicted: None,
            }),
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    // == Get ==
    /// Returns the value if present and live. Expired items are reported
    /// absent but left in place for the sweeper.
    pub fn get(&self, key: &str) -> Option<Value> {
        let state = self.state.read();
        state
            .items
            .get(key)
            .filter(|item| !item.is_expired())
            .map(|item| item.value.clone())
    }

    /// Like [`Shard::get`], also returning the expiration (None = never).
    pub fn get_with_expiration(&self, key: &str) -> Option<(Value, Option<DateTime<Utc>>)> {
        let state = self.state.read();
        state
            .items
            .get(key)
            .filter(|item| !item.is_expired())
            .map(|item| (item.value.clone(), item.expiration()))
    }

    // == Set ==
    /// Inserts or overwrites unconditionally. Overwrite never fires the
    /// eviction callback.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>, ttl: Ttl) {
        let item = Item::new(value.into(), ttl, self.default_ttl);
        self.state.write().items.insert(key.into(), item);
    }

    /// Inserts an item with a pre-resolved deadline, only if the key is
    /// absent or expired. Returns whether the item was stored.
    pub fn set_recover(&self, key: impl Into<String>, value: Value, expires_at: Option<i64>) -> bool {
        let key = key.into();
        let mut state = self.state.write();
        if live(&state.items, &key) {
            return false;
        }
        state.items.insert(key, Item::with_deadline(value, expires_at));
        true
    }

    // == Add ==
    /// Inserts only if the key is absent or its item has expired.
    pub fn add(&self, key: impl Into<String>, value: impl Into<Value>, ttl: Ttl) -> Result<()> {
        let key = key.into();
        let mut state = self.state.write();
        if live(&state.items, &key) {
            return Err(CacheError::AlreadyExists(key));
        }
        let item = Item::new(value.into(), ttl, self.default_ttl);
        state.items.insert(key, item);
        Ok(())
    }

    // == Replace ==
    /// Overwrites only if the key holds a live item.
    pub fn replace(&self, key: impl Into<String>, value: impl Into<Value>, ttl: Ttl) -> Result<()> {
        let key = key.into();
        let mut state = self.state.write();
        if !live(&state.items, &key) {
            return Err(CacheError::NotFound(key));
        }
        let item = Item::new(value.into(), ttl, self.default_ttl);
        state.items.insert(key, item);
        Ok(())
    }

    // == Delete ==
    /// Removes the key if present and fires the eviction callback with the
    /// removed value. Absent keys are a no-op. Returns whether a key was removed.
    pub fn delete(&self, key: &str) -> bool {
        let (removed, callback) = {
            let mut state = self.state.write();
            let removed = state.items.remove(key);
            (removed, state.on_evicted.clone())
        };

        match (removed, callback) {
            (Some(item), Some(callback)) => {
                callback(key, item.value);
                true
            }
            (removed, _) => removed.is_some(),
        }
    }

    // == Numeric Mutation ==
    /// Adds `delta` to any numeric value, cast to the stored width.
    pub fn increment(&self, key: &str, delta: i64) -> Result<()> {
        self.mutate(key, "numeric", |v| v.step_by_int(delta, Step::Increment))
            .map(|_| ())
    }

    /// Subtracts `delta` from any numeric value, cast to the stored width.
    pub fn decrement(&self, key: &str, delta: i64) -> Result<()> {
        self.mutate(key, "numeric", |v| v.step_by_int(delta, Step::Decrement))
            .map(|_| ())
    }

    /// Adds `delta` to an `f32` or `f64` value.
    pub fn increment_float(&self, key: &str, delta: f64) -> Result<()> {
        self.mutate(key, "f32 or f64", |v| v.step_by_float(delta, Step::Increment))
            .map(|_| ())
    }

    /// Subtracts `delta` from an `f32` or `f64` value.
    pub fn decrement_float(&self, key: &str, delta: f64) -> Result<()> {
        self.mutate(key, "f32 or f64", |v| v.step_by_float(delta, Step::Decrement))
            .map(|_| ())
    }

    /// Adds a same-kind delta and returns the new value.
    pub fn increment_by<N: Numeric>(&self, key: &str, delta: N) -> Result<N> {
        self.step_typed(key, delta, Step::Increment)
    }

    /// Subtracts a same-kind delta and returns the new value.
    pub fn decrement_by<N: Numeric>(&self, key: &str, delta: N) -> Result<N> {
        self.step_typed(key, delta, Step::Decrement)
    }

    fn step_typed<N: Numeric>(&self, key: &str, delta: N, step: Step) -> Result<N> {
        let mut next = None;
        self.mutate(key, N::KIND, |v| {
            let n = N::from_value(v)?.apply(delta, step);
            next = Some(n);
            Some(n.into())
        })?;
        next.ok_or_else(|| CacheError::WrongType {
            key: key.to_string(),
            expected: N::KIND,
        })
    }

    // Replaces the whole item under the write lock, keeping its deadline.
    fn mutate<F>(&self, key: &str, expected: &'static str, f: F) -> Result<Value>
    where
        F: FnOnce(&Value) -> Option<Value>,
    {
        let mut state = self.state.write();
        let item = match state.items.get(key) {
            Some(item) if !item.is_expired() => item,
            _ => return Err(CacheError::NotFound(key.to_string())),
        };

        let value = f(&item.value).ok_or_else(|| CacheError::WrongType {
            key: key.to_string(),
            expected,
        })?;

        let replaced = Item::with_deadline(value.clone(), item.expires_at);
        state.items.insert(key.to_string(), replaced);
        Ok(value)
    }

    // == Sweep Expired ==
    /// Removes every expired item. Returns the number removed.
    ///
    /// The eviction callback runs once per removed key after the lock is
    /// released, so it may safely call back into this shard.
    pub fn sweep_expired(&self) -> usize {
        let now = now_nanos();
        let (evicted, callback) = {
            let mut state = self.state.write();
            let expired: Vec<String> = state
                .items
                .iter()
                .filter(|(_, item)| item.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();

            let evicted: Vec<(String, Item)> = expired
                .into_iter()
                .filter_map(|key| state.items.remove_entry(&key))
                .collect();
            (evicted, state.on_evicted.clone())
        };

        let count = evicted.len();
        if let Some(callback) = callback {
            for (key, item) in evicted {
                callback(&key, item.value);
            }
        }
        count
    }

    /// Installs (or clears with None) the eviction callback.
    pub fn set_eviction_callback(&self, callback: Option<EvictionCallback>) {
        self.state.write().on_evicted = callback;
    }

    // == Snapshot ==
    /// Copies the live items. Does not remove expired ones.
    pub fn snapshot_live_items(&self) -> HashMap<String, Item> {
        let now = now_nanos();
        let state = self.state.read();
        state
            .items
            .iter()
            .filter(|(_, item)| !item.is_expired_at(now))
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect()
    }

    /// Number of stored items, including expired ones not yet swept.
    pub fn count(&self) -> usize {
        self.state.read().items.len()
    }

    /// Drops every item without firing the eviction callback.
    pub fn flush(&self) {
        self.state.write().items.clear();
    }

    // == Save / Load ==
    /// Writes every stored item, expired or not, to `writer`.
    ///
    /// The lock is held only while the items are copied, not during I/O.
    pub fn save<W: Write>(&self, writer: W) -> Result<usize> {
        let items = self.state.read().items.clone();
        snapshot::write_items(writer, &items)
    }

    /// Restores items from `reader`, skipping expired records and keys that
    /// already hold a live item. Returns the number of items restored.
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
}

fn live(items: &HashMap<String, Item>, key: &str) -> bool {
    items.get(key).is_some_and(|item| !item.is_expired())
}
