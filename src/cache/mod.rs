//! Cache Module
//!
//! Provides a sharded in-memory cache with TTL expiration, numeric
//! mutation, eviction notification and snapshot persistence.

mod hash;
mod item;
mod shard;
mod sharded;
mod snapshot;
mod value;


// Re-export public types
pub use hash::{djb33, generate_seed, OsSeedSource, SeedOrigin, SeedSource};
pub use item::{now_nanos, Item, Ttl};
pub use shard::{EvictionCallback, Shard};
pub use sharded::ShardedCache;
pub use snapshot::{read_items, write_items};
pub use value::{Numeric, Step, Value};

// == Public Constants ==
/// Shard count used when none is configured
pub const DEFAULT_SHARD_COUNT: usize = 16;
