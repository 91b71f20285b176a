//! Cache Item Module
//!
//! Defines a stored value together with its absolute expiration instant.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Value;

// == Ttl ==
/// Expiration policy requested by a caller when writing an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the shard's configured default.
    #[default]
    Default,
    /// The item never expires.
    Never,
    /// The item expires after the given duration. A zero duration means
    /// the same as [`Ttl::Default`].
    After(Duration),
}

impl Ttl {
    /// Resolves this policy against a default into an absolute deadline.
    ///
    /// `default_ttl` of `None` means "never expire".
    pub fn deadline(self, default_ttl: Option<Duration>) -> Option<i64> {
        let ttl = match self {
            Ttl::Never => None,
            Ttl::After(d) if !d.is_zero() => Some(d),
            Ttl::After(_) | Ttl::Default => default_ttl,
        };
        ttl.map(|d| now_nanos().saturating_add(duration_nanos(d)))
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::After(d)
    }
}

// == Item ==
/// A single stored value plus its expiration.
///
/// Items are replaced whole on every write; fields are never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The stored value
    pub value: Value,
    /// Expiration timestamp (Unix nanoseconds), None = no expiration
    pub expires_at: Option<i64>,
}

impl Item {
    // == Constructor ==
    /// Creates an item whose deadline is resolved from `ttl`.
    pub fn new(value: Value, ttl: Ttl, default_ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.deadline(default_ttl),
        }
    }

    /// Creates an item with an already-resolved deadline.
    pub fn with_deadline(value: Value, expires_at: Option<i64>) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the item has expired.
    ///
    /// An item is live iff it has no deadline or `now < expires_at`, so it
    /// is expired from the deadline instant onward.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_nanos())
    }

    /// Same as [`Item::is_expired`] against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Returns the deadline as a UTC timestamp, or None if it never expires.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expires_at.map(DateTime::<Utc>::from_timestamp_nanos)
    }

    /// Returns remaining time to live, or None if no expiration is set.
    ///
    /// Expired items report `Some(Duration::ZERO)`.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            let remaining = expires.saturating_sub(now_nanos());
            Duration::from_nanos(remaining.max(0) as u64)
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in nanoseconds.
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

fn duration_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}
