//! Background Tasks Module
//!
//! Contains background tasks that run alongside a cache instance.
//!
//! # Tasks
//! - Expiry janitor: sweeps expired items from every shard at a fixed interval

mod janitor;

pub use janitor::{Janitor, JanitorState};
