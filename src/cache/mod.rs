//! Cache module for holding the latest fuel price snapshot in memory
//!
//! This module provides a price cache with a fixed TTL (time-to-live). Stale or
//! missing snapshots are refreshed on demand, with at most one upstream fetch in
//! flight at a time no matter how many callers are waiting on it.

mod manager;

pub use manager::{CacheStatus, PriceCache};
