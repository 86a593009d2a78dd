//! # Slotcache
//!
//! A key-addressable single-slot cache: each key maps to at most one
//! value, held by an independently-scheduled cell that is created
//! lazily on first access and tears itself down after a period of
//! inactivity.
//!
//! ## Features
//!
//! - **Per-key isolation**: one task per live key processes its
//!   mailbox strictly sequentially; operations on different keys never
//!   contend
//! - **Lazy creation, automatic passivation**: cells appear on first
//!   access and evict themselves when idle, with no global sweep
//! - **Sharded routing**: keys hash onto a fixed number of shards that
//!   bound routable-unit granularity
//! - **Classified failures**: every operation is bounded by an ask
//!   timeout and fails with a concrete error kind instead of blocking
//!
//! ## Example
//!
//! ```rust
//! use slotcache::{Cache, CacheSettings};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> slotcache::Result<()> {
//! let cache: Cache<u64> = Cache::with_settings(
//!     CacheSettings::new().passivation_timeout(Duration::from_secs(300)),
//! );
//!
//! cache.put("counter", 1).await?;
//! assert_eq!(cache.get("counter").await?, Some(1));
//!
//! cache.remove("counter").await?;
//! assert_eq!(cache.get("counter").await?, None);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

mod cell;
mod client;
mod router;
mod stats;

pub use client::Cache;
pub use stats::CacheStats;

// Re-export the core surface so callers need a single dependency.
pub use slotcache_core::{CacheError, CacheSettings, Result};
