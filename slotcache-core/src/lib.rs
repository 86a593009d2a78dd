//! # Slotcache Core
//!
//! Core types, errors, and settings for the slotcache single-slot cache.
//!
//! This crate provides the foundational building blocks used by the
//! runtime crate:
//!
//! - **Errors**: the operation error taxonomy with classification helpers
//! - **Settings**: per-instance configuration with sensible defaults
//! - **Constants**: default timings and routing parameters
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use slotcache_core::CacheSettings;
//!
//! let settings = CacheSettings::new()
//!     .passivation_timeout(Duration::from_secs(300))
//!     .shard_count(16);
//! assert_eq!(settings.shard_count, 16);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod settings;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{CacheError, Result};
pub use settings::CacheSettings;
