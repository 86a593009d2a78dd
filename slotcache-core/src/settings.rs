//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ASK_TIMEOUT, DEFAULT_PASSIVATION_TIMEOUT, DEFAULT_SHARD_COUNT};

/// Configuration for a cache instance.
///
/// Supplied at construction time and immutable for the lifetime of
/// the cache.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How long a cell may be idle before it passivates.
    pub passivation_timeout: Duration,
    /// How long a client operation waits for a cell's reply.
    pub ask_timeout: Duration,
    /// Number of shards the key space is divided into. Must be at
    /// least 1.
    pub shard_count: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            passivation_timeout: DEFAULT_PASSIVATION_TIMEOUT,
            ask_timeout: DEFAULT_ASK_TIMEOUT,
            shard_count: DEFAULT_SHARD_COUNT,
        }
    }
}

impl CacheSettings {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the passivation timeout.
    pub fn passivation_timeout(mut self, timeout: Duration) -> Self {
        self.passivation_timeout = timeout;
        self
    }

    /// Sets the ask timeout.
    pub fn ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = timeout;
        self
    }

    /// Sets the shard count.
    pub fn shard_count(mut self, count: usize) -> Self {
        self.shard_count = count;
        self
    }
}
