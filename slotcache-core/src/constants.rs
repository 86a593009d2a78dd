//! Protocol constants for slotcache.
//!
//! Default timings and sizes shared by the settings type and the
//! runtime crate. All of these can be overridden per cache instance
//! through [`crate::CacheSettings`]; the values here are the
//! construction-time defaults.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// TIMINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// How long a cell may sit without receiving a message before it asks
/// to be stopped (passivation).
///
/// One hour: long enough that a working set stays resident, short
/// enough that abandoned keys do not pin memory indefinitely.
pub const DEFAULT_PASSIVATION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// How long a client operation waits for a cell's reply before it
/// fails with a timeout.
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(15);

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Default number of shards the key space is divided into.
///
/// Sharding bounds the number of independently routable units; it has
/// no effect on cache semantics. A key's shard is `hash(key) % shard_count`.
pub const DEFAULT_SHARD_COUNT: usize = 100;

/// Capacity of a cell's inbound mailbox.
///
/// Per-key traffic is low by construction (one slot per key), so a
/// small bound is enough; senders back-pressure instead of queueing
/// unboundedly against a slow cell.
pub const CELL_MAILBOX_CAPACITY: usize = 32;
