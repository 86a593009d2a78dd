//! Deterministic, lazy, single-writer-per-key dispatch.
//!
//! The router maps every key to a shard (`hash(key) % shard_count`)
//! and, within the shard, to the live cell for that key. Cells are
//! materialized on first message and the same instance receives every
//! message for its key while it is alive, which is what gives the
//! cache its per-key sequential ordering. The router holds no value
//! state of its own.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use slotcache_core::constants::CELL_MAILBOX_CAPACITY;
use slotcache_core::CacheSettings;

use crate::cell::{Cell, CellMsg};
use crate::stats::{CacheStats, Counters};

/// Handle to a live cell: its identity plus the sending half of its
/// mailbox.
pub(crate) struct CellHandle<V> {
    pub(crate) id: u64,
    pub(crate) tx: mpsc::Sender<CellMsg<V>>,
}

impl<V> Clone for CellHandle<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

/// Maps a key to its shard slot.
fn shard_index(key: &str, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % shard_count
}

/// The key→cell routing table, sharded to bound the scope of any
/// single lock to one entry operation.
pub(crate) struct Router<V> {
    shards: Vec<DashMap<String, CellHandle<V>>>,
    settings: CacheSettings,
    counters: Counters,
    next_cell_id: AtomicU64,
}

impl<V> Router<V>
where
    V: Clone + Send + 'static,
{
    pub(crate) fn new(settings: CacheSettings) -> Self {
        let shards = (0..settings.shard_count).map(|_| DashMap::new()).collect();
        Self {
            shards,
            settings,
            counters: Counters::default(),
            next_cell_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Forwards a message to the live cell for `key`, materializing
    /// one if none exists.
    ///
    /// A cell may close its mailbox between our lookup and the send
    /// (passivation is its own decision); in that case the stale
    /// record is cleared and the message retried against a fresh cell.
    pub(crate) async fn send(self: &Arc<Self>, key: &str, msg: CellMsg<V>) {
        let mut msg = msg;
        loop {
            let handle = self.live_or_spawn(key);
            match handle.tx.send(msg).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    debug!(key, id = handle.id, "cell closed mid-send, rerouting");
                    self.forget(key, handle.id);
                    msg = returned;
                }
            }
        }
    }

    /// Re-forwards a message a stopping cell drained from its own
    /// mailbox, so it reaches the key's next incarnation.
    pub(crate) async fn redeliver(self: &Arc<Self>, key: &str, msg: CellMsg<V>) {
        debug!(key, "redelivering message queued during passivation");
        self.send(key, msg).await;
    }

    /// Clears the routing record for `key`, but only if it still
    /// points at the cell with identity `id`. A fresh cell installed
    /// moments before a dying cell deregisters must not lose its
    /// record.
    pub(crate) fn forget(&self, key: &str, id: u64) {
        let shard = &self.shards[shard_index(key, self.shards.len())];
        let removed = shard.remove_if(key, |_, handle| handle.id == id);
        if removed.is_some() {
            debug!(key, id, "cell deregistered");
        }
    }

    /// Returns a statistics snapshot including the live cell count.
    pub(crate) fn stats(&self) -> CacheStats {
        let live_cells = self
            .shards
            .iter()
            .map(|shard| {
                shard
                    .iter()
                    .filter(|entry| !entry.value().tx.is_closed())
                    .count()
            })
            .sum();
        self.counters.snapshot(live_cells)
    }

    /// Looks up the live cell for `key`, spawning one when there is
    /// none. Spawning happens under the entry so two racing callers
    /// cannot both install a cell for the same key.
    fn live_or_spawn(self: &Arc<Self>, key: &str) -> CellHandle<V> {
        let shard = &self.shards[shard_index(key, self.shards.len())];
        match shard.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().tx.is_closed() {
                    let fresh = self.spawn_cell(key);
                    occupied.insert(fresh.clone());
                    fresh
                } else {
                    occupied.get().clone()
                }
            }
            Entry::Vacant(vacant) => {
                let fresh = self.spawn_cell(key);
                vacant.insert(fresh.clone());
                fresh
            }
        }
    }

    fn spawn_cell(self: &Arc<Self>, key: &str) -> CellHandle<V> {
        let id = self.next_cell_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CELL_MAILBOX_CAPACITY);
        let cell = Cell::new(key.to_owned(), id);
        tokio::spawn(cell.run(rx, Arc::downgrade(self), self.settings.passivation_timeout));
        self.counters.record_cell_created();
        debug!(key, id, "materialized cell");
        CellHandle { id, tx }
    }

    /// Installs a handle directly, bypassing cell spawning. Lets tests
    /// stand in an unresponsive or misbehaving cell.
    #[cfg(test)]
    pub(crate) fn install_handle(&self, key: &str, handle: CellHandle<V>) {
        let shard = &self.shards[shard_index(key, self.shards.len())];
        shard.insert(key.to_owned(), handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use tokio::sync::oneshot;

    use crate::cell::CellReply;

    fn router(shard_count: usize) -> Arc<Router<u32>> {
        Arc::new(Router::new(CacheSettings::new().shard_count(shard_count)))
    }

    async fn ask(
        router: &Arc<Router<u32>>,
        key: &str,
        make: impl FnOnce(oneshot::Sender<CellReply<u32>>) -> CellMsg<u32>,
    ) -> CellReply<u32> {
        let (reply_tx, reply_rx) = oneshot::channel();
        router.send(key, make(reply_tx)).await;
        reply_rx.await.expect("cell dropped reply")
    }

    #[tokio::test]
    async fn test_lazy_materialization_and_stable_forwarding() {
        let router = router(4);
        assert_eq!(router.stats().cells_created, 0);

        ask(&router, "k", |reply| CellMsg::Put { value: 7, reply }).await;
        assert_eq!(router.stats().cells_created, 1);

        // Subsequent messages reach the same instance: the value is
        // still there and no second cell appears.
        let reply = ask(&router, "k", |reply| CellMsg::Get { reply }).await;
        assert!(matches!(reply, CellReply::Value(Some(7))));
        assert_eq!(router.stats().cells_created, 1);
    }

    #[tokio::test]
    async fn test_removed_cell_is_replaced_by_fresh_empty_cell() {
        let router = router(4);

        ask(&router, "k", |reply| CellMsg::Put { value: 7, reply }).await;
        let first = router.live_or_spawn("k");

        ask(&router, "k", |reply| CellMsg::Remove { reply }).await;
        first.tx.closed().await;

        // Next message materializes a new instance with empty state.
        let reply = ask(&router, "k", |reply| CellMsg::Get { reply }).await;
        assert!(matches!(reply, CellReply::Value(None)));
        let second = router.live_or_spawn("k");
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_message_queued_behind_remove_reaches_fresh_cell() {
        let router = router(4);

        ask(&router, "k", |reply| CellMsg::Put { value: 7, reply }).await;

        // Pipeline a put behind the remove without awaiting the ack:
        // the dying cell drains its mailbox and the put reaches the
        // key's next incarnation.
        let (remove_tx, remove_rx) = oneshot::channel();
        router.send("k", CellMsg::Remove { reply: remove_tx }).await;
        let (put_tx, put_rx) = oneshot::channel();
        router.send("k", CellMsg::Put { value: 9, reply: put_tx }).await;

        assert!(matches!(remove_rx.await.unwrap(), CellReply::Ack));
        assert!(matches!(put_rx.await.unwrap(), CellReply::Ack));

        let reply = ask(&router, "k", |reply| CellMsg::Get { reply }).await;
        assert!(matches!(reply, CellReply::Value(Some(9))));
    }

    #[tokio::test]
    async fn test_message_queued_behind_empty_read_reaches_fresh_cell() {
        let router = router(4);

        // A get on an empty slot stops the cell; a put pipelined
        // behind it must still land.
        let (get_tx, get_rx) = oneshot::channel();
        router.send("k", CellMsg::Get { reply: get_tx }).await;
        let (put_tx, put_rx) = oneshot::channel();
        router.send("k", CellMsg::Put { value: 5, reply: put_tx }).await;

        assert!(matches!(get_rx.await.unwrap(), CellReply::Value(None)));
        assert!(matches!(put_rx.await.unwrap(), CellReply::Ack));

        let reply = ask(&router, "k", |reply| CellMsg::Get { reply }).await;
        assert!(matches!(reply, CellReply::Value(Some(5))));
    }

    #[tokio::test]
    async fn test_forget_requires_matching_identity() {
        let router = router(4);

        ask(&router, "k", |reply| CellMsg::Put { value: 7, reply }).await;
        let handle = router.live_or_spawn("k");

        // A stale identity must not evict the live record.
        router.forget("k", handle.id + 1);
        assert_eq!(router.stats().live_cells, 1);

        router.forget("k", handle.id);
        assert_eq!(router.stats().live_cells, 0);
    }

    #[tokio::test]
    async fn test_stale_handle_is_replaced_in_place() {
        let router = router(4);

        // Stand in a handle whose receiving half is already gone.
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        router.install_handle("k", CellHandle { id: 999, tx });

        let reply = ask(&router, "k", |reply| CellMsg::Get { reply }).await;
        assert!(matches!(reply, CellReply::Value(None)));
    }

    #[tokio::test]
    async fn test_keys_spread_across_shards_without_cross_talk() {
        let router = router(4);

        for i in 0..16 {
            let key = format!("key-{i}");
            let reply = ask(&router, &key, |reply| CellMsg::Put { value: i, reply }).await;
            assert!(matches!(reply, CellReply::Ack));
        }
        for i in 0..16 {
            let key = format!("key-{i}");
            let reply = ask(&router, &key, |reply| CellMsg::Get { reply }).await;
            match reply {
                CellReply::Value(Some(v)) => assert_eq!(v, i),
                other => panic!("expected value for {key}, got {}", other.describe()),
            }
        }
        assert_eq!(router.stats().cells_created, 16);
    }

    proptest! {
        #[test]
        fn prop_shard_assignment_stable_and_in_range(
            key in "[a-zA-Z0-9_.-]{1,64}",
            shard_count in 1usize..512,
        ) {
            let first = shard_index(&key, shard_count);
            let second = shard_index(&key, shard_count);
            prop_assert_eq!(first, second);
            prop_assert!(first < shard_count);
        }
    }
}
