//! Public asynchronous cache client.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time;
use tracing::instrument;

use slotcache_core::{CacheError, CacheSettings, Result};

use crate::cell::{CellMsg, CellReply};
use crate::router::Router;
use crate::stats::CacheStats;

/// A key-addressable single-slot cache.
///
/// Each key maps to at most one value of type `V`, held by a cell
/// that is created lazily on first access and passivates after a
/// period of inactivity. All operations are asynchronous and never
/// block the calling thread; every failure is classified as one of
/// the [`CacheError`] kinds and nothing is retried internally.
///
/// Cloning the handle is cheap; all clones address the same cache.
///
/// # Example
///
/// ```rust,ignore
/// use slotcache::{Cache, CacheSettings};
///
/// let cache: Cache<String> = Cache::new();
/// cache.put("greeting", "hello".to_owned()).await?;
/// assert_eq!(cache.get("greeting").await?, Some("hello".to_owned()));
/// ```
pub struct Cache<V> {
    router: Arc<Router<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
        }
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + 'static,
{
    /// Creates a cache with default settings.
    pub fn new() -> Self {
        Self::with_settings(CacheSettings::default())
    }

    /// Creates a cache with the given settings.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is zero.
    pub fn with_settings(settings: CacheSettings) -> Self {
        assert!(settings.shard_count >= 1, "shard_count must be at least 1");
        Self {
            router: Arc::new(Router::new(settings)),
        }
    }

    /// Looks up the value for `key`.
    ///
    /// Completes with `None` when the slot is empty; a read on an
    /// empty slot also lets the cell free itself.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        match self.ask(key, "get", |reply| CellMsg::Get { reply }).await? {
            CellReply::Value(value) => {
                if value.is_some() {
                    self.router.counters().record_hit();
                } else {
                    self.router.counters().record_miss();
                }
                Ok(value)
            }
            other => Err(Self::unexpected("get", "value", other)),
        }
    }

    /// Looks up `key`, substituting the produced default when the
    /// slot is empty. The default is not written back.
    pub async fn get_or_else(&self, key: &str, default: impl FnOnce() -> V) -> Result<V> {
        Ok(self.get(key).await?.unwrap_or_else(default))
    }

    /// Stores `value` under `key`, replacing any existing value.
    #[instrument(level = "debug", skip(self, value))]
    pub async fn put(&self, key: &str, value: V) -> Result<()> {
        match self
            .ask(key, "put", |reply| CellMsg::Put { value, reply })
            .await?
        {
            CellReply::Ack => {
                self.router.counters().record_put();
                Ok(())
            }
            other => Err(Self::unexpected("put", "ack", other)),
        }
    }

    /// Returns the current value for `key`, or writes and returns the
    /// value produced by `make` when the slot is empty.
    ///
    /// `make` is only evaluated when no value is present. This is a
    /// best-effort check-then-act, not a compare-and-swap: two callers
    /// racing on the same absent key may both observe absence and both
    /// write, with the second write winning.
    pub async fn put_if_absent(&self, key: &str, make: impl FnOnce() -> V) -> Result<V> {
        if let Some(existing) = self.get(key).await? {
            return Ok(existing);
        }
        let value = make();
        self.put(key, value.clone()).await?;
        Ok(value)
    }

    /// Removes the value for `key` and stops its cell.
    ///
    /// Succeeds whether or not a value was present; the next operation
    /// on the key finds a fresh, empty cell.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove(&self, key: &str) -> Result<()> {
        match self
            .ask(key, "remove", |reply| CellMsg::Remove { reply })
            .await?
        {
            CellReply::Ack => {
                self.router.counters().record_remove();
                Ok(())
            }
            other => Err(Self::unexpected("remove", "ack", other)),
        }
    }

    /// Returns a point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        self.router.stats()
    }

    /// Returns the settings this cache was constructed with.
    pub fn settings(&self) -> &CacheSettings {
        self.router.settings()
    }

    /// Dispatches one message and awaits its reply within the ask
    /// timeout.
    ///
    /// The timeout cancels the wait, not the in-flight operation: the
    /// cell may still process the message after the caller has seen
    /// the timeout error.
    async fn ask(
        &self,
        key: &str,
        operation: &'static str,
        make: impl FnOnce(oneshot::Sender<CellReply<V>>) -> CellMsg<V>,
    ) -> Result<CellReply<V>> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let msg = make(reply_tx);
        let ask_timeout = self.router.settings().ask_timeout;

        let exchange = async {
            self.router.send(key, msg).await;
            reply_rx.await
        };
        match time::timeout(ask_timeout, exchange).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(CacheError::Unknown(format!(
                "cell dropped the reply channel for {operation} on key {key:?}"
            ))),
            Err(_) => Err(CacheError::AskTimeout {
                timeout: ask_timeout,
            }),
        }
    }

    fn unexpected(
        operation: &'static str,
        expected: &'static str,
        reply: CellReply<V>,
    ) -> CacheError {
        CacheError::UnexpectedReply {
            operation,
            reply: reply.describe().to_owned(),
            expected,
        }
    }
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use crate::router::CellHandle;

    fn cache_with(settings: CacheSettings) -> Cache<String> {
        Cache::with_settings(settings)
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_cell_yields_timeout() {
        let cache = cache_with(CacheSettings::new().ask_timeout(Duration::from_millis(50)));

        // A stand-in cell that accepts messages but never answers;
        // the reply senders are parked so they are not dropped either.
        let (tx, mut rx) = mpsc::channel(8);
        let parked = Arc::new(Mutex::new(Vec::new()));
        let sink = parked.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                sink.lock().push(msg);
            }
        });
        cache.router.install_handle("stuck", CellHandle { id: 999, tx });

        let err = cache.get("stuck").await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::AskTimeout {
                timeout
            } if timeout == Duration::from_millis(50)
        ));

        // The timeout cancelled the wait, not the delivery.
        assert_eq!(parked.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_reply_shape_is_a_protocol_defect() {
        let cache = cache_with(CacheSettings::default());

        // A stand-in cell that acknowledges reads.
        let (tx, mut rx) = mpsc::channel::<CellMsg<String>>(8);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let CellMsg::Get { reply } = msg {
                    let _ = reply.send(CellReply::Ack);
                }
            }
        });
        cache.router.install_handle("odd", CellHandle { id: 999, tx });

        let err = cache.get("odd").await.unwrap_err();
        match err {
            CacheError::UnexpectedReply {
                operation,
                reply,
                expected,
            } => {
                assert_eq!(operation, "get");
                assert_eq!(reply, "ack");
                assert_eq!(expected, "value");
            }
            other => panic!("expected UnexpectedReply, got {other}"),
        }
        assert!(cache.get("odd").await.unwrap_err().is_protocol_defect());
    }

    #[tokio::test]
    async fn test_dropped_reply_channel_is_unknown_error() {
        let cache = cache_with(CacheSettings::default());

        // A stand-in cell that drops every reply sender unanswered.
        let (tx, mut rx) = mpsc::channel::<CellMsg<String>>(8);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        cache.router.install_handle("mute", CellHandle { id: 999, tx });

        let err = cache.get("mute").await.unwrap_err();
        assert!(matches!(err, CacheError::Unknown(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    #[should_panic(expected = "shard_count must be at least 1")]
    fn test_zero_shards_is_rejected_at_construction() {
        let _cache: Cache<String> = Cache::with_settings(CacheSettings::new().shard_count(0));
    }
}
