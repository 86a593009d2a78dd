//! Cell lifecycle: one task per live key.
//!
//! A cell owns the slot for exactly one key and processes its mailbox
//! strictly sequentially, so no two operations on the same key ever
//! run concurrently. Cells are created lazily by the router and tear
//! themselves down: after `passivation_timeout` without a message,
//! after answering a read on an empty slot, or immediately after
//! acknowledging a remove.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::debug;

use crate::router::Router;

/// A message addressed to a single cell, carrying the reply channel
/// for the originating ask.
pub(crate) enum CellMsg<V> {
    Get {
        reply: oneshot::Sender<CellReply<V>>,
    },
    Put {
        value: V,
        reply: oneshot::Sender<CellReply<V>>,
    },
    Remove {
        reply: oneshot::Sender<CellReply<V>>,
    },
}

/// A cell's answer to a message.
pub(crate) enum CellReply<V> {
    /// Answer to a get: the slot's contents.
    Value(Option<V>),
    /// Acknowledgement of a put or remove.
    Ack,
}

impl<V> CellReply<V> {
    /// Short description of the reply shape, for diagnostics.
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            CellReply::Value(Some(_)) => "value(present)",
            CellReply::Value(None) => "value(absent)",
            CellReply::Ack => "ack",
        }
    }
}

/// Why a cell left its message loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopReason {
    /// No message within the passivation timeout.
    Idle,
    /// Answered a get on an empty slot.
    EmptyRead,
    /// Processed a remove.
    Removed,
    /// Every sender is gone; the cache itself was dropped.
    Orphaned,
}

impl StopReason {
    fn as_str(self) -> &'static str {
        match self {
            StopReason::Idle => "idle",
            StopReason::EmptyRead => "empty-read",
            StopReason::Removed => "removed",
            StopReason::Orphaned => "orphaned",
        }
    }

    /// Voluntary self-eviction, as opposed to a remove or shutdown.
    fn is_passivation(self) -> bool {
        matches!(self, StopReason::Idle | StopReason::EmptyRead)
    }
}

/// The unit of execution holding at most one cached value for one key.
pub(crate) struct Cell<V> {
    key: String,
    id: u64,
    value: Option<V>,
}

impl<V> Cell<V>
where
    V: Clone + Send + 'static,
{
    pub(crate) fn new(key: String, id: u64) -> Self {
        Self {
            key,
            id,
            value: None,
        }
    }

    /// The cell's message loop.
    ///
    /// Replies are always sent before the stop path runs, so the
    /// original caller receives its result even when the cell is torn
    /// down right after.
    ///
    /// A message drained during the stop path is redelivered after
    /// anything a racing sender has already placed with the fresh
    /// cell, so ordering across *different* callers can shift at a
    /// passivation boundary. Each caller's own operations keep their
    /// issuance order.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<CellMsg<V>>,
        router: Weak<Router<V>>,
        passivation_timeout: Duration,
    ) {
        let reason = loop {
            // Each receive gets a fresh window, so any processed
            // message resets the idle timer.
            match time::timeout(passivation_timeout, rx.recv()).await {
                Ok(Some(msg)) => {
                    if let Some(reason) = self.handle(msg) {
                        break reason;
                    }
                }
                Ok(None) => break StopReason::Orphaned,
                Err(_) => break StopReason::Idle,
            }
        };

        debug!(key = %self.key, id = self.id, reason = reason.as_str(), "cell stopping");

        if let Some(router) = router.upgrade() {
            router.forget(&self.key, self.id);
            if reason.is_passivation() {
                router.counters().record_passivation();
            }
            // Messages that raced into the mailbox while we decided to
            // stop belong to the next incarnation of this key.
            rx.close();
            while let Ok(msg) = rx.try_recv() {
                router.redeliver(&self.key, msg).await;
            }
        }
    }

    /// Processes one message. Returns the stop reason when the cell
    /// must not continue.
    fn handle(&mut self, msg: CellMsg<V>) -> Option<StopReason> {
        match msg {
            CellMsg::Get { reply } => match &self.value {
                Some(value) => {
                    let _ = reply.send(CellReply::Value(Some(value.clone())));
                    None
                }
                None => {
                    // A cell asked for a value it does not have assumes
                    // it will not be asked again soon and frees itself.
                    let _ = reply.send(CellReply::Value(None));
                    Some(StopReason::EmptyRead)
                }
            },
            CellMsg::Put { value, reply } => {
                self.value = Some(value);
                let _ = reply.send(CellReply::Ack);
                None
            }
            CellMsg::Remove { reply } => {
                self.value = None;
                let _ = reply.send(CellReply::Ack);
                Some(StopReason::Removed)
            }
        }
    }
}
