//! Error types for slotcache.
//!
//! A single `thiserror` hierarchy covering every way a cache
//! operation can fail. No error here is retried internally and none
//! is fatal to the process: a failed operation on one key never
//! affects other keys' cells or the router's ability to serve
//! subsequent requests. Retry and backoff belong to the caller.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using `CacheError`.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Main error type for all cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The empty string is not a valid cache key.
    ///
    /// Rejected synchronously, before any message is dispatched; an
    /// operation failing this way causes no cell activity at all.
    #[error("empty string is not a valid cache key")]
    EmptyKey,

    /// A cell did not reply within the configured ask timeout.
    ///
    /// The timeout cancels the *wait*, not the in-flight operation:
    /// the cell may still process the request afterwards, so cache
    /// state can reflect an operation whose caller saw this error.
    #[error("no reply from cell within {timeout:?}")]
    AskTimeout {
        /// The ask timeout that elapsed.
        timeout: Duration,
    },

    /// A cell replied with a message of the wrong shape for the
    /// requested operation.
    ///
    /// This indicates a defect in the dispatch protocol rather than a
    /// caller mistake; the offending reply is carried for diagnosis.
    #[error("unexpected reply to {operation}: got {reply}, expected {expected}")]
    UnexpectedReply {
        /// The operation that was in flight.
        operation: &'static str,
        /// Description of the reply that arrived instead.
        reply: String,
        /// The reply shape the operation required.
        expected: &'static str,
    },

    /// Any other failure while communicating with a cell, wrapping
    /// the original cause.
    #[error("cache dispatch failed: {0}")]
    Unknown(String),
}

impl CacheError {
    /// Returns true if retrying the operation may succeed.
    ///
    /// Timeouts and transport-level failures are transient; an empty
    /// key or a protocol defect will fail the same way every time.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CacheError::AskTimeout { .. } | CacheError::Unknown(_)
        )
    }

    /// Returns true if the operation's input was invalid.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, CacheError::EmptyKey)
    }

    /// Returns true if this error signals a dispatch-protocol defect.
    pub fn is_protocol_defect(&self) -> bool {
        matches!(self, CacheError::UnexpectedReply { .. })
    }
}
