//! Actor mailbox types
//!
//! Bounded queues with explicit limits, no silent drops.

use bytes::Bytes;
use docket_core::{Error, Result};
use tokio::sync::oneshot;

/// A message bound for an actor's mailbox
#[derive(Debug)]
pub struct Envelope {
    /// The operation name
    pub operation: String,
    /// The message payload
    pub payload: Bytes,
    /// Channel to send the response
    pub reply_tx: oneshot::Sender<Result<Bytes>>,
}

impl Envelope {
    /// Create a new envelope
    pub fn new(
        operation: String,
        payload: Bytes,
        reply_tx: oneshot::Sender<Result<Bytes>>,
    ) -> Self {
        debug_assert!(!operation.is_empty(), "operation must not be empty");
        Self {
            operation,
            payload,
            reply_tx,
        }
    }

    /// Reject this envelope without processing it
    pub fn reject(self, error: Error) {
        // Receiver may be gone; a dropped caller is not an error here.
        let _ = self.reply_tx.send(Err(error));
    }
}
