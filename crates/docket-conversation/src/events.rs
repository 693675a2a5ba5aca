//! Sync events
//!
//! Versioned change notifications projected from the conversation actor
//! into the admin search index. Delivery is at-least-once; consumers gate
//! on `do_version`, so duplication and reordering are harmless.

use docket_core::{id, Version};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Sync event type, wire-named `conversation.*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEventType {
    #[serde(rename = "conversation.created")]
    Created,
    #[serde(rename = "conversation.message_added")]
    MessageAdded,
    #[serde(rename = "conversation.status_changed")]
    StatusChanged,
    #[serde(rename = "conversation.user_identified")]
    UserIdentified,
    #[serde(rename = "conversation.goals_updated")]
    GoalsUpdated,
    #[serde(rename = "conversation.conflict_checked")]
    ConflictChecked,
}

impl SyncEventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEventType::Created => "conversation.created",
            SyncEventType::MessageAdded => "conversation.message_added",
            SyncEventType::StatusChanged => "conversation.status_changed",
            SyncEventType::UserIdentified => "conversation.user_identified",
            SyncEventType::GoalsUpdated => "conversation.goals_updated",
            SyncEventType::ConflictChecked => "conversation.conflict_checked",
        }
    }
}

/// One versioned change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: SyncEventType,
    pub conversation_id: String,
    pub firm_id: String,
    pub do_version: Version,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub data: serde_json::Value,
}

impl SyncEvent {
    /// Build a new event carrying the actor's post-mutation version
    pub fn new(
        event_type: SyncEventType,
        conversation_id: impl Into<String>,
        firm_id: impl Into<String>,
        do_version: Version,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id::new_event_id(),
            event_type,
            conversation_id: conversation_id.into(),
            firm_id: firm_id.into(),
            do_version,
            timestamp: chrono::Utc::now(),
            data,
        }
    }
}

/// Sink for events leaving the actor
///
/// Emission is infallible from the actor's point of view: the actor's
/// write path must never block or fail because of a downstream indexing
/// problem. Implementations log and drop on a broken queue.
pub trait SyncEventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Sink that discards events (tests that don't exercise sync)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventSink;

impl SyncEventSink for NoOpEventSink {
    fn emit(&self, _event: SyncEvent) {}
}

/// Sink backed by an unbounded channel into the sync processor
///
/// A single consumer on the receiving side preserves FIFO order, which is
/// all the per-conversation ordering the processor relies on.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver the sync processor consumes
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SyncEventSink for ChannelEventSink {
    fn emit(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            warn!("sync event channel closed, event dropped");
        }
    }
}
