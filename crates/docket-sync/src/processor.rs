//! Sync event processor
//!
//! Consumes sync events one at a time (the upstream channel preserves
//! per-conversation order) and applies version-gated projections. Delivery
//! is at-least-once: duplicates and stale versions apply as no-ops. Index
//! failures never propagate back to the actor — retriable errors are
//! retried with backoff, then dead-lettered to the audit log.

use crate::index::{AuditLog, AuditRow, IndexPatch, SearchIndex};
use chrono::{DateTime, Utc};
use docket_conversation::{ConflictStatus, ConversationStatus, Phase, SyncEvent, SyncEventType};
use docket_core::{
    Result, TimeProvider, SYNC_RETRY_BACKOFF_MS, SYNC_RETRY_COUNT_MAX,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Applies sync events to the search index
pub struct SyncProcessor {
    index: Arc<dyn SearchIndex>,
    audit: Arc<dyn AuditLog>,
    time: Arc<dyn TimeProvider>,
}

impl SyncProcessor {
    /// Build a processor over an index and audit log
    pub fn new(
        index: Arc<dyn SearchIndex>,
        audit: Arc<dyn AuditLog>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self { index, audit, time }
    }

    /// Drain the event channel until it closes
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<SyncEvent>) {
        info!("sync processor starting");
        while let Some(event) = rx.recv().await {
            self.process_event(&event).await;
        }
        info!("sync processor stopped");
    }

    /// Process one event: version-gated apply plus an audit row, written
    /// whether or not the apply succeeded.
    pub async fn process_event(&self, event: &SyncEvent) {
        let outcome = self.apply_with_retry(event).await;

        let (processed, error) = match &outcome {
            Ok(applied) => {
                debug!(
                    conversation_id = %event.conversation_id,
                    event_type = event.event_type.as_str(),
                    do_version = %event.do_version,
                    applied,
                    "sync event processed"
                );
                (true, None)
            }
            Err(err) => {
                error!(
                    conversation_id = %event.conversation_id,
                    event_type = event.event_type.as_str(),
                    do_version = %event.do_version,
                    error = %err,
                    "sync event dead-lettered"
                );
                (false, Some(err.to_string()))
            }
        };

        let row = AuditRow::new(
            event.conversation_id.clone(),
            event.event_type.as_str(),
            event.data.clone(),
            event.do_version,
            processed,
            error,
            self.time.now_ms(),
        );
        if let Err(err) = self.audit.append(row).await {
            // The audit log itself failing is the one place we can only log.
            error!(error = %err, "audit append failed");
        }
    }

    async fn apply_with_retry(&self, event: &SyncEvent) -> Result<bool> {
        let patch = patch_for(event);
        let mut attempt: u32 = 0;

        loop {
            match self
                .index
                .apply(
                    &event.conversation_id,
                    event.do_version,
                    patch.clone(),
                    self.time.now_ms(),
                )
                .await
            {
                Ok(applied) => return Ok(applied),
                Err(err) if err.is_retriable() && attempt < SYNC_RETRY_COUNT_MAX => {
                    attempt += 1;
                    self.time
                        .sleep_ms(SYNC_RETRY_BACKOFF_MS * u64::from(attempt))
                        .await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn field<T: serde::de::DeserializeOwned>(data: &Value, key: &str) -> Option<T> {
    data.get(key)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

/// Build the per-event-type row patch
fn patch_for(event: &SyncEvent) -> IndexPatch {
    let data = &event.data;
    let mut patch = IndexPatch {
        firm_id: Some(event.firm_id.clone()),
        ..Default::default()
    };

    match event.event_type {
        SyncEventType::Created => {
            patch.phase = field::<Phase>(data, "phase");
            patch.status = Some(ConversationStatus::Active);
        }
        SyncEventType::MessageAdded => {
            patch.message_count = field::<usize>(data, "message_count");
            patch.last_message_at = field::<DateTime<Utc>>(data, "last_message_at");
        }
        SyncEventType::StatusChanged => {
            patch.phase = field::<Phase>(data, "phase");
            patch.status = field::<ConversationStatus>(data, "status");
            patch.is_deleted = field::<bool>(data, "is_deleted");
        }
        SyncEventType::UserIdentified => {
            patch.client_name = field::<String>(data, "client_name");
            patch.client_email = field::<String>(data, "client_email");
        }
        SyncEventType::GoalsUpdated => {
            patch.goals_total = field::<usize>(data, "goals_total");
            patch.goals_completed = field::<usize>(data, "goals_completed");
            patch.phase = field::<Phase>(data, "phase");
        }
        SyncEventType::ConflictChecked => {
            patch.conflict_status = field::<ConflictStatus>(data, "conflict_status");
            patch.phase = field::<Phase>(data, "phase");
            patch.status = field::<ConversationStatus>(data, "status");
        }
    }

    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MemoryAuditLog, MemoryIndex};
    use async_trait::async_trait;
    use docket_core::{Error, ManualClock, Version};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn event(event_type: SyncEventType, version: u64, data: Value) -> SyncEvent {
        SyncEvent::new(event_type, "conv-1", "firm_1", Version::new(version), data)
    }

    fn processor() -> (SyncProcessor, Arc<MemoryIndex>, Arc<MemoryAuditLog>) {
        let index = Arc::new(MemoryIndex::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let clock = Arc::new(ManualClock::starting_at(1_000));
        let processor = SyncProcessor::new(index.clone(), audit.clone(), clock);
        (processor, index, audit)
    }

    #[tokio::test]
    async fn test_events_project_into_the_row() {
        let (processor, index, audit) = processor();

        processor
            .process_event(&event(
                SyncEventType::Created,
                1,
                json!({"phase": "pre_login"}),
            ))
            .await;
        processor
            .process_event(&event(
                SyncEventType::MessageAdded,
                2,
                json!({"message_count": 1, "last_message_at": Utc::now()}),
            ))
            .await;
        processor
            .process_event(&event(
                SyncEventType::UserIdentified,
                3,
                json!({"client_name": "John Doe", "client_email": "john@x.com"}),
            ))
            .await;

        let row = index.get("conv-1").await.unwrap().unwrap();
        assert_eq!(row.firm_id, "firm_1");
        assert_eq!(row.message_count, 1);
        assert_eq!(row.client_name.as_deref(), Some("John Doe"));
        assert_eq!(row.do_version, Version::new(3));
        assert_eq!(audit.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_event_is_noop_but_audited() {
        let (processor, index, audit) = processor();

        let created = event(SyncEventType::Created, 1, json!({"phase": "pre_login"}));
        processor.process_event(&created).await;
        processor.process_event(&created).await;

        let row = index.get("conv-1").await.unwrap().unwrap();
        assert_eq!(row.do_version, Version::new(1));

        // Both deliveries audited as processed.
        let entries = audit.entries_for("conv-1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.processed));
    }

    #[tokio::test]
    async fn test_stale_event_leaves_row_unchanged() {
        let (processor, index, audit) = processor();

        // Row already at version 7.
        index
            .apply(
                "conv-1",
                Version::new(7),
                IndexPatch {
                    firm_id: Some("firm_1".into()),
                    message_count: Some(9),
                    ..Default::default()
                },
                1_000,
            )
            .await
            .unwrap();

        processor
            .process_event(&event(
                SyncEventType::MessageAdded,
                5,
                json!({"message_count": 4}),
            ))
            .await;

        let row = index.get("conv-1").await.unwrap().unwrap();
        assert_eq!(row.message_count, 9);
        assert_eq!(row.do_version, Version::new(7));

        // The stale delivery still leaves an audit row, processed=true.
        let entries = audit.entries_for("conv-1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].processed);
    }

    #[tokio::test]
    async fn test_out_of_order_events_converge_to_highest_version() {
        let (processor, index, _) = processor();

        processor
            .process_event(&event(
                SyncEventType::MessageAdded,
                4,
                json!({"message_count": 3}),
            ))
            .await;
        processor
            .process_event(&event(
                SyncEventType::MessageAdded,
                2,
                json!({"message_count": 1}),
            ))
            .await;
        processor
            .process_event(&event(
                SyncEventType::MessageAdded,
                3,
                json!({"message_count": 2}),
            ))
            .await;

        let row = index.get("conv-1").await.unwrap().unwrap();
        assert_eq!(row.message_count, 3);
        assert_eq!(row.do_version, Version::new(4));
    }

    #[tokio::test]
    async fn test_conflict_event_projects_terminated_status() {
        let (processor, index, _) = processor();

        processor
            .process_event(&event(
                SyncEventType::ConflictChecked,
                2,
                json!({
                    "conflict_status": "conflict_detected",
                    "phase": "terminated",
                    "status": "terminated"
                }),
            ))
            .await;

        let row = index.get("conv-1").await.unwrap().unwrap();
        assert_eq!(row.conflict_status, ConflictStatus::ConflictDetected);
        assert_eq!(row.status, ConversationStatus::Terminated);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_succeeds() {
        struct FlakyIndex {
            inner: MemoryIndex,
            failures_left: AtomicU32,
        }

        #[async_trait]
        impl SearchIndex for FlakyIndex {
            async fn apply(
                &self,
                conversation_id: &str,
                do_version: Version,
                patch: IndexPatch,
                now_ms: u64,
            ) -> Result<bool> {
                let remaining = self.failures_left.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.failures_left.store(remaining - 1, Ordering::SeqCst);
                    return Err(Error::StorageWriteFailed {
                        key: conversation_id.to_string(),
                        reason: "transient".into(),
                    });
                }
                self.inner
                    .apply(conversation_id, do_version, patch, now_ms)
                    .await
            }

            async fn get(&self, conversation_id: &str) -> Result<Option<crate::index::IndexRow>> {
                self.inner.get(conversation_id).await
            }

            async fn list(
                &self,
                filter: crate::index::IndexFilter,
            ) -> Result<Vec<crate::index::IndexRow>> {
                self.inner.list(filter).await
            }

            async fn stale(
                &self,
                older_than_ms: u64,
                now_ms: u64,
                limit: usize,
            ) -> Result<Vec<crate::index::IndexRow>> {
                self.inner.stale(older_than_ms, now_ms, limit).await
            }

            async fn touch(&self, conversation_id: &str, now_ms: u64) -> Result<()> {
                self.inner.touch(conversation_id, now_ms).await
            }
        }

        let index = Arc::new(FlakyIndex {
            inner: MemoryIndex::new(),
            failures_left: AtomicU32::new(2),
        });
        let audit = Arc::new(MemoryAuditLog::new());
        let clock = Arc::new(ManualClock::starting_at(1_000));
        let processor = SyncProcessor::new(index.clone(), audit.clone(), clock);

        processor
            .process_event(&event(
                SyncEventType::Created,
                1,
                json!({"phase": "pre_login"}),
            ))
            .await;

        // The row landed despite two transient failures.
        let row = index.get("conv-1").await.unwrap().unwrap();
        assert_eq!(row.do_version, Version::new(1));
        let entries = audit.entries_for("conv-1").await.unwrap();
        assert!(entries[0].processed);
    }

    #[tokio::test]
    async fn test_exhausted_retries_dead_letter() {
        struct BrokenIndex;

        #[async_trait]
        impl SearchIndex for BrokenIndex {
            async fn apply(
                &self,
                conversation_id: &str,
                _do_version: Version,
                _patch: IndexPatch,
                _now_ms: u64,
            ) -> Result<bool> {
                Err(Error::StorageWriteFailed {
                    key: conversation_id.to_string(),
                    reason: "down".into(),
                })
            }

            async fn get(&self, _: &str) -> Result<Option<crate::index::IndexRow>> {
                Ok(None)
            }

            async fn list(
                &self,
                _: crate::index::IndexFilter,
            ) -> Result<Vec<crate::index::IndexRow>> {
                Ok(vec![])
            }

            async fn stale(
                &self,
                _: u64,
                _: u64,
                _: usize,
            ) -> Result<Vec<crate::index::IndexRow>> {
                Ok(vec![])
            }

            async fn touch(&self, _: &str, _: u64) -> Result<()> {
                Ok(())
            }
        }

        let audit = Arc::new(MemoryAuditLog::new());
        let clock = Arc::new(ManualClock::starting_at(1_000));
        let processor = SyncProcessor::new(Arc::new(BrokenIndex), audit.clone(), clock);

        processor
            .process_event(&event(
                SyncEventType::Created,
                1,
                json!({"phase": "pre_login"}),
            ))
            .await;

        // Dead-lettered: audited as unprocessed with the error attached.
        let entries = audit.entries_for("conv-1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].processed);
        assert!(entries[0].error.as_ref().unwrap().contains("down"));
    }
}
