//! Search index and audit log
//!
//! The index supports exactly the operations the sync pipeline needs: a
//! conditional, version-gated apply (`UPDATE ... WHERE do_version <
//! incoming`), point reads, filtered scans for the admin API, and a
//! staleness scan for reconciliation. The audit log records every consumed
//! event regardless of outcome, for replay and debugging.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docket_core::{id, Result, Version};
use docket_conversation::{ConflictStatus, ConversationStatus, Phase};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One projected conversation row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRow {
    pub conversation_id: String,
    pub firm_id: String,
    pub phase: Phase,
    pub status: ConversationStatus,
    pub conflict_status: ConflictStatus,
    pub message_count: usize,
    pub goals_total: usize,
    pub goals_completed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub do_version: Version,
    pub last_sync_at_ms: u64,
}

impl IndexRow {
    fn fresh(conversation_id: &str, now_ms: u64) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            firm_id: String::new(),
            phase: Phase::PreLogin,
            status: ConversationStatus::Active,
            conflict_status: ConflictStatus::Pending,
            message_count: 0,
            goals_total: 0,
            goals_completed: 0,
            client_name: None,
            client_email: None,
            last_message_at: None,
            is_deleted: false,
            do_version: Version::INITIAL,
            last_sync_at_ms: now_ms,
        }
    }
}

/// Partial row update; absent fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct IndexPatch {
    pub firm_id: Option<String>,
    pub phase: Option<Phase>,
    pub status: Option<ConversationStatus>,
    pub conflict_status: Option<ConflictStatus>,
    pub message_count: Option<usize>,
    pub goals_total: Option<usize>,
    pub goals_completed: Option<usize>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_deleted: Option<bool>,
}

impl IndexPatch {
    fn merge_into(self, row: &mut IndexRow) {
        if let Some(firm_id) = self.firm_id {
            row.firm_id = firm_id;
        }
        if let Some(phase) = self.phase {
            row.phase = phase;
        }
        if let Some(status) = self.status {
            row.status = status;
        }
        if let Some(conflict_status) = self.conflict_status {
            row.conflict_status = conflict_status;
        }
        if let Some(message_count) = self.message_count {
            row.message_count = message_count;
        }
        if let Some(goals_total) = self.goals_total {
            row.goals_total = goals_total;
        }
        if let Some(goals_completed) = self.goals_completed {
            row.goals_completed = goals_completed;
        }
        if self.client_name.is_some() {
            row.client_name = self.client_name;
        }
        if self.client_email.is_some() {
            row.client_email = self.client_email;
        }
        if self.last_message_at.is_some() {
            row.last_message_at = self.last_message_at;
        }
        if let Some(is_deleted) = self.is_deleted {
            row.is_deleted = is_deleted;
        }
    }
}

/// Admin list filter
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    pub firm_id: Option<String>,
    pub status: Option<ConversationStatus>,
    pub conflict_status: Option<ConflictStatus>,
    pub include_deleted: bool,
    pub limit: usize,
}

/// Queryable projection of conversation state
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Version-gated conditional write.
    ///
    /// Creates the row when absent; otherwise merges the patch only when
    /// the stored `do_version` is strictly below the incoming one. Returns
    /// whether the write was applied — a stale or duplicate version is a
    /// no-op, not an error.
    async fn apply(
        &self,
        conversation_id: &str,
        do_version: Version,
        patch: IndexPatch,
        now_ms: u64,
    ) -> Result<bool>;

    /// Point read
    async fn get(&self, conversation_id: &str) -> Result<Option<IndexRow>>;

    /// Filtered scan, newest conversations first (ids sort by creation)
    async fn list(&self, filter: IndexFilter) -> Result<Vec<IndexRow>>;

    /// Rows whose `last_sync_at` is older than the threshold
    async fn stale(&self, older_than_ms: u64, now_ms: u64, limit: usize)
        -> Result<Vec<IndexRow>>;

    /// Refresh a row's `last_sync_at` without changing its data
    async fn touch(&self, conversation_id: &str, now_ms: u64) -> Result<()>;
}

/// In-memory search index
#[derive(Clone, Default)]
pub struct MemoryIndex {
    rows: Arc<RwLock<HashMap<String, IndexRow>>>,
}

impl MemoryIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn apply(
        &self,
        conversation_id: &str,
        do_version: Version,
        patch: IndexPatch,
        now_ms: u64,
    ) -> Result<bool> {
        let mut rows = self.rows.write().await;
        let row = rows
            .entry(conversation_id.to_string())
            .or_insert_with(|| IndexRow::fresh(conversation_id, now_ms));

        // The gate: a row never moves backward.
        if !row.do_version.admits(do_version) {
            return Ok(false);
        }

        patch.merge_into(row);
        row.do_version = do_version;
        row.last_sync_at_ms = now_ms;
        Ok(true)
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<IndexRow>> {
        let rows = self.rows.read().await;
        Ok(rows.get(conversation_id).cloned())
    }

    async fn list(&self, filter: IndexFilter) -> Result<Vec<IndexRow>> {
        let rows = self.rows.read().await;
        let mut matched: Vec<IndexRow> = rows
            .values()
            .filter(|row| filter.include_deleted || !row.is_deleted)
            .filter(|row| {
                filter
                    .firm_id
                    .as_ref()
                    .map_or(true, |firm_id| &row.firm_id == firm_id)
            })
            .filter(|row| filter.status.map_or(true, |status| row.status == status))
            .filter(|row| {
                filter
                    .conflict_status
                    .map_or(true, |status| row.conflict_status == status)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.conversation_id.cmp(&a.conversation_id));
        if filter.limit > 0 {
            matched.truncate(filter.limit);
        }
        Ok(matched)
    }

    async fn stale(
        &self,
        older_than_ms: u64,
        now_ms: u64,
        limit: usize,
    ) -> Result<Vec<IndexRow>> {
        let rows = self.rows.read().await;
        let threshold = now_ms.saturating_sub(older_than_ms);
        let mut stale: Vec<IndexRow> = rows
            .values()
            .filter(|row| row.last_sync_at_ms < threshold)
            .cloned()
            .collect();

        stale.sort_by_key(|row| row.last_sync_at_ms);
        if limit > 0 {
            stale.truncate(limit);
        }
        Ok(stale)
    }

    async fn touch(&self, conversation_id: &str, now_ms: u64) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(conversation_id) {
            row.last_sync_at_ms = now_ms;
        }
        Ok(())
    }
}

// =============================================================================
// Audit log
// =============================================================================

/// One consumed-event record, written regardless of outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRow {
    pub id: String,
    pub conversation_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub do_version: Version,
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at_ms: u64,
}

impl AuditRow {
    /// Build an audit row
    pub fn new(
        conversation_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        do_version: Version,
        processed: bool,
        error: Option<String>,
        recorded_at_ms: u64,
    ) -> Self {
        Self {
            id: id::new_audit_id(),
            conversation_id: conversation_id.into(),
            event_type: event_type.into(),
            payload,
            do_version,
            processed,
            error,
            recorded_at_ms,
        }
    }
}

/// Append-only audit trail for the sync pipeline
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one row
    async fn append(&self, row: AuditRow) -> Result<()>;

    /// All rows for a conversation, in append order
    async fn entries_for(&self, conversation_id: &str) -> Result<Vec<AuditRow>>;

    /// Total rows recorded
    async fn len(&self) -> Result<usize>;
}

/// In-memory audit log
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    rows: Arc<RwLock<Vec<AuditRow>>>,
}

impl MemoryAuditLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, row: AuditRow) -> Result<()> {
        self.rows.write().await.push(row);
        Ok(())
    }

    async fn entries_for(&self, conversation_id: &str) -> Result<Vec<AuditRow>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|row| row.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.rows.read().await.len())
    }
}
