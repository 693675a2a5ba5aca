//! Reconciliation sweeper
//!
//! Events can be lost (dead-lettered) or a conversation can simply go
//! quiet; either way the index row drifts. The sweeper periodically finds
//! rows whose `last_sync_at` is older than a threshold, pulls the
//! authoritative sync state from the actor, and re-applies it when the
//! actor has moved ahead. Failures are logged and retried on the next
//! sweep — never user-visible.

use crate::index::{IndexPatch, SearchIndex};
use async_trait::async_trait;
use docket_conversation::SyncState;
use docket_core::{
    Result, TimeProvider, RECONCILE_BATCH_COUNT_MAX, RECONCILE_INTERVAL_MS_DEFAULT,
    RECONCILE_STALE_AFTER_MS_DEFAULT,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Authoritative source of a conversation's sync state (the actor)
#[async_trait]
pub trait SyncStateSource: Send + Sync {
    /// Pull the minimal projection for one conversation
    async fn sync_state(&self, conversation_id: &str) -> Result<SyncState>;
}

/// Sweeper configuration
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweeps (milliseconds)
    pub interval_ms: u64,
    /// Rows older than this are stale (milliseconds)
    pub stale_after_ms: u64,
    /// Rows reconciled per sweep
    pub batch_limit: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_ms: RECONCILE_INTERVAL_MS_DEFAULT,
            stale_after_ms: RECONCILE_STALE_AFTER_MS_DEFAULT,
            batch_limit: RECONCILE_BATCH_COUNT_MAX,
        }
    }
}

/// Periodic index-vs-actor reconciliation
pub struct ReconciliationSweeper {
    index: Arc<dyn SearchIndex>,
    source: Arc<dyn SyncStateSource>,
    time: Arc<dyn TimeProvider>,
    config: SweeperConfig,
}

impl ReconciliationSweeper {
    /// Build a sweeper
    pub fn new(
        index: Arc<dyn SearchIndex>,
        source: Arc<dyn SyncStateSource>,
        time: Arc<dyn TimeProvider>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            index,
            source,
            time,
            config,
        }
    }

    /// Sweep forever at the configured interval
    pub async fn run(&self) {
        info!(
            interval_ms = self.config.interval_ms,
            stale_after_ms = self.config.stale_after_ms,
            "reconciliation sweeper starting"
        );
        loop {
            self.time.sleep_ms(self.config.interval_ms).await;
            match self.sweep_once().await {
                Ok(reapplied) if reapplied > 0 => {
                    info!(reapplied, "reconciliation sweep re-applied rows");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "reconciliation sweep failed, will retry next interval");
                }
            }
        }
    }

    /// One sweep: returns how many rows were re-applied
    pub async fn sweep_once(&self) -> Result<usize> {
        let now_ms = self.time.now_ms();
        let stale = self
            .index
            .stale(self.config.stale_after_ms, now_ms, self.config.batch_limit)
            .await?;

        let mut reapplied = 0usize;
        for row in stale {
            let state = match self.source.sync_state(&row.conversation_id).await {
                Ok(state) => state,
                Err(err) => {
                    // Retried on the next sweep; the row stays stale.
                    warn!(
                        conversation_id = %row.conversation_id,
                        error = %err,
                        "reconciliation pull failed"
                    );
                    continue;
                }
            };

            if state.do_version > row.do_version {
                self.index
                    .apply(
                        &row.conversation_id,
                        state.do_version,
                        patch_from_sync_state(&state),
                        now_ms,
                    )
                    .await?;
                reapplied += 1;
            } else {
                // Up to date; just stop it from showing up as stale again.
                debug!(conversation_id = %row.conversation_id, "row already current");
                self.index.touch(&row.conversation_id, now_ms).await?;
            }
        }

        Ok(reapplied)
    }
}

/// Full projection from an authoritative sync-state pull
fn patch_from_sync_state(state: &SyncState) -> IndexPatch {
    IndexPatch {
        firm_id: None,
        phase: Some(state.phase),
        status: Some(state.status),
        conflict_status: Some(state.conflict_status),
        message_count: Some(state.message_count),
        goals_total: Some(state.goals_total),
        goals_completed: Some(state.goals_completed),
        client_name: state.client_name.clone(),
        client_email: state.client_email.clone(),
        last_message_at: state.last_message_at,
        is_deleted: Some(state.is_deleted),
    }
}
