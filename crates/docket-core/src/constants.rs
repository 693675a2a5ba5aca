//! Limit constants for Docket
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Actor Limits
// =============================================================================

/// Maximum length of an actor ID in bytes
pub const ACTOR_ID_LENGTH_BYTES_MAX: usize = 256;

/// Maximum length of an actor namespace in bytes
pub const ACTOR_NAMESPACE_LENGTH_BYTES_MAX: usize = 128;

/// Maximum size of serialized conversation state in bytes (10 MB)
pub const ACTOR_STATE_SIZE_BYTES_MAX: usize = 10 * 1024 * 1024;

/// Maximum size of an actor KV key in bytes (10 KB)
pub const ACTOR_KV_KEY_SIZE_BYTES_MAX: usize = 10 * 1024;

/// Maximum size of an actor KV value in bytes (10 MB)
pub const ACTOR_KV_VALUE_SIZE_BYTES_MAX: usize = 10 * 1024 * 1024;

/// Maximum duration of a single actor invocation in milliseconds (30 sec)
pub const ACTOR_INVOCATION_TIMEOUT_MS_MAX: u64 = 30 * 1000;

/// Default idle timeout before actor deactivation in milliseconds (5 min)
pub const ACTOR_IDLE_TIMEOUT_MS_DEFAULT: u64 = 5 * 60 * 1000;

/// Maximum idle timeout in milliseconds (1 hour)
pub const ACTOR_IDLE_TIMEOUT_MS_MAX: u64 = 60 * 60 * 1000;

/// Maximum number of concurrently activated conversation actors
pub const ACTOR_CONCURRENT_COUNT_MAX: usize = 100_000;

// =============================================================================
// Conversation Limits
// =============================================================================

/// Maximum length of a message content in bytes (64 KB)
pub const MESSAGE_CONTENT_LENGTH_BYTES_MAX: usize = 64 * 1024;

/// Maximum number of messages retained per conversation
pub const CONVERSATION_MESSAGES_COUNT_MAX: usize = 10_000;

/// Maximum number of data goals per conversation
pub const CONVERSATION_GOALS_COUNT_MAX: usize = 256;

/// Maximum length of a firm ID in bytes
pub const FIRM_ID_LENGTH_BYTES_MAX: usize = 128;

// =============================================================================
// Mailbox / Dispatch Limits
// =============================================================================

/// Maximum depth of an actor mailbox
pub const MAILBOX_DEPTH_MAX: usize = 1024;

/// Maximum number of pending invocations per actor
pub const INVOCATION_PENDING_COUNT_MAX: usize = 256;

// =============================================================================
// Sync Pipeline Limits
// =============================================================================

/// Maximum delivery attempts for one sync event before dead-lettering
pub const SYNC_RETRY_COUNT_MAX: u32 = 3;

/// Backoff between sync retries in milliseconds
pub const SYNC_RETRY_BACKOFF_MS: u64 = 200;

/// Default staleness threshold for reconciliation in milliseconds (10 min)
pub const RECONCILE_STALE_AFTER_MS_DEFAULT: u64 = 10 * 60 * 1000;

/// Default reconciliation sweep interval in milliseconds (1 min)
pub const RECONCILE_INTERVAL_MS_DEFAULT: u64 = 60 * 1000;

/// Maximum rows reconciled per sweep
pub const RECONCILE_BATCH_COUNT_MAX: usize = 100;

// =============================================================================
// Tool Protocol Limits
// =============================================================================

/// Maximum transcript length fed to heuristic classifiers in bytes (256 KB)
pub const TRANSCRIPT_LENGTH_BYTES_MAX: usize = 256 * 1024;

/// Semantic search result cap per query
pub const SEARCH_TOP_K_MAX: usize = 50;

/// Semantic search timeout in milliseconds (5 sec)
pub const SEARCH_TIMEOUT_MS_DEFAULT: u64 = 5 * 1000;

// Compile-time assertions for constant validity
const _: () = {
    assert!(ACTOR_ID_LENGTH_BYTES_MAX >= 64);
    assert!(MAILBOX_DEPTH_MAX > 0);
    assert!(INVOCATION_PENDING_COUNT_MAX <= MAILBOX_DEPTH_MAX);
    assert!(SYNC_RETRY_COUNT_MAX >= 1);
    assert!(RECONCILE_STALE_AFTER_MS_DEFAULT > RECONCILE_INTERVAL_MS_DEFAULT);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_have_units_in_names() {
        // Documents the naming convention: byte limits end in _BYTES_*,
        // time limits in _MS_*, count limits in _COUNT_*.
        let _: usize = ACTOR_ID_LENGTH_BYTES_MAX;
        let _: u64 = ACTOR_INVOCATION_TIMEOUT_MS_MAX;
        let _: usize = CONVERSATION_GOALS_COUNT_MAX;
    }
}
