//! Sortable identifier generation
//!
//! Every Docket entity gets a `<prefix>-<ulid>` identifier. ULIDs are
//! lexicographically sortable by creation time, so index scans and message
//! lists come back in insertion order without a secondary sort key.

use ulid::Ulid;

/// Prefix for conversation session identifiers
pub const CONVERSATION_ID_PREFIX: &str = "conv";

/// Prefix for user identifiers
pub const USER_ID_PREFIX: &str = "usr";

/// Prefix for message identifiers
pub const MESSAGE_ID_PREFIX: &str = "msg";

/// Prefix for goal identifiers
pub const GOAL_ID_PREFIX: &str = "goal";

/// Prefix for sync event identifiers
pub const EVENT_ID_PREFIX: &str = "evt";

/// Prefix for audit row identifiers
pub const AUDIT_ID_PREFIX: &str = "audit";

fn prefixed(prefix: &str) -> String {
    format!("{}-{}", prefix, Ulid::new().to_string().to_lowercase())
}

/// New conversation session id
pub fn new_conversation_id() -> String {
    prefixed(CONVERSATION_ID_PREFIX)
}

/// New user id
pub fn new_user_id() -> String {
    prefixed(USER_ID_PREFIX)
}

/// New message id
pub fn new_message_id() -> String {
    prefixed(MESSAGE_ID_PREFIX)
}

/// New goal id
pub fn new_goal_id() -> String {
    prefixed(GOAL_ID_PREFIX)
}

/// New sync event id
pub fn new_event_id() -> String {
    prefixed(EVENT_ID_PREFIX)
}

/// New audit row id
pub fn new_audit_id() -> String {
    prefixed(AUDIT_ID_PREFIX)
}

/// Mint a resume token for a conversation.
///
/// The token embeds the session id (`<conversation_id>.<secret>`), so the
/// HTTP layer can route a resume to the owning actor without a global
/// token index. The actor validates the full token against its state.
pub fn new_resume_token(conversation_id: &str) -> String {
    format!(
        "{}.{}",
        conversation_id,
        Ulid::new().to_string().to_lowercase()
    )
}

/// Extract the conversation id from a resume token.
///
/// Returns `None` when the token has no embedded session id.
pub fn conversation_id_from_token(token: &str) -> Option<&str> {
    let (conversation_id, secret) = token.split_once('.')?;
    if conversation_id.is_empty() || secret.is_empty() {
        return None;
    }
    Some(conversation_id)
}
