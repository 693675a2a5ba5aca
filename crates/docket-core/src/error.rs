//! Error types for Docket
//!
//! Explicit error types with context, using thiserror.

use thiserror::Error;

/// Result type alias for Docket operations
pub type Result<T> = std::result::Result<T, Error>;

/// Docket error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Invalid resume token for session: {session_id}")]
    InvalidResumeToken { session_id: String },

    #[error("Unauthorized access to session {session_id}: {reason}")]
    UnauthorizedAccess { session_id: String, reason: String },

    #[error("Session deleted: {session_id}")]
    SessionDeleted { session_id: String },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("Invalid actor ID: {id}, reason: {reason}")]
    InvalidActorId { id: String, reason: String },

    #[error("Admin access required for operation: {operation}")]
    AdminRequired { operation: String },

    #[error("Goal not found: {goal_id}")]
    GoalNotFound { goal_id: String },

    // =========================================================================
    // Dispatch Errors
    // =========================================================================
    #[error("Actor mailbox full: {id}, depth: {depth}, max: {max}")]
    ActorMailboxFull {
        id: String,
        depth: usize,
        max: usize,
    },

    #[error("Unknown operation: {operation}")]
    UnknownOperation { operation: String },

    #[error("Actor invocation failed: {id}, operation: {operation}, reason: {reason}")]
    ActorInvocationFailed {
        id: String,
        operation: String,
        reason: String,
    },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage read failed: {key}, reason: {reason}")]
    StorageReadFailed { key: String, reason: String },

    #[error("Storage write failed: {key}, reason: {reason}")]
    StorageWriteFailed { key: String, reason: String },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Semantic search unavailable: {reason}")]
    SearchUnavailable { reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a missing required field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Create a serialization error from a serde_json failure
    pub fn serialization(err: serde_json::Error) -> Self {
        Self::SerializationFailed {
            reason: err.to_string(),
        }
    }

    /// Create a deserialization error from a serde_json failure
    pub fn deserialization(err: serde_json::Error) -> Self {
        Self::DeserializationFailed {
            reason: err.to_string(),
        }
    }

    /// Check if this error is retriable
    ///
    /// The sync pipeline retries retriable failures with backoff before
    /// dead-lettering; everything else dead-letters immediately.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::StorageReadFailed { .. }
                | Self::StorageWriteFailed { .. }
                | Self::SearchUnavailable { .. }
        )
    }
}
