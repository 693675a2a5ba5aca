//! HTTP API models

use docket_conversation::{ConflictStatus, ConversationStatus};
use serde::{Deserialize, Serialize};

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    /// Build an error body
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    /// 404-shaped body
    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::new("not_found", format!("{} not found: {}", resource, id))
    }

    /// 400-shaped body
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    /// 500-shaped body
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Body for `POST /v1/conversations`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateConversationBody {
    pub firm_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body for `POST /v1/conversations/{id}/authenticate`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateBody {
    pub auth0_user_id: String,
}

/// Query for `GET /v1/admin/conversations`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminListQuery {
    #[serde(default)]
    pub firm_id: Option<String>,
    #[serde(default)]
    pub status: Option<ConversationStatus>,
    #[serde(default)]
    pub conflict_status: Option<ConflictStatus>,
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default = "default_admin_list_limit")]
    pub limit: usize,
}

fn default_admin_list_limit() -> usize {
    50
}

/// Maximum rows an admin list may request
pub const ADMIN_LIST_LIMIT_MAX: usize = 200;
