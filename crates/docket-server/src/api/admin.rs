//! Admin API endpoints
//!
//! Lists come from the search index (the read-optimized cache); detail
//! reads go straight to the authoritative actor. Everything here is
//! gated by the configured admin key.

use crate::api::ApiError;
use crate::models::{AdminListQuery, ADMIN_LIST_LIMIT_MAX};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use docket_conversation::ConversationState;
use docket_sync::{AuditRow, IndexFilter, IndexRow};
use tracing::instrument;

/// Header carrying the admin credential
const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Create admin routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/:session_id", get(conversation_detail))
        .route("/conversations/:session_id/audit", get(conversation_audit))
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if state.authorize_admin(presented) {
        Ok(())
    } else {
        Err(ApiError::forbidden("admin credential required"))
    }
}

/// GET /v1/admin/conversations
#[instrument(skip(state, headers, query), level = "info")]
async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<Vec<IndexRow>>, ApiError> {
    require_admin(&state, &headers)?;

    let filter = IndexFilter {
        firm_id: query.firm_id,
        status: query.status,
        conflict_status: query.conflict_status,
        include_deleted: query.include_deleted,
        limit: query.limit.min(ADMIN_LIST_LIMIT_MAX),
    };

    Ok(Json(state.index().list(filter).await?))
}

/// GET /v1/admin/conversations/{id}
#[instrument(skip(state, headers), fields(session_id = %session_id), level = "info")]
async fn conversation_detail(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConversationState>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.service().full_conversation(&session_id).await?))
}

/// GET /v1/admin/conversations/{id}/audit
#[instrument(skip(state, headers), fields(session_id = %session_id), level = "info")]
async fn conversation_audit(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<AuditRow>>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.audit().entries_for(&session_id).await?))
}
