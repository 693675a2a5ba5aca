//! Conversation API endpoints
//!
//! HTTP sub-routes onto the per-session actor. Handlers do transport
//! concerns only (headers, status codes); all state decisions happen in
//! the actor.

use crate::api::ApiError;
use crate::models::{AuthenticateBody, CreateConversationBody};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use docket_conversation::{
    AddGoalsRequest, AddMessageRequest, AddMessageResponse, AuthenticateResponse,
    CompleteGoalRequest, ContextResponse, ConversationState, CreateResponse, Goal,
    MarkDeletedResponse, PhaseResponse, SetConflictRequest, SetConflictResponse, SyncState,
    UpdatePreLoginGoalsRequest, UserIdentity,
};
use tracing::instrument;

/// Header carrying the caller's Auth0 subject (set by the auth proxy)
const AUTH0_SUBJECT_HEADER: &str = "x-auth0-subject";

/// Header carrying the admin credential
const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Header naming who performed an admin deletion
const DELETED_BY_HEADER: &str = "x-deleted-by";

/// Create conversation routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_conversation))
        .route("/resume/:token", get(resume_conversation))
        .route("/:session_id/context", get(get_context))
        .route("/:session_id/message", post(add_message))
        .route("/:session_id/identity", post(update_identity))
        .route("/:session_id/pre-login-goals", post(update_pre_login_goals))
        .route("/:session_id/suggest-login", post(suggest_login))
        .route("/:session_id/authenticate", post(authenticate))
        .route("/:session_id/conflict", post(set_conflict_result))
        .route("/:session_id/goals", post(add_goals))
        .route("/:session_id/goals/:goal_id/complete", post(complete_goal))
        .route("/:session_id/complete", post(complete))
        .route("/:session_id/full-conversation", get(full_conversation))
        .route("/:session_id/delete", post(delete_conversation))
        .route("/:session_id/sync-state", get(sync_state))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.authorize_admin(header(headers, ADMIN_KEY_HEADER)) {
        Ok(())
    } else {
        Err(ApiError::forbidden("admin credential required"))
    }
}

/// POST /v1/conversations
#[instrument(skip(state, body), level = "info")]
async fn create_conversation(
    State(state): State<AppState>,
    Json(body): Json<CreateConversationBody>,
) -> Result<Json<CreateResponse>, ApiError> {
    let firm_id = body
        .firm_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("firm_id is required"))?;

    let created = state.service().create(firm_id, body.session_id).await?;
    tracing::info!(session_id = %created.session_id, "conversation created");
    Ok(Json(created))
}

/// GET /v1/conversations/resume/{token}
#[instrument(skip(state, headers), level = "info")]
async fn resume_conversation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConversationState>, ApiError> {
    let auth0_user_id = header(&headers, AUTH0_SUBJECT_HEADER).map(str::to_string);
    let snapshot = state.service().resume(&token, auth0_user_id).await?;
    Ok(Json(snapshot))
}

/// GET /v1/conversations/{id}/context
#[instrument(skip(state), fields(session_id = %session_id), level = "debug")]
async fn get_context(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ContextResponse>, ApiError> {
    Ok(Json(state.service().context(&session_id).await?))
}

/// POST /v1/conversations/{id}/message
#[instrument(skip(state, body), fields(session_id = %session_id), level = "debug")]
async fn add_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<AddMessageRequest>,
) -> Result<Json<AddMessageResponse>, ApiError> {
    Ok(Json(state.service().add_message(&session_id, body).await?))
}

/// POST /v1/conversations/{id}/identity
#[instrument(skip(state, body), fields(session_id = %session_id), level = "debug")]
async fn update_identity(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<UserIdentity>,
) -> Result<Json<UserIdentity>, ApiError> {
    Ok(Json(state.service().update_identity(&session_id, body).await?))
}

/// POST /v1/conversations/{id}/pre-login-goals
#[instrument(skip(state, body), fields(session_id = %session_id), level = "debug")]
async fn update_pre_login_goals(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<UpdatePreLoginGoalsRequest>,
) -> Result<Json<docket_conversation::PreLoginGoals>, ApiError> {
    Ok(Json(
        state
            .service()
            .update_pre_login_goals(&session_id, body)
            .await?,
    ))
}

/// POST /v1/conversations/{id}/suggest-login
#[instrument(skip(state), fields(session_id = %session_id), level = "info")]
async fn suggest_login(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<PhaseResponse>, ApiError> {
    Ok(Json(state.service().suggest_login(&session_id).await?))
}

/// POST /v1/conversations/{id}/authenticate
#[instrument(skip(state, body), fields(session_id = %session_id), level = "info")]
async fn authenticate(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<AuthenticateBody>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    Ok(Json(
        state
            .service()
            .authenticate(&session_id, body.auth0_user_id)
            .await?,
    ))
}

/// POST /v1/conversations/{id}/conflict
#[instrument(skip(state, body), fields(session_id = %session_id), level = "info")]
async fn set_conflict_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SetConflictRequest>,
) -> Result<Json<SetConflictResponse>, ApiError> {
    let result = state
        .service()
        .set_conflict_result(&session_id, body)
        .await?;
    tracing::info!(
        session_id = %session_id,
        conflict_status = ?result.conflict_status,
        phase = %result.phase,
        "conflict result recorded"
    );
    Ok(Json(result))
}

/// POST /v1/conversations/{id}/goals
#[instrument(skip(state, body), fields(session_id = %session_id), level = "debug")]
async fn add_goals(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<AddGoalsRequest>,
) -> Result<Json<Vec<Goal>>, ApiError> {
    Ok(Json(state.service().add_goals(&session_id, body.goals).await?))
}

/// POST /v1/conversations/{id}/goals/{goal_id}/complete
#[instrument(skip(state, body), fields(session_id = %session_id, goal_id = %goal_id), level = "debug")]
async fn complete_goal(
    State(state): State<AppState>,
    Path((session_id, goal_id)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Goal>, ApiError> {
    let request = CompleteGoalRequest {
        goal_id,
        completion_data: body.get("completion_data").cloned(),
    };
    Ok(Json(state.service().complete_goal(&session_id, request).await?))
}

/// POST /v1/conversations/{id}/complete
#[instrument(skip(state), fields(session_id = %session_id), level = "info")]
async fn complete(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<PhaseResponse>, ApiError> {
    Ok(Json(state.service().complete(&session_id).await?))
}

/// GET /v1/conversations/{id}/full-conversation (admin)
#[instrument(skip(state, headers), fields(session_id = %session_id), level = "info")]
async fn full_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ConversationState>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.service().full_conversation(&session_id).await?))
}

/// POST /v1/conversations/{id}/delete (admin)
#[instrument(skip(state, headers), fields(session_id = %session_id), level = "info")]
async fn delete_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MarkDeletedResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let deleted_by = header(&headers, DELETED_BY_HEADER)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request("x-deleted-by header is required"))?
        .to_string();

    let result = state.service().mark_deleted(&session_id, deleted_by).await?;
    tracing::info!(session_id = %session_id, "conversation soft-deleted");
    Ok(Json(result))
}

/// GET /v1/conversations/{id}/sync-state
#[instrument(skip(state), fields(session_id = %session_id), level = "debug")]
async fn sync_state(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SyncState>, ApiError> {
    Ok(Json(state.service().get_sync_state(&session_id).await?))
}
