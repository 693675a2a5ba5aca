//! Tool-protocol endpoints
//!
//! One JSON-RPC endpoint per domain server. Handshake state is keyed by
//! the `x-client-id` header, so every orchestrator client gets its own
//! session and must complete its own `initialize`.

use crate::api::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use docket_tools::JsonRpcRequest;
use tracing::instrument;

/// Header identifying the orchestrator client connection
const CLIENT_ID_HEADER: &str = "x-client-id";

/// Fallback client id when the header is absent
const DEFAULT_CLIENT_ID: &str = "default";

/// Create tool routes
pub fn router() -> Router<AppState> {
    Router::new().route("/:server/rpc", post(handle_rpc))
}

/// POST /v1/tools/{server}/rpc
#[instrument(skip(state, headers, request), fields(server = %server, method = %request.method), level = "debug")]
async fn handle_rpc(
    State(state): State<AppState>,
    Path(server): Path<String>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Result<Response, ApiError> {
    let client_id = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CLIENT_ID);

    let session = state
        .tool_session(&server, client_id)
        .await
        .ok_or_else(|| ApiError::not_found("tool server", &server))?;

    let mut session = session.lock().await;
    match session.handle(request).await {
        Some(response) => Ok(Json(response).into_response()),
        // Notifications receive no body.
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
