//! REST API module

pub mod admin;
pub mod conversations;
pub mod tools;

use crate::models::{ErrorResponse, HealthResponse};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use docket_core::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/v1/conversations", conversations::router())
        .nest("/v1/tools", tools::router())
        .nest("/v1/admin", admin::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// API error type that converts to HTTP responses
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// 404
    pub fn not_found(resource: &str, id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse::not_found(resource, id),
        }
    }

    /// 400
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::bad_request(message),
        }
    }

    /// 403
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            body: ErrorResponse::new("forbidden", message),
        }
    }

    /// 500
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse::internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::SessionNotFound { .. } | Error::GoalNotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidResumeToken { .. }
            | Error::UnauthorizedAccess { .. }
            | Error::AdminRequired { .. } => StatusCode::FORBIDDEN,
            Error::SessionDeleted { .. } => StatusCode::GONE,
            Error::MissingRequiredField { .. }
            | Error::InvalidPhaseTransition { .. }
            | Error::InvalidActorId { .. }
            | Error::DeserializationFailed { .. } => StatusCode::BAD_REQUEST,
            Error::ActorMailboxFull { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error = match status {
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::GONE => "gone",
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::TOO_MANY_REQUESTS => "too_many_requests",
            _ => "internal_error",
        };

        Self {
            status,
            body: ErrorResponse::new(error, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                Error::session_not_found("conv-1"),
                StatusCode::NOT_FOUND,
            ),
            (
                Error::InvalidResumeToken {
                    session_id: "conv-1".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                Error::SessionDeleted {
                    session_id: "conv-1".into(),
                },
                StatusCode::GONE,
            ),
            (Error::missing_field("firm_id"), StatusCode::BAD_REQUEST),
            (
                Error::ActorMailboxFull {
                    id: "conv-1".into(),
                    depth: 10,
                    max: 10,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let api_err = ApiError::from(err);
            assert_eq!(api_err.status, expected);
        }
    }
}
