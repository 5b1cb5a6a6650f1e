//! API error types with `{"detail": ...}` JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::StoreError;
use crate::engine::EngineError;
use crate::models::{CaseStatus, FieldError};

/// Error response body: a single human-readable `detail` string.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Where an escalation token was presented; the status class differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    Portal,
    Advice,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Escalation token invalid")]
    TokenInvalid(TokenUse),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Transition not permitted from status '{current}'")]
    State { current: CaseStatus },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "Validation failed: {}",
                    crate::models::field_errors_detail(errors)
                ),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, detail.clone()),
            ApiError::TokenInvalid(TokenUse::Portal) => (
                StatusCode::NOT_FOUND,
                "Escalation token unknown, expired, or revoked".to_string(),
            ),
            ApiError::TokenInvalid(TokenUse::Advice) => (
                StatusCode::FORBIDDEN,
                "Escalation token unknown, expired, or revoked".to_string(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail.clone()),
            ApiError::State { current } => (
                StatusCode::CONFLICT,
                format!("Transition not permitted from status '{current}'"),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        // the rule guardrail is the safety floor; all engine-fatal paths
        // surface as internal errors
        ApiError::Internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CaseNotFound => ApiError::NotFound("Case not found".into()),
            StoreError::AssessmentMissing => ApiError::State {
                current: CaseStatus::Intake,
            },
            StoreError::InvalidTransition { from, .. } => ApiError::State { current: from },
            StoreError::AdviceNotAccepted { current } => ApiError::State { current },
            // context-sensitive; endpoints usually map this themselves
            StoreError::TokenInvalid => ApiError::TokenInvalid(TokenUse::Portal),
            StoreError::Database(e) => ApiError::Internal(e.to_string()),
            StoreError::LockPoisoned => ApiError::Internal("store lock poisoned".into()),
        }
    }
}
