//! Bearer token authentication middleware for PHW routes.
//!
//! Extracts `Authorization: Bearer <token>`, validates against the PHW
//! registry, and injects `PhwIdentity` into request extensions for
//! downstream handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PhwIdentity};

pub async fn require_phw(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_phw_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_phw_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let identity: PhwIdentity = ctx
        .authenticate_phw(bearer)
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
