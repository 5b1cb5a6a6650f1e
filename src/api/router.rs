//! API router, versioned under `/api/v1`.
//!
//! Middleware stack (outermost -> innermost):
//! Extension(ctx) -> request context -> auth (PHW routes only) -> audit log

use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;

/// Build the full application router.
pub fn api_router(ctx: ApiContext) -> Router {
    // PHW routes: bearer auth + full middleware stack
    let phw_routes = Router::new()
        .route("/analyze/risk", post(endpoints::analyze::risk))
        .route("/escalate", post(endpoints::escalate::escalate))
        .route("/cases", get(endpoints::cases::list))
        .route("/cases/{id}", get(endpoints::cases::detail))
        .route("/cases/{id}/close", post(endpoints::cases::close))
        .route("/cases/{id}/cancel", post(endpoints::cases::cancel))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_phw))
        .layer(axum::middleware::from_fn(middleware::audit::request_context))
        .layer(axum::Extension(ctx.clone()));

    // Specialist routes: the escalation token is the auth
    let specialist_routes = Router::new()
        .route(
            "/specialist/portal/{token}",
            get(endpoints::specialist::portal),
        )
        .route("/specialist/advice", post(endpoints::specialist::advice))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::audit::request_context))
        .layer(axum::Extension(ctx.clone()));

    // WebSocket upgrade route; auth happens inside the handler
    let ws_routes = Router::new()
        .route("/ws/case/{case_id}", get(websocket::ws_case))
        .with_state(ctx.clone())
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api/v1", phw_routes)
        .nest("/api/v1", specialist_routes)
        .merge(ws_routes)
}
