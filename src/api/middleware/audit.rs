//! Request context + audit logging middleware.
//!
//! The outer layer assigns a request id (echoed as `X-Request-ID`) and
//! captures the peer address; the inner layer logs every request with the
//! acting user and response status after the handler runs.

use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::api::types::{ApiContext, PhwIdentity, RequestMeta};

/// Outermost-but-extension layer: attach request metadata.
pub async fn request_context(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string());
    let meta = RequestMeta {
        request_id: Uuid::new_v4(),
        ip,
    };
    let request_id = meta.request_id;
    req.extensions_mut().insert(meta);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("X-Request-ID", value);
    }
    response
}

/// Log API access for the audit trail. Runs after auth has injected
/// `PhwIdentity` (absent for token-authenticated specialist routes).
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let ctx = req.extensions().get::<ApiContext>().cloned();
    let meta = req.extensions().get::<RequestMeta>().cloned();
    let user = req
        .extensions()
        .get::<PhwIdentity>()
        .map(|p| p.id.to_string());

    let response = next.run(req).await;
    let status = response.status().as_u16();

    tracing::info!(
        method = %method,
        path = %path,
        status,
        user = user.as_deref().unwrap_or("-"),
        request_id = %meta.as_ref().map(|m| m.request_id.to_string()).unwrap_or_default(),
        "request"
    );

    if let (Some(ctx), Some(meta)) = (ctx, meta) {
        let entry_request_id = meta.request_id.to_string();
        let resource = format!("{method} {path}");
        let status_value = format!("status:{status}");
        if let Ok(conn) = ctx.store.audit_conn() {
            let result = crate::db::repository::audit::insert_audit(
                &conn,
                &crate::db::repository::audit::AuditEntry {
                    user_id: user.as_deref(),
                    action: "http_request",
                    resource: &resource,
                    ip: meta.ip.as_deref(),
                    request_id: Some(&entry_request_id),
                    old_value: None,
                    new_value: Some(&status_value),
                },
            );
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to write request audit row");
            }
        }
    }

    response
}
