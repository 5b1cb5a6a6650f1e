//! Live event surface: `GET /ws/case/{case_id}` upgraded to a case room
//! subscription.
//!
//! Auth is either a PHW bearer token (`?token=`) or an escalation token
//! (`?escalation_token=`); the subscriber's role follows from which was
//! presented. Server pushes STATUS_UPDATE / ADVICE_PUSH events and a PING
//! after 30 seconds of idle; client messages are ignored except that any
//! traffic counts as liveness.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::{ApiError, TokenUse};
use crate::api::types::ApiContext;
use crate::bus::{CaseEvent, SubscriberRole};

/// PING is emitted after this much idle time on a connection.
const IDLE_PING: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
pub struct WsAuthQuery {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    escalation_token: Option<String>,
}

pub async fn ws_case(
    ws: WebSocketUpgrade,
    Path(case_id): Path<Uuid>,
    Query(query): Query<WsAuthQuery>,
    State(ctx): State<ApiContext>,
) -> Result<impl IntoResponse, ApiError> {
    let role = authorize(&ctx, case_id, &query)?;
    tracing::info!(case_id = %case_id, role = ?role, "websocket upgrade accepted");
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, ctx, case_id, role)))
}

/// Derive the subscriber role from the presented credential.
fn authorize(
    ctx: &ApiContext,
    case_id: Uuid,
    query: &WsAuthQuery,
) -> Result<SubscriberRole, ApiError> {
    if let Some(escalation_token) = &query.escalation_token {
        let case = ctx
            .store
            .validate_escalation_token(escalation_token, Utc::now())
            .map_err(|_| ApiError::TokenInvalid(TokenUse::Portal))?;
        if case.id != case_id {
            return Err(ApiError::TokenInvalid(TokenUse::Portal));
        }
        return Ok(SubscriberRole::Specialist);
    }

    if let Some(bearer) = &query.token {
        let phw = ctx
            .authenticate_phw(bearer)
            .ok_or(ApiError::Unauthorized)?;
        let case = ctx
            .store
            .get_case(case_id)?
            .ok_or_else(|| ApiError::NotFound("Case not found".into()))?;
        if case.phw_id != phw.id {
            return Err(ApiError::Forbidden("Not a member of this case".into()));
        }
        return Ok(SubscriberRole::Phw);
    }

    Err(ApiError::Unauthorized)
}

async fn handle_ws(socket: WebSocket, ctx: ApiContext, case_id: Uuid, role: SubscriberRole) {
    let mut subscription = ctx.bus.subscribe(case_id, role);
    let (mut sink, mut stream) = socket.split();

    let mut idle = tokio::time::interval(IDLE_PING);
    idle.reset(); // no immediate tick

    loop {
        tokio::select! {
            event = subscription.rx.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                        idle.reset();
                    }
                    // dropped by the bus (slow consumer) or bus shutdown
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // pongs and any client chatter are ignored
                    Some(Ok(_)) => {}
                }
            }
            _ = idle.tick() => {
                if send_event(&mut sink, &CaseEvent::ping()).await.is_err() {
                    break;
                }
            }
        }
    }

    ctx.bus.unsubscribe(case_id, subscription.id);
    let _ = sink.close().await;
    tracing::info!(case_id = %case_id, role = ?role, "websocket disconnected");
}

async fn send_event(
    sink: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
    event: &CaseEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sink.send(Message::Text(json.into())).await
}
