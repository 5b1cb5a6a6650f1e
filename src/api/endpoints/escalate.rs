//! `POST /api/v1/escalate` — mint a specialist magic link, generate the
//! SBAR handover, transition the case, and broadcast the status change.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PhwIdentity, RequestMeta};
use crate::bus::CaseEvent;
use crate::models::{CaseStatus, FieldError, Sbar};
use crate::token;

use super::audit_ctx;

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub case_id: Uuid,
    pub escalation_reason: String,
    #[serde(default)]
    pub specialist_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct EscalateResponse {
    pub case_id: Uuid,
    pub specialist_magic_link: String,
    pub sbar: Sbar,
    pub escalated_at: DateTime<Utc>,
}

pub async fn escalate(
    State(ctx): State<ApiContext>,
    Extension(phw): Extension<PhwIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Json(payload): Json<EscalateRequest>,
) -> Result<Json<EscalateResponse>, ApiError> {
    if payload.escalation_reason.trim().len() < 10 {
        return Err(ApiError::validation(vec![FieldError::new(
            "escalation_reason",
            "must be at least 10 characters",
        )]));
    }

    // transitions on one case are totally ordered
    let lock = ctx.store.case_lock(payload.case_id);
    let _guard = lock.lock().await;

    let case = ctx
        .store
        .get_case(payload.case_id)?
        .ok_or_else(|| ApiError::NotFound("Case not found".into()))?;
    if case.phw_id != phw.id {
        return Err(ApiError::Forbidden(
            "Not authorized to escalate this case".into(),
        ));
    }

    // escalation without an assessment has nothing to hand over
    let assessment = ctx
        .store
        .latest_assessment(case.id)?
        .ok_or(ApiError::State {
            current: case.status,
        })?;
    let vitals = ctx
        .store
        .latest_vitals(case.id)?
        .ok_or_else(|| ApiError::Internal("case has no recorded vitals".into()))?;

    let previous_status = case.status;
    let minted = token::mint(ctx.config.escalation_token_ttl);
    let case = ctx.store.mint_escalation(
        case.id,
        payload.escalation_reason.trim(),
        payload.specialist_id,
        &minted.hash_hex,
        minted.expires_at,
        &audit_ctx(&meta, Some(&phw)),
    )?;

    // committed escalation is never rolled back by handover failure
    let sbar = ctx
        .handover
        .generate(&case, &vitals, &assessment, payload.escalation_reason.trim())
        .await;
    if let Err(e) = ctx.store.set_sbar(assessment.id, &sbar) {
        tracing::warn!(case_id = %case.id, error = %e, "failed to persist handover text");
    }

    if previous_status != CaseStatus::Escalated {
        ctx.bus
            .publish(case.id, CaseEvent::status_update(case.id, case.status));
    }

    tracing::info!(
        request_id = %meta.request_id,
        case_id = %case.id,
        phw = %phw.id,
        "case escalated"
    );

    let specialist_magic_link = format!(
        "{}/specialist/portal/{}",
        ctx.config.public_base_url, minted.token
    );

    Ok(Json(EscalateResponse {
        case_id: case.id,
        specialist_magic_link,
        sbar,
        escalated_at: case.updated_at,
    }))
}
