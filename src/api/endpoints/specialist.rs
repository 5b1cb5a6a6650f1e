//! Specialist surface: magic-link portal read and advice submission.
//!
//! The escalation token is the only credential on both routes. Portal
//! reads answer 404 on a bad token; advice submissions answer 403.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::{ApiError, TokenUse};
use crate::api::types::{ApiContext, RequestMeta};
use crate::bus::CaseEvent;
use crate::db::StoreError;
use crate::models::{
    AdvicePayload, CaseStatus, MedicationEntry, PatientSnapshot, Sbar, SymptomEntry,
    VitalsSnapshot,
};

use super::{audit_ctx, AssessmentDto};

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub case_id: Uuid,
    pub patient_summary: PatientSnapshot,
    pub vitals: Option<VitalsSnapshot>,
    pub symptoms: Vec<SymptomEntry>,
    pub medications: Vec<MedicationEntry>,
    pub risk_assessment: Option<AssessmentDto>,
    pub sbar: Option<Sbar>,
    pub phw_name: String,
    pub facility: String,
    pub chief_complaint: String,
    pub status: CaseStatus,
    pub escalated_at: DateTime<Utc>,
}

/// `GET /api/v1/specialist/portal/{token}` — the token is the auth.
pub async fn portal(
    State(ctx): State<ApiContext>,
    Extension(meta): Extension<RequestMeta>,
    Path(presented_token): Path<String>,
) -> Result<Json<PortalResponse>, ApiError> {
    let (case, transitioned) = ctx
        .store
        .consume_escalation(&presented_token, Utc::now(), &audit_ctx(&meta, None))
        .map_err(|e| match e {
            StoreError::TokenInvalid => ApiError::TokenInvalid(TokenUse::Portal),
            other => other.into(),
        })?;

    if transitioned {
        ctx.bus
            .publish(case.id, CaseEvent::status_update(case.id, case.status));
    }

    let assessment = ctx.store.latest_assessment(case.id)?;
    let sbar = assessment.as_ref().and_then(|a| a.sbar.clone());
    let vitals = ctx.store.latest_vitals(case.id)?;
    let symptoms = ctx.store.symptoms_for_case(case.id)?;
    let medications = ctx.store.medications_for_case(case.id)?;

    let phw = ctx
        .phws
        .lock()
        .ok()
        .and_then(|registry| registry.get(&case.phw_id));

    tracing::info!(case_id = %case.id, "specialist portal loaded");

    Ok(Json(PortalResponse {
        case_id: case.id,
        patient_summary: case.patient.clone(),
        vitals,
        symptoms,
        medications,
        risk_assessment: assessment.map(AssessmentDto::from),
        sbar,
        phw_name: phw
            .as_ref()
            .map(|p| p.full_name.clone())
            .unwrap_or_else(|| "Unknown".into()),
        facility: phw
            .map(|p| p.facility)
            .unwrap_or_else(|| "Unknown".into()),
        chief_complaint: case.chief_complaint.clone(),
        status: case.status,
        escalated_at: case.updated_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AdviceRequest {
    pub case_id: Uuid,
    #[serde(flatten)]
    pub payload: AdvicePayload,
}

#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    pub status: &'static str,
    pub case_id: Uuid,
}

/// `POST /api/v1/specialist/advice` — token auth via bearer header.
pub async fn advice(
    State(ctx): State<ApiContext>,
    Extension(meta): Extension<RequestMeta>,
    headers: HeaderMap,
    Json(request): Json<AdviceRequest>,
) -> Result<Json<AdviceResponse>, ApiError> {
    let presented_token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let mut errors = Vec::new();
    request.payload.validate(&mut errors);
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    // advice submissions for one case are appended in lock order and each
    // fires exactly one ADVICE_PUSH
    let lock = ctx.store.case_lock(request.case_id);
    let _guard = lock.lock().await;

    let (case, advice_row, previous_status) = ctx
        .store
        .append_advice(
            &presented_token,
            request.case_id,
            request.payload,
            Utc::now(),
            ctx.config.escalation_token_single_use,
            &audit_ctx(&meta, None),
        )
        .map_err(|e| match e {
            StoreError::TokenInvalid => ApiError::TokenInvalid(TokenUse::Advice),
            other => other.into(),
        })?;

    if previous_status != case.status {
        ctx.bus
            .publish(case.id, CaseEvent::status_update(case.id, case.status));
    }
    ctx.bus.publish(case.id, CaseEvent::advice_push(advice_row));

    tracing::info!(
        request_id = %meta.request_id,
        case_id = %case.id,
        "specialist advice submitted"
    );

    Ok(Json(AdviceResponse {
        status: "ok",
        case_id: case.id,
    }))
}
