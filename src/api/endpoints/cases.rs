//! PHW case listing, detail, and lifecycle endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PhwIdentity, RequestMeta};
use crate::bus::CaseEvent;
use crate::models::{
    Case, CaseStatus, MedicationEntry, PatientSnapshot, SpecialistAdvice, SymptomEntry,
    VitalsSnapshot,
};

use super::{audit_ctx, AssessmentDto};

#[derive(Debug, Serialize)]
pub struct CaseSummary {
    pub id: Uuid,
    pub status: CaseStatus,
    pub chief_complaint: String,
    pub patient: PatientSnapshot,
    pub escalation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Case> for CaseSummary {
    fn from(case: Case) -> Self {
        Self {
            id: case.id,
            status: case.status,
            chief_complaint: case.chief_complaint,
            patient: case.patient,
            escalation_reason: case.escalation_reason,
            created_at: case.created_at,
            updated_at: case.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CaseDetail {
    #[serde(flatten)]
    pub summary: CaseSummary,
    pub vitals: Option<VitalsSnapshot>,
    pub medications: Vec<MedicationEntry>,
    pub symptoms: Vec<SymptomEntry>,
    pub assessments: Vec<AssessmentDto>,
    pub advice: Vec<SpecialistAdvice>,
}

/// `GET /api/v1/cases` — the caller's own live cases, newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(phw): Extension<PhwIdentity>,
) -> Result<Json<Vec<CaseSummary>>, ApiError> {
    let cases = ctx.store.list_cases_for_phw(phw.id)?;
    Ok(Json(cases.into_iter().map(CaseSummary::from).collect()))
}

/// `GET /api/v1/cases/{id}` — full detail, owner only.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(phw): Extension<PhwIdentity>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<CaseDetail>, ApiError> {
    let case = owned_case(&ctx, &phw, case_id)?;

    Ok(Json(CaseDetail {
        vitals: ctx.store.latest_vitals(case.id)?,
        medications: ctx.store.medications_for_case(case.id)?,
        symptoms: ctx.store.symptoms_for_case(case.id)?,
        assessments: ctx
            .store
            .assessments_for_case(case.id)?
            .into_iter()
            .map(AssessmentDto::from)
            .collect(),
        advice: ctx.store.advice_for_case(case.id)?,
        summary: case.into(),
    }))
}

/// `POST /api/v1/cases/{id}/close` — owning PHW closes the case; any live
/// escalation token is revoked.
pub async fn close(
    State(ctx): State<ApiContext>,
    Extension(phw): Extension<PhwIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<CaseSummary>, ApiError> {
    transition(&ctx, &phw, &meta, case_id, CaseStatus::Closed).await
}

/// `POST /api/v1/cases/{id}/cancel` — terminal from any non-closed state.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(phw): Extension<PhwIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<CaseSummary>, ApiError> {
    transition(&ctx, &phw, &meta, case_id, CaseStatus::Cancelled).await
}

async fn transition(
    ctx: &ApiContext,
    phw: &PhwIdentity,
    meta: &RequestMeta,
    case_id: Uuid,
    to: CaseStatus,
) -> Result<Json<CaseSummary>, ApiError> {
    let lock = ctx.store.case_lock(case_id);
    let _guard = lock.lock().await;

    let case = ctx
        .store
        .get_case(case_id)?
        .ok_or_else(|| ApiError::NotFound("Case not found".into()))?;
    if case.phw_id != phw.id {
        return Err(ApiError::Forbidden(
            "Not authorized to modify this case".into(),
        ));
    }

    let case = ctx
        .store
        .update_status(case_id, to, &audit_ctx(meta, Some(phw)))?;
    ctx.bus
        .publish(case.id, CaseEvent::status_update(case.id, case.status));

    Ok(Json(case.into()))
}

fn owned_case(ctx: &ApiContext, phw: &PhwIdentity, case_id: Uuid) -> Result<Case, ApiError> {
    let case = ctx
        .store
        .get_case(case_id)?
        .ok_or_else(|| ApiError::NotFound("Case not found".into()))?;
    if case.phw_id != phw.id {
        // reads are scoped; foreign cases look absent
        return Err(ApiError::NotFound("Case not found".into()));
    }
    Ok(case)
}
