//! `POST /api/v1/analyze/risk` — the hybrid decision pipeline.
//!
//! Validates the intake, fans out the three analyzers, persists patient
//! snapshot + case + vitals + assessment in one transaction, and returns
//! the full assessment.

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PhwIdentity, RequestMeta};
use crate::bus::CaseEvent;
use crate::engine::AnalysisInput;
use crate::models::{
    FieldError, MedicationEntry, PatientSnapshot, SymptomEntry, VitalsSnapshot,
};

use super::{audit_ctx, AssessmentDto};

const MAX_LIST_ITEMS: usize = 30;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub patient: PatientSnapshot,
    pub vitals: VitalsSnapshot,
    #[serde(default)]
    pub medications: Vec<MedicationEntry>,
    #[serde(default)]
    pub symptoms: Vec<SymptomEntry>,
    pub chief_complaint: String,
}

impl AnalyzeRequest {
    /// Collect every offending field; analyzers never see invalid input.
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        self.patient.validate(&mut errors);
        self.vitals.validate(&mut errors);

        if self.medications.len() > MAX_LIST_ITEMS {
            errors.push(FieldError::new("medications", "at most 30 entries"));
        }
        for (i, med) in self.medications.iter().enumerate() {
            med.validate(i, &mut errors);
        }
        if self.symptoms.len() > MAX_LIST_ITEMS {
            errors.push(FieldError::new("symptoms", "at most 30 entries"));
        }
        for (i, symptom) in self.symptoms.iter().enumerate() {
            symptom.validate(i, &mut errors);
        }

        let complaint_len = self.chief_complaint.trim().len();
        if !(5..=1000).contains(&complaint_len) {
            errors.push(FieldError::new(
                "chief_complaint",
                "must be between 5 and 1000 characters",
            ));
        }
        errors
    }
}

pub async fn risk(
    State(ctx): State<ApiContext>,
    Extension(phw): Extension<PhwIdentity>,
    Extension(meta): Extension<RequestMeta>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AssessmentDto>, ApiError> {
    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let input = Arc::new(AnalysisInput {
        patient: payload.patient,
        vitals: payload.vitals,
        medications: payload.medications,
        symptoms: payload.symptoms,
        chief_complaint: payload.chief_complaint,
    });

    tracing::info!(request_id = %meta.request_id, phw = %phw.id, "risk analysis started");
    let output = ctx.engine.analyze(input.clone()).await?;

    let (case, assessment) =
        ctx.store
            .record_analysis(phw.id, &input, &output, &audit_ctx(&meta, Some(&phw)))?;

    tracing::info!(
        request_id = %meta.request_id,
        case_id = %case.id,
        assessment_id = %assessment.id,
        final_risk_level = %assessment.final_risk_level,
        "risk analysis complete"
    );

    ctx.bus
        .publish(case.id, CaseEvent::status_update(case.id, case.status));

    Ok(Json(assessment.into()))
}
