pub mod analyze;
pub mod cases;
pub mod escalate;
pub mod specialist;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::types::{PhwIdentity, RequestMeta};
use crate::db::AuditContext;
use crate::models::{MedWarning, ModelOutcome, RiskAssessment, RiskLevel, RuleOutcome, Sbar};

/// Assessment fields as returned on the wire.
#[derive(Debug, Serialize)]
pub struct AssessmentDto {
    pub assessment_id: Uuid,
    pub case_id: Uuid,
    pub final_risk_level: RiskLevel,
    pub final_risk_score: f64,
    pub rule_engine: RuleOutcome,
    pub ml_result: Option<ModelOutcome>,
    pub med_warnings: Vec<MedWarning>,
    pub recommendation: String,
    pub escalation_suggested: bool,
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sbar: Option<Sbar>,
    pub assessed_at: DateTime<Utc>,
}

impl From<RiskAssessment> for AssessmentDto {
    fn from(a: RiskAssessment) -> Self {
        Self {
            assessment_id: a.id,
            case_id: a.case_id,
            final_risk_level: a.final_risk_level,
            final_risk_score: a.final_risk_score,
            rule_engine: a.rule,
            ml_result: a.ml,
            med_warnings: a.med_warnings,
            recommendation: a.recommendation,
            escalation_suggested: a.escalation_suggested,
            model_version: a.model_version,
            sbar: a.sbar,
            assessed_at: a.assessed_at,
        }
    }
}

/// Build the audit context for a store mutation from request metadata.
pub fn audit_ctx(meta: &RequestMeta, user: Option<&PhwIdentity>) -> AuditContext {
    AuditContext {
        user_id: user.map(|p| p.id.to_string()),
        ip: meta.ip.clone(),
        request_id: Some(meta.request_id.to_string()),
    }
}
