use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{RiskLevel, WarningSeverity, WarningType};

/// Output of the deterministic rule guardrail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub triggered: bool,
    pub risk_level: Option<RiskLevel>,
    pub reasons: Vec<String>,
    pub override_ml: bool,
}

impl RuleOutcome {
    pub fn quiet() -> Self {
        Self {
            triggered: false,
            risk_level: None,
            reasons: Vec::new(),
            override_ml: false,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.risk_level == Some(RiskLevel::Critical)
    }
}

/// One feature's signed contribution to a single prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    pub value: f64,
    pub shap_value: f64,
    pub label: String,
}

/// Output of the probabilistic risk model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub risk_probability: f64,
    pub risk_level: RiskLevel,
    pub shap_features: Vec<Attribution>,
    pub shap_text: String,
}

/// One medication safety warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedWarning {
    pub drug1: String,
    #[serde(default)]
    pub drug2: Option<String>,
    pub warning_type: WarningType,
    pub severity: WarningSeverity,
    pub message: String,
    pub action_required: bool,
    pub override_triggered: bool,
}

/// Four-field structured clinical handover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sbar {
    pub situation: String,
    pub background: String,
    pub assessment: String,
    pub recommendation: String,
}

/// Immutable record of one analyze call: the three analyzer outputs plus the
/// fused verdict. SBAR fields are filled in when the case escalates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub case_id: Uuid,
    pub rule: RuleOutcome,
    /// None when the model component was unavailable for this call.
    pub ml: Option<ModelOutcome>,
    pub med_warnings: Vec<MedWarning>,
    pub med_override_triggered: bool,
    pub final_risk_level: RiskLevel,
    pub final_risk_score: f64,
    pub recommendation: String,
    pub escalation_suggested: bool,
    pub model_version: Option<String>,
    #[serde(default)]
    pub sbar: Option<Sbar>,
    pub assessed_at: DateTime<Utc>,
}
