//! SBAR handover generation.
//!
//! An optional external text service can draft the four fields; any failure
//! or timeout falls back to a deterministic template so escalation is never
//! blocked on a third-party service. Generation never mutates case state.

use std::time::Duration;

use serde::Serialize;

use crate::models::{Case, RiskAssessment, Sbar, VitalsSnapshot};

pub struct HandoverGenerator {
    client: reqwest::Client,
    service_url: Option<String>,
}

/// Payload sent to the external drafting service.
#[derive(Serialize)]
struct HandoverRequest<'a> {
    age: u16,
    sex: &'a str,
    vulnerability_flags: Vec<&'static str>,
    chief_complaint: &'a str,
    escalation_reason: &'a str,
    vitals: &'a VitalsSnapshot,
    final_risk_level: &'a str,
    final_risk_score: f64,
    rule_reasons: &'a [String],
    shap_text: Option<&'a str>,
    recommendation: &'a str,
}

impl HandoverGenerator {
    pub fn new(service_url: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            service_url,
        }
    }

    /// Disabled external service; the fallback template is always used.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(5))
    }

    /// Produce the SBAR for an escalation. Infallible by design.
    pub async fn generate(
        &self,
        case: &Case,
        vitals: &VitalsSnapshot,
        assessment: &RiskAssessment,
        escalation_reason: &str,
    ) -> Sbar {
        if let Some(url) = &self.service_url {
            match self
                .request_external(url, case, vitals, assessment, escalation_reason)
                .await
            {
                Ok(sbar) => {
                    tracing::info!(case_id = %case.id, "handover drafted by external service");
                    return sbar;
                }
                Err(e) => {
                    tracing::warn!(case_id = %case.id, error = %e,
                        "handover service failed, using fallback template");
                }
            }
        }
        fallback_sbar(case, vitals, assessment)
    }

    async fn request_external(
        &self,
        url: &str,
        case: &Case,
        vitals: &VitalsSnapshot,
        assessment: &RiskAssessment,
        escalation_reason: &str,
    ) -> Result<Sbar, reqwest::Error> {
        let payload = HandoverRequest {
            age: case.patient.age,
            sex: case.patient.sex.as_str(),
            vulnerability_flags: case.patient.vulnerability_flags.active(),
            chief_complaint: &case.chief_complaint,
            escalation_reason,
            vitals,
            final_risk_level: assessment.final_risk_level.as_str(),
            final_risk_score: assessment.final_risk_score,
            rule_reasons: &assessment.rule.reasons,
            shap_text: assessment.ml.as_ref().map(|m| m.shap_text.as_str()),
            recommendation: &assessment.recommendation,
        };

        let response = self.client.post(url).json(&payload).send().await?;
        response.error_for_status()?.json::<Sbar>().await
    }
}

/// Deterministic SBAR template built from case and assessment fields.
pub fn fallback_sbar(case: &Case, vitals: &VitalsSnapshot, assessment: &RiskAssessment) -> Sbar {
    let level = assessment.final_risk_level.as_str().to_uppercase();
    let reasons = if assessment.rule.reasons.is_empty() {
        "risk model assessment".to_string()
    } else {
        assessment.rule.reasons.join("; ")
    };

    let situation = format!(
        "A {}-year-old {} patient presenting with {} has been escalated with risk level: {}. \
         SpO2 {:.1}%, BP {}/{} mmHg.",
        case.patient.age,
        case.patient.sex,
        case.chief_complaint,
        level,
        vitals.spo2,
        vitals.systolic_bp,
        vitals.diastolic_bp,
    );

    let background = format!(
        "HR {} bpm, RR {}/min, Temp {:.1}°C. Risk assessment score: {:.1}%. \
         Escalation triggered by: {}.",
        vitals.heart_rate,
        vitals.respiratory_rate,
        vitals.temperature,
        assessment.final_risk_score * 100.0,
        reasons,
    );

    let assessment_text = match &assessment.ml {
        Some(ml) => format!(
            "Hybrid decision engine classified as {} risk. {}Model risk probability: {:.1}%.",
            level,
            if assessment.rule.override_ml {
                "Rule guardrail override applied. "
            } else {
                ""
            },
            ml.risk_probability * 100.0,
        ),
        None => format!("Rule engine triggered: {reasons}."),
    };

    let recommendation = format!(
        "Specialist review required. Please assess vitals trend, consider investigations, \
         and advise on management plan. Case marked {level} priority.",
    );

    Sbar {
        situation,
        background,
        assessment: assessment_text,
        recommendation,
    }
}
