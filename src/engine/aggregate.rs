//! Decision aggregator: fans the three analyzers out concurrently, joins
//! them under a composite deadline, and applies the override precedence
//! (rule-critical > med-override > model > rule-non-critical > default-low).

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::spawn_blocking;
use tokio::time::timeout;

use crate::config::Config;
use crate::models::{
    MedWarning, MedicationEntry, ModelOutcome, PatientSnapshot, RiskLevel, RuleOutcome,
    SymptomEntry, VitalsSnapshot,
};

use super::medication::MedicationEngine;
use super::model::ModelRegistry;
use super::{features, rules, EngineError};

/// Validated intake, ready for analysis.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub patient: PatientSnapshot,
    pub vitals: VitalsSnapshot,
    pub medications: Vec<MedicationEntry>,
    pub symptoms: Vec<SymptomEntry>,
    pub chief_complaint: String,
}

/// Fused result of one analyze call.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub rule: RuleOutcome,
    /// None when the model was unavailable or timed out.
    pub ml: Option<ModelOutcome>,
    pub med_warnings: Vec<MedWarning>,
    pub med_override: bool,
    /// True when the med engine failed and a warning-less assessment was
    /// produced.
    pub med_engine_failed: bool,
    pub final_risk_level: RiskLevel,
    pub final_risk_score: f64,
    pub recommendation: String,
    pub escalation_suggested: bool,
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Deadlines {
    rule: Duration,
    model: Duration,
    medication: Duration,
    composite: Duration,
}

pub struct DecisionEngine {
    model: Arc<ModelRegistry>,
    medication: Arc<MedicationEngine>,
    deadlines: Deadlines,
}

impl DecisionEngine {
    pub fn new(model: Arc<ModelRegistry>, medication: Arc<MedicationEngine>, cfg: &Config) -> Self {
        Self {
            model,
            medication,
            deadlines: Deadlines {
                rule: cfg.rule_deadline,
                model: cfg.model_deadline,
                medication: cfg.medication_deadline,
                composite: cfg.composite_deadline,
            },
        }
    }

    pub fn model_ready(&self) -> bool {
        self.model.is_ready()
    }

    /// Run the three analyzers concurrently and fuse their results.
    ///
    /// The rule guardrail is the safety floor: its deadline breach or panic
    /// fails the whole request. The model and med engine degrade.
    pub async fn analyze(&self, input: Arc<AnalysisInput>) -> Result<AnalysisOutput, EngineError> {
        let d = self.deadlines;

        let rule_task = {
            let input = input.clone();
            timeout(
                d.rule,
                spawn_blocking(move || {
                    rules::evaluate(
                        &input.vitals,
                        &input.symptoms,
                        &input.patient.vulnerability_flags,
                    )
                }),
            )
        };

        let model_task = {
            let input = input.clone();
            let model = self.model.clone();
            timeout(
                d.model,
                spawn_blocking(move || {
                    let fv = features::extract(&input.patient, &input.vitals, &input.symptoms);
                    model.predict(&fv)
                }),
            )
        };

        let med_task = {
            let input = input.clone();
            let medication = self.medication.clone();
            timeout(
                d.medication,
                spawn_blocking(move || {
                    medication.evaluate(
                        &input.medications,
                        &input.symptoms,
                        &input.patient.vulnerability_flags,
                    )
                }),
            )
        };

        let (rule_res, model_res, med_res) =
            timeout(d.composite, async { tokio::join!(rule_task, model_task, med_task) })
                .await
                .map_err(|_| EngineError::CompositeDeadline)?;

        let rule = match rule_res {
            Ok(Ok(rule)) => rule,
            Ok(Err(join)) => return Err(EngineError::RuleGuardrail(join.to_string())),
            Err(_) => return Err(EngineError::RuleDeadline(d.rule)),
        };

        let ml = match model_res {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join)) => {
                tracing::warn!(error = %join, "model task failed, treated as unavailable");
                None
            }
            Err(_) => {
                tracing::warn!(deadline_ms = d.model.as_millis() as u64,
                    "model task timed out, treated as unavailable");
                None
            }
        };

        let (mut med_warnings, med_override, med_engine_failed) = match med_res {
            Ok(Ok((warnings, escalate))) => (warnings, escalate, false),
            Ok(Err(join)) => {
                tracing::error!(error = %join, component = "medication_engine",
                    "med engine failed, producing warning-less assessment");
                (Vec::new(), false, true)
            }
            Err(_) => {
                tracing::error!(deadline_ms = d.medication.as_millis() as u64,
                    component = "medication_engine",
                    "med engine timed out, producing warning-less assessment");
                (Vec::new(), false, true)
            }
        };

        sort_warnings(&mut med_warnings);

        let final_risk_level = if rule.is_critical() {
            // ML is suppressed from level selection but still recorded.
            RiskLevel::Critical
        } else if med_override {
            ml.as_ref()
                .map(|m| m.risk_level)
                .unwrap_or(RiskLevel::Low)
                .max(RiskLevel::High)
        } else if let Some(model) = &ml {
            model.risk_level
        } else {
            rule.risk_level.unwrap_or(RiskLevel::Low)
        };

        let final_risk_score = match &ml {
            Some(model) => model.risk_probability,
            None => match final_risk_level {
                RiskLevel::Critical => 1.0,
                RiskLevel::High => 0.70,
                RiskLevel::Moderate => 0.45,
                RiskLevel::Low => 0.15,
            },
        };

        let escalation_suggested =
            final_risk_level >= RiskLevel::High || med_override;

        let recommendation = build_recommendation(
            final_risk_level,
            &rule.reasons,
            ml.as_ref().map(|m| m.shap_text.as_str()),
            &med_warnings,
            input.patient.vulnerability_flags.pregnant,
            med_engine_failed,
        );

        let model_version = if ml.is_some() {
            self.model.version().map(str::to_string)
        } else {
            None
        };

        Ok(AnalysisOutput {
            rule,
            ml,
            med_warnings,
            med_override,
            med_engine_failed,
            final_risk_level,
            final_risk_score,
            recommendation,
            escalation_suggested,
            model_version,
        })
    }
}

/// Deterministic tie-break order: contraindicated > severe > moderate >
/// mild; within a severity drug-drug before drug-condition before
/// drug-symptom; within a category alphabetical on drug1 then drug2.
pub fn sort_warnings(warnings: &mut [MedWarning]) {
    warnings.sort_by(|a, b| {
        Reverse(a.severity)
            .cmp(&Reverse(b.severity))
            .then(a.warning_type.cmp(&b.warning_type))
            .then_with(|| a.drug1.to_lowercase().cmp(&b.drug1.to_lowercase()))
            .then_with(|| {
                a.drug2
                    .as_deref()
                    .map(str::to_lowercase)
                    .cmp(&b.drug2.as_deref().map(str::to_lowercase))
            })
    });
}

/// Template-driven recommendation. Same inputs produce byte-identical text.
fn build_recommendation(
    level: RiskLevel,
    rule_reasons: &[String],
    shap_text: Option<&str>,
    warnings: &[MedWarning],
    pregnant: bool,
    med_engine_failed: bool,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(
        match level {
            RiskLevel::Critical => "IMMEDIATE ESCALATION REQUIRED.",
            RiskLevel::High => "URGENT: Escalation to specialist strongly recommended.",
            RiskLevel::Moderate => {
                "CAUTION: Close monitoring required. Consider specialist consultation."
            }
            RiskLevel::Low => "LOW RISK: Can be managed at primary-care level with standard protocols.",
        }
        .to_string(),
    );

    if let Some(first) = rule_reasons.first() {
        lines.push(format!("Finding: {first}"));
    }

    if let Some(text) = shap_text {
        lines.push(format!("Model interpretation: {text}"));
    }

    for warning in warnings {
        lines.push(format!(
            "[{}] {}",
            warning.severity.as_str().to_uppercase(),
            warning.message
        ));
    }

    if med_engine_failed {
        lines.push(
            "Medication screening was unavailable for this assessment; review current medications manually."
                .to_string(),
        );
    }

    if pregnant && level >= RiskLevel::High {
        lines.push(
            "Maternal emergency protocol: ensure IV access and monitor fetal heart rate."
                .to_string(),
        );
    }

    lines.join(" ")
}
