//! Deterministic vitals/symptom rule guardrail.
//!
//! Pure total function over one intake snapshot. Each triggered threshold
//! contributes a human-readable reason and a candidate severity; the result
//! level is the maximum across triggered rules. A critical result always
//! overrides the probabilistic model downstream.

use crate::models::{
    RiskLevel, RuleOutcome, SymptomEntry, VitalsSnapshot, VulnerabilityFlags,
};

// Critical thresholds
const SPO2_CRITICAL: f64 = 90.0;
const SBP_LOW_CRITICAL: u16 = 90;
const SBP_HIGH_CRITICAL: u16 = 220;
const RR_LOW_CRITICAL: u16 = 8;
const RR_HIGH_CRITICAL: u16 = 30;
const HR_LOW_CRITICAL: u16 = 40;
const HR_HIGH_CRITICAL: u16 = 130;
const TEMP_LOW_CRITICAL: f64 = 35.0;
const TEMP_HIGH_CRITICAL: f64 = 39.5;
const GCS_CRITICAL: u8 = 13;
const PREECLAMPSIA_SBP: u16 = 140;
const PREECLAMPSIA_DBP: u16 = 90;

// High thresholds
const HR_TACHY_HIGH: u16 = 120;
const SPO2_LOW_HIGH: f64 = 94.0;
const TEMP_FEVER_HIGH: f64 = 38.5;

// Moderate thresholds
const SHOCK_INDEX_MODERATE: f64 = 1.0;
const IMMUNOCOMP_FEVER: f64 = 38.0;
const BG_SEVERE_HYPO: u16 = 54;
const BG_SEVERE_HYPER: u16 = 400;

fn trigger(
    reasons: &mut Vec<String>,
    level: &mut Option<RiskLevel>,
    candidate: RiskLevel,
    reason: String,
) {
    reasons.push(reason);
    *level = Some(match *level {
        Some(current) => current.max(candidate),
        None => candidate,
    });
}

/// Evaluate the guardrail. Deterministic, no I/O.
pub fn evaluate(
    vitals: &VitalsSnapshot,
    symptoms: &[SymptomEntry],
    flags: &VulnerabilityFlags,
) -> RuleOutcome {
    let mut reasons: Vec<String> = Vec::new();
    let mut level: Option<RiskLevel> = None;

    // ── Critical thresholds, table order ──────────────────────────────────
    if vitals.spo2 < SPO2_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!("Severe oxygen desaturation: SpO2 = {:.1}%", vitals.spo2),
        );
    }
    if vitals.systolic_bp < SBP_LOW_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!(
                "Severe hypotension/shock risk: SBP = {} mmHg",
                vitals.systolic_bp
            ),
        );
    } else if vitals.systolic_bp > SBP_HIGH_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!(
                "Hypertensive crisis: BP = {}/{} mmHg",
                vitals.systolic_bp, vitals.diastolic_bp
            ),
        );
    }
    if vitals.respiratory_rate < RR_LOW_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!("Severe bradypnoea: RR = {}/min", vitals.respiratory_rate),
        );
    } else if vitals.respiratory_rate > RR_HIGH_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!(
                "Severe respiratory distress: RR = {}/min",
                vitals.respiratory_rate
            ),
        );
    }
    if vitals.heart_rate < HR_LOW_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!("Severe bradycardia: HR = {} bpm", vitals.heart_rate),
        );
    } else if vitals.heart_rate > HR_HIGH_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!("Severe tachycardia: HR = {} bpm", vitals.heart_rate),
        );
    }
    if vitals.temperature < TEMP_LOW_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!("Hypothermia: Temp = {:.1}°C", vitals.temperature),
        );
    } else if vitals.temperature > TEMP_HIGH_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!("Hyperpyrexia: Temp = {:.1}°C", vitals.temperature),
        );
    }
    if let Some(gcs) = vitals.gcs_score {
        if gcs < GCS_CRITICAL {
            trigger(
                &mut reasons,
                &mut level,
                RiskLevel::Critical,
                format!("Altered consciousness: GCS = {gcs}"),
            );
        }
    }
    for symptom in symptoms.iter().filter(|s| s.is_red_flag) {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!("Red-flag symptom reported: '{}'", symptom.symptom_name),
        );
    }
    if flags.pregnant
        && vitals.systolic_bp >= PREECLAMPSIA_SBP
        && vitals.diastolic_bp >= PREECLAMPSIA_DBP
    {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Critical,
            format!(
                "Pregnancy hypertension (possible preeclampsia): BP {}/{} mmHg",
                vitals.systolic_bp, vitals.diastolic_bp
            ),
        );
    }

    // ── High thresholds ───────────────────────────────────────────────────
    if vitals.heart_rate > HR_TACHY_HIGH && vitals.heart_rate <= HR_HIGH_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::High,
            format!("Significant tachycardia: HR = {} bpm", vitals.heart_rate),
        );
    }
    if vitals.spo2 >= SPO2_CRITICAL && vitals.spo2 < SPO2_LOW_HIGH {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::High,
            format!("Low oxygen saturation: SpO2 = {:.1}%", vitals.spo2),
        );
    }
    if vitals.temperature > TEMP_FEVER_HIGH && vitals.temperature <= TEMP_HIGH_CRITICAL {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::High,
            format!("High fever: Temp = {:.1}°C", vitals.temperature),
        );
    }

    // ── Moderate thresholds ───────────────────────────────────────────────
    if vitals.shock_index() > SHOCK_INDEX_MODERATE {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Moderate,
            format!("Elevated shock index: {:.2} (HR/SBP)", vitals.shock_index()),
        );
    }
    if flags.immunocompromised && vitals.temperature >= IMMUNOCOMP_FEVER {
        trigger(
            &mut reasons,
            &mut level,
            RiskLevel::Moderate,
            format!(
                "Immunocompromised patient with fever: {:.1}°C",
                vitals.temperature
            ),
        );
    }
    if let Some(bg) = vitals.blood_glucose_mgdl {
        if bg < BG_SEVERE_HYPO {
            trigger(
                &mut reasons,
                &mut level,
                RiskLevel::Moderate,
                format!("Severe hypoglycaemia: BG = {bg} mg/dL"),
            );
        } else if bg > BG_SEVERE_HYPER {
            trigger(
                &mut reasons,
                &mut level,
                RiskLevel::Moderate,
                format!("Severe hyperglycaemia: BG = {bg} mg/dL"),
            );
        }
    }

    let triggered = level.is_some();
    RuleOutcome {
        triggered,
        override_ml: level == Some(RiskLevel::Critical),
        risk_level: level,
        reasons,
    }
}
