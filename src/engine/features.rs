//! Deterministic feature engineering for the risk model.
//!
//! The vector layout is fixed; the model artifact references features by
//! name, so order here only matters for stable attribution tie-breaks.

use crate::models::{PatientSnapshot, Sex, SymptomEntry, VitalsSnapshot};

pub const FEATURE_NAMES: [&str; 22] = [
    "spo2",
    "systolic_bp",
    "diastolic_bp",
    "heart_rate",
    "respiratory_rate",
    "temperature",
    "blood_glucose",
    "age_years",
    "sex_encoded",
    "is_pregnant",
    "is_diabetic",
    "has_heart_disease",
    "is_immunocompromised",
    "bmi_proxy",
    "shock_index",
    "pulse_pressure",
    "has_chest_pain",
    "has_altered_consciousness",
    "has_breathing_difficulty",
    "has_severe_headache",
    "has_bleeding",
    "red_flag_count",
];

/// Human-readable label for a feature name.
pub fn feature_label(name: &str) -> &str {
    match name {
        "spo2" => "Oxygen Saturation (SpO2)",
        "systolic_bp" => "Systolic Blood Pressure",
        "diastolic_bp" => "Diastolic Blood Pressure",
        "heart_rate" => "Heart Rate",
        "respiratory_rate" => "Respiratory Rate",
        "temperature" => "Temperature",
        "blood_glucose" => "Blood Glucose",
        "age_years" => "Patient Age",
        "sex_encoded" => "Sex",
        "is_pregnant" => "Pregnancy",
        "is_diabetic" => "Diabetes",
        "has_heart_disease" => "Heart Disease",
        "is_immunocompromised" => "Immunocompromised",
        "bmi_proxy" => "Weight Category",
        "shock_index" => "Shock Index (HR/SBP)",
        "pulse_pressure" => "Pulse Pressure",
        "has_chest_pain" => "Chest Pain Symptom",
        "has_altered_consciousness" => "Altered Consciousness",
        "has_breathing_difficulty" => "Breathing Difficulty",
        "has_severe_headache" => "Severe Headache",
        "has_bleeding" => "Bleeding Symptom",
        "red_flag_count" => "Number of Red Flag Symptoms",
        other => other,
    }
}

/// Engineered feature vector, parallel to [`FEATURE_NAMES`].
#[derive(Debug, Clone)]
pub struct FeatureVector {
    pub values: [f64; 22],
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }
}

pub fn extract(
    patient: &PatientSnapshot,
    vitals: &VitalsSnapshot,
    symptoms: &[SymptomEntry],
) -> FeatureVector {
    let names: Vec<String> = symptoms
        .iter()
        .map(|s| s.symptom_name.to_lowercase())
        .collect();

    let has_symptom = |keywords: &[&str]| -> f64 {
        if names
            .iter()
            .any(|s| keywords.iter().any(|kw| s.contains(kw)))
        {
            1.0
        } else {
            0.0
        }
    };

    let red_flag_count = symptoms.iter().filter(|s| s.is_red_flag).count() as f64;
    let flags = &patient.vulnerability_flags;

    let values = [
        vitals.spo2,
        f64::from(vitals.systolic_bp),
        f64::from(vitals.diastolic_bp),
        f64::from(vitals.heart_rate),
        f64::from(vitals.respiratory_rate),
        vitals.temperature,
        vitals.blood_glucose_mgdl.map(f64::from).unwrap_or(100.0),
        f64::from(patient.age),
        if patient.sex == Sex::Male { 0.0 } else { 1.0 },
        if flags.pregnant { 1.0 } else { 0.0 },
        if flags.diabetic { 1.0 } else { 0.0 },
        if flags.heart_disease { 1.0 } else { 0.0 },
        if flags.immunocompromised { 1.0 } else { 0.0 },
        vitals.weight_kg.unwrap_or(60.0) / 60.0,
        vitals.shock_index(),
        f64::from(vitals.pulse_pressure()),
        has_symptom(&["chest pain", "chest tightness"]),
        has_symptom(&["unconscious", "confused", "confusion", "altered"]),
        has_symptom(&["breathing", "breathless", "dyspnoea"]),
        has_symptom(&["headache"]),
        has_symptom(&["bleeding", "hemorrhage", "blood"]),
        red_flag_count,
    ];

    FeatureVector { values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SymptomSeverity, VulnerabilityFlags};

    fn patient() -> PatientSnapshot {
        PatientSnapshot {
            age: 45,
            sex: Sex::Female,
            village: None,
            district: None,
            vulnerability_flags: VulnerabilityFlags {
                diabetic: true,
                heart_disease: true,
                ..Default::default()
            },
        }
    }

    fn vitals() -> VitalsSnapshot {
        VitalsSnapshot {
            systolic_bp: 100,
            diastolic_bp: 60,
            heart_rate: 120,
            respiratory_rate: 22,
            spo2: 93.0,
            temperature: 38.0,
            blood_glucose_mgdl: None,
            weight_kg: Some(72.0),
            gcs_score: None,
        }
    }

    #[test]
    fn vector_is_complete_and_ordered() {
        let fv = extract(&patient(), &vitals(), &[]);
        assert_eq!(fv.values.len(), FEATURE_NAMES.len());
        assert_eq!(fv.get("spo2"), Some(93.0));
        assert_eq!(fv.get("age_years"), Some(45.0));
        assert_eq!(fv.get("sex_encoded"), Some(1.0));
        assert_eq!(fv.get("is_diabetic"), Some(1.0));
        assert_eq!(fv.get("has_heart_disease"), Some(1.0));
        assert_eq!(fv.get("is_pregnant"), Some(0.0));
    }

    #[test]
    fn derived_features() {
        let fv = extract(&patient(), &vitals(), &[]);
        assert!((fv.get("shock_index").unwrap() - 1.2).abs() < 1e-9);
        assert_eq!(fv.get("pulse_pressure"), Some(40.0));
        assert!((fv.get("bmi_proxy").unwrap() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn missing_glucose_defaults() {
        let fv = extract(&patient(), &vitals(), &[]);
        assert_eq!(fv.get("blood_glucose"), Some(100.0));
    }

    #[test]
    fn symptom_booleans_match_substrings() {
        let symptoms = vec![
            SymptomEntry {
                symptom_name: "Crushing chest pain".into(),
                is_red_flag: true,
                severity: Some(SymptomSeverity::Severe),
                duration_hours: Some(1),
            },
            SymptomEntry {
                symptom_name: "difficulty breathing".into(),
                is_red_flag: true,
                severity: None,
                duration_hours: None,
            },
        ];
        let fv = extract(&patient(), &vitals(), &symptoms);
        assert_eq!(fv.get("has_chest_pain"), Some(1.0));
        assert_eq!(fv.get("has_breathing_difficulty"), Some(1.0));
        assert_eq!(fv.get("has_bleeding"), Some(0.0));
        assert_eq!(fv.get("red_flag_count"), Some(2.0));
    }

    #[test]
    fn extraction_is_deterministic() {
        let symptoms = vec![SymptomEntry {
            symptom_name: "headache".into(),
            is_red_flag: false,
            severity: None,
            duration_hours: Some(2),
        }];
        let a = extract(&patient(), &vitals(), &symptoms);
        let b = extract(&patient(), &vitals(), &symptoms);
        assert_eq!(a.values, b.values);
    }
}
