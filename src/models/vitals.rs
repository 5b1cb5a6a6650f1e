use serde::{Deserialize, Serialize};

use super::FieldError;

/// One set of vital sign readings. Immutable once recorded; values outside
/// the declared physiological limits never reach the analyzers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    /// mmHg
    pub systolic_bp: u16,
    /// mmHg
    pub diastolic_bp: u16,
    /// bpm
    pub heart_rate: u16,
    /// breaths per minute
    pub respiratory_rate: u16,
    /// %
    pub spo2: f64,
    /// °C
    pub temperature: f64,
    #[serde(default)]
    pub blood_glucose_mgdl: Option<u16>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub gcs_score: Option<u8>,
}

impl VitalsSnapshot {
    /// Heart rate over systolic pressure; >1.0 is an early shock signal.
    pub fn shock_index(&self) -> f64 {
        f64::from(self.heart_rate) / f64::from(self.systolic_bp.max(1))
    }

    pub fn pulse_pressure(&self) -> i32 {
        i32::from(self.systolic_bp) - i32::from(self.diastolic_bp)
    }

    pub fn validate(&self, errors: &mut Vec<FieldError>) {
        if !(40..=350).contains(&self.systolic_bp) {
            errors.push(FieldError::new(
                "vitals.systolic_bp",
                "must be between 40 and 350 mmHg",
            ));
        }
        if !(20..=250).contains(&self.diastolic_bp) {
            errors.push(FieldError::new(
                "vitals.diastolic_bp",
                "must be between 20 and 250 mmHg",
            ));
        }
        if self.diastolic_bp >= self.systolic_bp {
            errors.push(FieldError::new(
                "vitals.diastolic_bp",
                "diastolic BP must be less than systolic BP",
            ));
        }
        if !(20..=350).contains(&self.heart_rate) {
            errors.push(FieldError::new(
                "vitals.heart_rate",
                "must be between 20 and 350 bpm",
            ));
        }
        if !(4..=80).contains(&self.respiratory_rate) {
            errors.push(FieldError::new(
                "vitals.respiratory_rate",
                "must be between 4 and 80 /min",
            ));
        }
        if !(50.0..=100.0).contains(&self.spo2) {
            errors.push(FieldError::new(
                "vitals.spo2",
                "must be between 50.0 and 100.0 %",
            ));
        }
        if !(30.0..=45.0).contains(&self.temperature) {
            errors.push(FieldError::new(
                "vitals.temperature",
                "must be between 30.0 and 45.0 °C",
            ));
        }
        if let Some(bg) = self.blood_glucose_mgdl {
            if !(20..=1000).contains(&bg) {
                errors.push(FieldError::new(
                    "vitals.blood_glucose_mgdl",
                    "must be between 20 and 1000 mg/dL",
                ));
            }
        }
        if let Some(w) = self.weight_kg {
            if !(1.0..=300.0).contains(&w) {
                errors.push(FieldError::new(
                    "vitals.weight_kg",
                    "must be between 1 and 300 kg",
                ));
            }
        }
        if let Some(gcs) = self.gcs_score {
            if !(3..=15).contains(&gcs) {
                errors.push(FieldError::new(
                    "vitals.gcs_score",
                    "must be between 3 and 15",
                ));
            }
        }
    }
}
