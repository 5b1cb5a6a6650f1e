use serde::{Deserialize, Serialize};

use super::{FieldError, SymptomSeverity};

/// One reported symptom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomEntry {
    pub symptom_name: String,
    #[serde(default)]
    pub is_red_flag: bool,
    #[serde(default)]
    pub severity: Option<SymptomSeverity>,
    #[serde(default)]
    pub duration_hours: Option<u32>,
}

impl SymptomEntry {
    pub fn validate(&self, index: usize, errors: &mut Vec<FieldError>) {
        if self.symptom_name.trim().len() < 2 {
            errors.push(FieldError::new(
                &format!("symptoms[{index}].symptom_name"),
                "must be at least 2 characters",
            ));
        }
    }
}

/// One current medication as reported at intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub drug_name: String,
    /// Normalized code (e.g. RxNorm), when known.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub dose: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
}

impl MedicationEntry {
    pub fn validate(&self, index: usize, errors: &mut Vec<FieldError>) {
        let len = self.drug_name.trim().len();
        if !(2..=200).contains(&len) {
            errors.push(FieldError::new(
                &format!("medications[{index}].drug_name"),
                "must be between 2 and 200 characters",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_symptom_passes() {
        let s = SymptomEntry {
            symptom_name: "chest pain".into(),
            is_red_flag: true,
            severity: Some(SymptomSeverity::Severe),
            duration_hours: Some(2),
        };
        let mut errors = Vec::new();
        s.validate(0, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn short_symptom_name_rejected() {
        let s = SymptomEntry {
            symptom_name: "x".into(),
            is_red_flag: false,
            severity: None,
            duration_hours: None,
        };
        let mut errors = Vec::new();
        s.validate(3, &mut errors);
        assert_eq!(errors[0].field, "symptoms[3].symptom_name");
    }

    #[test]
    fn medication_name_length_bounds() {
        let mut errors = Vec::new();
        MedicationEntry {
            drug_name: "a".into(),
            code: None,
            dose: None,
            frequency: None,
            route: None,
        }
        .validate(0, &mut errors);
        assert_eq!(errors.len(), 1);

        errors.clear();
        MedicationEntry {
            drug_name: "a".repeat(201),
            code: None,
            dose: None,
            frequency: None,
            route: None,
        }
        .validate(1, &mut errors);
        assert_eq!(errors[0].field, "medications[1].drug_name");
    }
}
