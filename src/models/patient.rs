use serde::{Deserialize, Serialize};

use super::{FieldError, Sex};

/// Known vulnerability markers that gate specific rules and warnings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityFlags {
    #[serde(default)]
    pub pregnant: bool,
    #[serde(default)]
    pub diabetic: bool,
    #[serde(default)]
    pub elderly: bool,
    #[serde(default)]
    pub heart_disease: bool,
    #[serde(default)]
    pub immunocompromised: bool,
}

impl VulnerabilityFlags {
    pub fn any(&self) -> bool {
        self.pregnant || self.diabetic || self.elderly || self.heart_disease
            || self.immunocompromised
    }

    /// Names of the set flags, for summaries and handover text.
    pub fn active(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.pregnant {
            out.push("pregnant");
        }
        if self.diabetic {
            out.push("diabetic");
        }
        if self.elderly {
            out.push("elderly");
        }
        if self.heart_disease {
            out.push("heart_disease");
        }
        if self.immunocompromised {
            out.push("immunocompromised");
        }
        out
    }
}

/// Demographic snapshot captured per assessment; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub age: u16,
    pub sex: Sex,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub vulnerability_flags: VulnerabilityFlags,
}

impl PatientSnapshot {
    pub fn validate(&self, errors: &mut Vec<FieldError>) {
        if self.age > 150 {
            errors.push(FieldError::new("age", "must be between 0 and 150"));
        }
        if self.vulnerability_flags.pregnant && self.sex == Sex::Male {
            errors.push(FieldError::new(
                "vulnerability_flags.pregnant",
                "pregnancy flag cannot be set for male patients",
            ));
        }
    }
}
