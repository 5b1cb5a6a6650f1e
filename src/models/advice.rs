use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AdviceType, FieldError};

/// One specialist advice entry. Append-only; the latest row per case is
/// authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistAdvice {
    pub id: Uuid,
    pub case_id: Uuid,
    pub risk_assessment_id: Uuid,
    #[serde(default)]
    pub specialist_id: Option<Uuid>,
    pub advice_type: AdviceType,
    #[serde(default)]
    pub custom_notes: Option<String>,
    #[serde(default)]
    pub medications_advised: Vec<String>,
    #[serde(default)]
    pub investigations: Vec<String>,
    #[serde(default)]
    pub follow_up_hours: Option<u32>,
    pub submitted_at: DateTime<Utc>,
}

/// Advice fields as submitted by the specialist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvicePayload {
    pub advice_type: AdviceType,
    #[serde(default)]
    pub custom_notes: Option<String>,
    #[serde(default)]
    pub medications_advised: Vec<String>,
    #[serde(default)]
    pub investigations: Vec<String>,
    #[serde(default)]
    pub follow_up_hours: Option<u32>,
}

impl AdvicePayload {
    pub fn validate(&self, errors: &mut Vec<FieldError>) {
        if let Some(hours) = self.follow_up_hours {
            if !(1..=720).contains(&hours) {
                errors.push(FieldError::new(
                    "follow_up_hours",
                    "must be between 1 and 720",
                ));
            }
        }
        if self.advice_type == AdviceType::Custom
            && self.custom_notes.as_deref().unwrap_or("").trim().is_empty()
        {
            errors.push(FieldError::new(
                "custom_notes",
                "required when advice_type is custom",
            ));
        }
    }
}

impl SpecialistAdvice {
    pub fn from_payload(
        case_id: Uuid,
        risk_assessment_id: Uuid,
        specialist_id: Option<Uuid>,
        payload: AdvicePayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            risk_assessment_id,
            specialist_id,
            advice_type: payload.advice_type,
            custom_notes: payload.custom_notes,
            medications_advised: payload.medications_advised,
            investigations: payload.investigations,
            follow_up_hours: payload.follow_up_hours,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(advice_type: AdviceType) -> AdvicePayload {
        AdvicePayload {
            advice_type,
            custom_notes: None,
            medications_advised: Vec::new(),
            investigations: Vec::new(),
            follow_up_hours: None,
        }
    }

    #[test]
    fn urgent_referral_needs_no_notes() {
        let mut errors = Vec::new();
        payload(AdviceType::UrgentReferral).validate(&mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn custom_advice_requires_notes() {
        let mut errors = Vec::new();
        payload(AdviceType::Custom).validate(&mut errors);
        assert_eq!(errors[0].field, "custom_notes");
    }

    #[test]
    fn follow_up_hours_bounds() {
        let mut p = payload(AdviceType::Observe2h);
        p.follow_up_hours = Some(0);
        let mut errors = Vec::new();
        p.validate(&mut errors);
        assert_eq!(errors.len(), 1);

        p.follow_up_hours = Some(721);
        errors.clear();
        p.validate(&mut errors);
        assert_eq!(errors.len(), 1);

        p.follow_up_hours = Some(48);
        errors.clear();
        p.validate(&mut errors);
        assert!(errors.is_empty());
    }
}
