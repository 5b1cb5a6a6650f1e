use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CaseStatus, PatientSnapshot};

/// Unit of work from intake through close. Owns the patient snapshot taken
/// at intake and the escalation token state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: Uuid,
    pub phw_id: Uuid,
    #[serde(default)]
    pub specialist_id: Option<Uuid>,
    pub status: CaseStatus,
    pub chief_complaint: String,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    /// SHA-256 of the live escalation token, hex-encoded. Never the token.
    #[serde(default, skip_serializing)]
    pub escalation_token_hash: Option<String>,
    #[serde(default)]
    pub escalation_token_expires_at: Option<DateTime<Utc>>,
    pub patient: PatientSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Case {
    pub fn new(phw_id: Uuid, chief_complaint: String, patient: PatientSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phw_id,
            specialist_id: None,
            status: CaseStatus::Intake,
            chief_complaint,
            escalation_reason: None,
            escalation_token_hash: None,
            escalation_token_expires_at: None,
            patient,
            created_at: now,
            updated_at: now,
            closed_at: None,
            deleted_at: None,
        }
    }

    /// A token is live iff present, unexpired, and the status invariant holds.
    pub fn has_live_token(&self, now: DateTime<Utc>) -> bool {
        self.escalation_token_hash.is_some()
            && self.status.holds_escalation_token()
            && self
                .escalation_token_expires_at
                .map(|exp| exp > now)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sex, VulnerabilityFlags};

    fn test_case() -> Case {
        Case::new(
            Uuid::new_v4(),
            "fever and cough for two days".into(),
            PatientSnapshot {
                age: 30,
                sex: Sex::Female,
                village: None,
                district: None,
                vulnerability_flags: VulnerabilityFlags::default(),
            },
        )
    }

    #[test]
    fn new_case_starts_at_intake() {
        let case = test_case();
        assert_eq!(case.status, CaseStatus::Intake);
        assert!(case.escalation_token_hash.is_none());
        assert!(!case.has_live_token(Utc::now()));
    }

    #[test]
    fn live_token_requires_status_and_expiry() {
        let mut case = test_case();
        case.escalation_token_hash = Some("ab".repeat(32));
        case.escalation_token_expires_at = Some(Utc::now() + chrono::Duration::hours(1));

        // token present but status does not hold a token
        assert!(!case.has_live_token(Utc::now()));

        case.status = CaseStatus::Escalated;
        assert!(case.has_live_token(Utc::now()));

        case.escalation_token_expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(!case.has_live_token(Utc::now()));
    }
}
