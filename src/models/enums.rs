use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Variants must be declared in ascending severity/lifecycle order so the
/// derived `Ord` matches the clinical ordering.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Sex {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(RiskLevel {
    Low => "low",
    Moderate => "moderate",
    High => "high",
    Critical => "critical",
});

str_enum!(CaseStatus {
    Intake => "intake",
    Analyzed => "analyzed",
    Escalated => "escalated",
    SpecialistReviewing => "specialist_reviewing",
    Advised => "advised",
    Closed => "closed",
    Cancelled => "cancelled",
});

str_enum!(AdviceType {
    UrgentReferral => "urgent_referral",
    Observe2h => "observe_2h",
    ManageLocally => "manage_locally",
    StartIvFluids => "start_iv_fluids",
    Admit => "admit",
    Custom => "custom",
});

str_enum!(SymptomSeverity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(WarningSeverity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
    Contraindicated => "contraindicated",
});

// Ord order doubles as the tie-break order inside one severity band:
// drug-drug before drug-condition before drug-symptom.
str_enum!(WarningType {
    DrugDrug => "ddi",
    DrugCondition => "drug_condition",
    DrugSymptom => "drug_symptom",
});

impl CaseStatus {
    /// Position in the forward lifecycle. `Cancelled` sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            CaseStatus::Intake => Some(0),
            CaseStatus::Analyzed => Some(1),
            CaseStatus::Escalated => Some(2),
            CaseStatus::SpecialistReviewing => Some(3),
            CaseStatus::Advised => Some(4),
            CaseStatus::Closed => Some(5),
            CaseStatus::Cancelled => None,
        }
    }

    /// Transitions are monotonic (forward skips allowed); `cancelled` is
    /// reachable from any non-closed state and is terminal.
    pub fn can_transition_to(self, next: CaseStatus) -> bool {
        match (self.rank(), next.rank()) {
            // -> cancelled, from anything except closed or cancelled
            (Some(r), None) => r < 5,
            (None, _) => false,
            (Some(from), Some(to)) => to > from,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CaseStatus::Closed | CaseStatus::Cancelled)
    }

    /// Advice rows may be appended only in these states.
    pub fn accepts_advice(self) -> bool {
        matches!(
            self,
            CaseStatus::Escalated | CaseStatus::SpecialistReviewing | CaseStatus::Advised
        )
    }

    /// A live escalation token implies one of these states.
    pub fn holds_escalation_token(self) -> bool {
        matches!(self, CaseStatus::Escalated | CaseStatus::SpecialistReviewing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn risk_level_ordering_matches_clinical_severity() {
        assert!(RiskLevel::Low < RiskLevel::Moderate);
        assert!(RiskLevel::Moderate < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn warning_severity_ordering() {
        assert!(WarningSeverity::Mild < WarningSeverity::Moderate);
        assert!(WarningSeverity::Severe < WarningSeverity::Contraindicated);
    }

    #[test]
    fn risk_level_round_trip() {
        for (variant, s) in [
            (RiskLevel::Low, "low"),
            (RiskLevel::Moderate, "moderate"),
            (RiskLevel::High, "high"),
            (RiskLevel::Critical, "critical"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(RiskLevel::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn case_status_round_trip() {
        for (variant, s) in [
            (CaseStatus::Intake, "intake"),
            (CaseStatus::Analyzed, "analyzed"),
            (CaseStatus::Escalated, "escalated"),
            (CaseStatus::SpecialistReviewing, "specialist_reviewing"),
            (CaseStatus::Advised, "advised"),
            (CaseStatus::Closed, "closed"),
            (CaseStatus::Cancelled, "cancelled"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(CaseStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn advice_type_round_trip() {
        for (variant, s) in [
            (AdviceType::UrgentReferral, "urgent_referral"),
            (AdviceType::Observe2h, "observe_2h"),
            (AdviceType::ManageLocally, "manage_locally"),
            (AdviceType::StartIvFluids, "start_iv_fluids"),
            (AdviceType::Admit, "admit"),
            (AdviceType::Custom, "custom"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AdviceType::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&CaseStatus::SpecialistReviewing).unwrap(),
            "\"specialist_reviewing\""
        );
        assert_eq!(
            serde_json::to_string(&AdviceType::Observe2h).unwrap(),
            "\"observe_2h\""
        );
        assert_eq!(
            serde_json::to_string(&WarningType::DrugDrug).unwrap(),
            "\"ddi\""
        );
    }

    #[test]
    fn forward_transitions_allowed() {
        assert!(CaseStatus::Intake.can_transition_to(CaseStatus::Analyzed));
        assert!(CaseStatus::Analyzed.can_transition_to(CaseStatus::Escalated));
        assert!(CaseStatus::Escalated.can_transition_to(CaseStatus::SpecialistReviewing));
        assert!(CaseStatus::SpecialistReviewing.can_transition_to(CaseStatus::Advised));
        assert!(CaseStatus::Advised.can_transition_to(CaseStatus::Closed));
        // skips are monotonic too
        assert!(CaseStatus::Escalated.can_transition_to(CaseStatus::Advised));
        assert!(CaseStatus::Analyzed.can_transition_to(CaseStatus::Closed));
    }

    #[test]
    fn backward_transitions_rejected() {
        assert!(!CaseStatus::Analyzed.can_transition_to(CaseStatus::Intake));
        assert!(!CaseStatus::Advised.can_transition_to(CaseStatus::Escalated));
        assert!(!CaseStatus::Closed.can_transition_to(CaseStatus::Advised));
        assert!(!CaseStatus::Analyzed.can_transition_to(CaseStatus::Analyzed));
    }

    #[test]
    fn cancelled_terminal_from_any_non_closed() {
        assert!(CaseStatus::Intake.can_transition_to(CaseStatus::Cancelled));
        assert!(CaseStatus::Advised.can_transition_to(CaseStatus::Cancelled));
        assert!(!CaseStatus::Closed.can_transition_to(CaseStatus::Cancelled));
        assert!(!CaseStatus::Cancelled.can_transition_to(CaseStatus::Intake));
        assert!(!CaseStatus::Cancelled.can_transition_to(CaseStatus::Cancelled));
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(RiskLevel::from_str("fatal").is_err());
        assert!(CaseStatus::from_str("").is_err());
        assert!(WarningType::from_str("drug_drug").is_err());
    }
}
