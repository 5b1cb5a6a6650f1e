//! Medication safety engine: drug-drug interactions, drug-condition
//! conflicts, and drug-symptom danger patterns.
//!
//! The interaction table is a read-only cache loaded from the database at
//! process start. Pair lookup normalizes drug names and falls back to
//! trigram similarity so free-text entries like "Warfarin 5mg" still hit
//! the table.

use std::collections::{BTreeSet, HashMap};

use crate::models::{
    MedWarning, MedicationEntry, SymptomEntry, VulnerabilityFlags, WarningSeverity, WarningType,
};

/// Minimum trigram similarity for a fuzzy vocabulary match.
const TRIGRAM_THRESHOLD: f64 = 0.6;

const ANTICOAGULANTS: &[&str] = &["warfarin", "heparin", "apixaban", "rivaroxaban", "clopidogrel"];
const BETA_BLOCKERS: &[&str] = &[
    "atenolol",
    "metoprolol",
    "propranolol",
    "bisoprolol",
    "carvedilol",
];
const NSAIDS: &[&str] = &["ibuprofen", "diclofenac", "naproxen", "indomethacin"];
const HYPOGLYCEMICS: &[&str] = &["insulin", "glibenclamide", "glipizide", "gliclazide"];
const IMMUNOSUPPRESSANTS: &[&str] = &[
    "prednisolone",
    "dexamethasone",
    "methylprednisolone",
    "tacrolimus",
    "cyclosporine",
    "azathioprine",
];

/// One drug-drug interaction row.
#[derive(Debug, Clone)]
pub struct DdiRule {
    pub drug_a: String,
    pub drug_b: String,
    pub severity: WarningSeverity,
    pub message: String,
}

/// In-memory drug-drug interaction table.
#[derive(Debug, Default)]
pub struct InteractionTable {
    pairs: HashMap<(String, String), (WarningSeverity, String)>,
    vocab: BTreeSet<String>,
}

impl InteractionTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<DdiRule>) -> Self {
        let mut table = Self::default();
        for row in rows {
            let a = normalize(&row.drug_a);
            let b = normalize(&row.drug_b);
            table.vocab.insert(a.clone());
            table.vocab.insert(b.clone());
            table.pairs.insert(pair_key(&a, &b), (row.severity, row.message));
        }
        table
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn lookup(&self, a: &str, b: &str) -> Option<&(WarningSeverity, String)> {
        self.pairs.get(&pair_key(a, b))
    }

    /// Map a free-text drug name onto the table vocabulary: exact match,
    /// then substring containment, then best trigram match.
    fn canonical(&self, raw: &str) -> Option<String> {
        let name = normalize(raw);
        if self.vocab.contains(&name) {
            return Some(name);
        }
        if let Some(hit) = self.vocab.iter().find(|v| name.contains(v.as_str())) {
            return Some(hit.clone());
        }
        self.vocab
            .iter()
            .map(|v| (trigram_similarity(&name, v), v))
            .filter(|(sim, _)| *sim >= TRIGRAM_THRESHOLD)
            .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, v)| v.clone())
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Jaccard similarity over padded character trigrams.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    shared as f64 / union as f64
}

fn trigrams(s: &str) -> BTreeSet<String> {
    let padded: Vec<char> = format!("  {} ", normalize(s)).chars().collect();
    padded
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

struct DangerRule {
    drugs: &'static [&'static str],
    symptoms: &'static [&'static str],
    severity: WarningSeverity,
    message: &'static str,
    /// Named danger patterns force escalation regardless of severity.
    named_danger: bool,
}

const DANGER_RULES: &[DangerRule] = &[
    DangerRule {
        drugs: ANTICOAGULANTS,
        symptoms: &["head injury", "head trauma", "fall", "bleeding", "blood"],
        severity: WarningSeverity::Severe,
        message: "Anticoagulant/antiplatelet with head injury or bleeding: high risk of intracranial haemorrhage. Immediate escalation required.",
        named_danger: true,
    },
    DangerRule {
        drugs: BETA_BLOCKERS,
        symptoms: &["bradycardia", "slow heart", "dizziness", "syncope", "fainted"],
        severity: WarningSeverity::Moderate,
        message: "Beta-blocker with bradycardia symptoms: monitor heart rate. Consider dose reduction.",
        named_danger: false,
    },
    DangerRule {
        drugs: HYPOGLYCEMICS,
        symptoms: &["unconscious", "confusion", "seizure", "sweating", "shaking"],
        severity: WarningSeverity::Severe,
        message: "Insulin/sulfonylurea with altered consciousness: severe hypoglycaemia likely. Give IV dextrose immediately.",
        named_danger: true,
    },
    DangerRule {
        drugs: IMMUNOSUPPRESSANTS,
        symptoms: &["fever", "infection", "sepsis"],
        severity: WarningSeverity::Severe,
        message: "Immunosuppressant with fever: serious infection or sepsis must be excluded urgently.",
        named_danger: true,
    },
    DangerRule {
        drugs: &["lithium"],
        symptoms: &["tremor", "confusion", "diarrhea", "diarrhoea", "vomiting"],
        severity: WarningSeverity::Severe,
        message: "Lithium with GI or neurological symptoms: possible lithium toxicity. Check serum levels urgently.",
        named_danger: true,
    },
    DangerRule {
        drugs: &["methotrexate"],
        symptoms: &["mouth ulcer", "stomatitis", "breathlessness", "cough"],
        severity: WarningSeverity::Severe,
        message: "Methotrexate with respiratory or oral symptoms: possible methotrexate pneumonitis or toxicity.",
        named_danger: true,
    },
];

struct ConditionRule {
    drugs: &'static [&'static str],
    flag: fn(&VulnerabilityFlags) -> bool,
    severity: WarningSeverity,
    message: &'static str,
}

const CONDITION_RULES: &[ConditionRule] = &[
    ConditionRule {
        drugs: NSAIDS,
        flag: |f| f.heart_disease,
        severity: WarningSeverity::Severe,
        message: "NSAID with cardiovascular disease: increased MI/heart failure risk. Use paracetamol instead.",
    },
    ConditionRule {
        drugs: ANTICOAGULANTS,
        flag: |f| f.pregnant,
        severity: WarningSeverity::Severe,
        message: "Anticoagulant in pregnancy: fetal haemorrhage risk. Urgent obstetric medication review.",
    },
    ConditionRule {
        drugs: BETA_BLOCKERS,
        flag: |f| f.diabetic,
        severity: WarningSeverity::Severe,
        message: "Beta-blocker in a diabetic patient: may mask hypoglycaemia warning signs. Review necessity and monitor glucose.",
    },
];

/// Evaluates the three pattern families against one intake.
#[derive(Debug, Default)]
pub struct MedicationEngine {
    table: InteractionTable,
}

impl MedicationEngine {
    pub fn new(table: InteractionTable) -> Self {
        Self { table }
    }

    /// Returns all warnings plus whether any of them forces escalation.
    pub fn evaluate(
        &self,
        medications: &[MedicationEntry],
        symptoms: &[SymptomEntry],
        flags: &VulnerabilityFlags,
    ) -> (Vec<MedWarning>, bool) {
        let mut warnings = Vec::new();

        self.check_pairs(medications, &mut warnings);
        check_conditions(medications, flags, &mut warnings);
        check_danger_patterns(medications, symptoms, &mut warnings);

        if flags.immunocompromised {
            let feverish = symptoms.iter().any(|s| {
                let name = s.symptom_name.to_lowercase();
                name.contains("fever") || name.contains("temperature")
            });
            if feverish {
                warnings.push(MedWarning {
                    drug1: "Immunosuppressant therapy".into(),
                    drug2: None,
                    warning_type: WarningType::DrugCondition,
                    severity: WarningSeverity::Severe,
                    message: "Immunocompromised patient with fever: sepsis must be excluded. Urgent blood cultures and antibiotics.".into(),
                    action_required: true,
                    override_triggered: true,
                });
            }
        }

        let override_triggered = warnings.iter().any(|w| w.override_triggered);
        (warnings, override_triggered)
    }

    fn check_pairs(&self, medications: &[MedicationEntry], warnings: &mut Vec<MedWarning>) {
        let canonical: Vec<Option<String>> = medications
            .iter()
            .map(|m| self.table.canonical(&m.drug_name))
            .collect();

        for i in 0..medications.len() {
            for j in (i + 1)..medications.len() {
                let (Some(a), Some(b)) = (&canonical[i], &canonical[j]) else {
                    continue;
                };
                if let Some((severity, message)) = self.table.lookup(a, b) {
                    tracing::warn!(drug_a = %a, drug_b = %b, severity = %severity,
                        "drug interaction detected");
                    warnings.push(MedWarning {
                        drug1: medications[i].drug_name.clone(),
                        drug2: Some(medications[j].drug_name.clone()),
                        warning_type: WarningType::DrugDrug,
                        severity: *severity,
                        message: message.clone(),
                        action_required: *severity >= WarningSeverity::Severe,
                        override_triggered: *severity >= WarningSeverity::Severe,
                    });
                }
            }
        }
    }
}

fn check_conditions(
    medications: &[MedicationEntry],
    flags: &VulnerabilityFlags,
    warnings: &mut Vec<MedWarning>,
) {
    let names: Vec<String> = medications
        .iter()
        .map(|m| normalize(&m.drug_name))
        .collect();

    for rule in CONDITION_RULES {
        if !(rule.flag)(flags) {
            continue;
        }
        let matched: Vec<&str> = medications
            .iter()
            .zip(&names)
            .filter(|(_, n)| rule.drugs.iter().any(|kw| n.contains(kw)))
            .map(|(m, _)| m.drug_name.as_str())
            .collect();
        if !matched.is_empty() {
            warnings.push(MedWarning {
                drug1: matched.join(", "),
                drug2: None,
                warning_type: WarningType::DrugCondition,
                severity: rule.severity,
                message: rule.message.into(),
                action_required: rule.severity >= WarningSeverity::Severe,
                override_triggered: rule.severity >= WarningSeverity::Severe,
            });
        }
    }
}

fn check_danger_patterns(
    medications: &[MedicationEntry],
    symptoms: &[SymptomEntry],
    warnings: &mut Vec<MedWarning>,
) {
    let drug_names: Vec<String> = medications
        .iter()
        .map(|m| normalize(&m.drug_name))
        .collect();
    let symptom_names: Vec<String> = symptoms
        .iter()
        .map(|s| s.symptom_name.to_lowercase())
        .collect();

    for rule in DANGER_RULES {
        let matched_drugs: Vec<&str> = medications
            .iter()
            .zip(&drug_names)
            .filter(|(_, n)| rule.drugs.iter().any(|kw| n.contains(kw)))
            .map(|(m, _)| m.drug_name.as_str())
            .collect();
        let symptom_match = symptom_names
            .iter()
            .any(|s| rule.symptoms.iter().any(|kw| s.contains(kw)));

        if !matched_drugs.is_empty() && symptom_match {
            let override_triggered =
                rule.named_danger || rule.severity >= WarningSeverity::Severe;
            if override_triggered {
                tracing::warn!(drugs = %matched_drugs.join(", "),
                    "drug-symptom danger pattern forces escalation");
            }
            warnings.push(MedWarning {
                drug1: matched_drugs.join(", "),
                drug2: None,
                warning_type: WarningType::DrugSymptom,
                severity: rule.severity,
                message: rule.message.into(),
                action_required: true,
                override_triggered,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn med(name: &str) -> MedicationEntry {
        MedicationEntry {
            drug_name: name.into(),
            code: None,
            dose: None,
            frequency: None,
            route: None,
        }
    }

    fn symptom(name: &str) -> SymptomEntry {
        SymptomEntry {
            symptom_name: name.into(),
            is_red_flag: false,
            severity: None,
            duration_hours: None,
        }
    }

    fn test_table() -> InteractionTable {
        InteractionTable::from_rows(vec![
            DdiRule {
                drug_a: "warfarin".into(),
                drug_b: "aspirin".into(),
                severity: WarningSeverity::Severe,
                message: "Warfarin + Aspirin: additive bleeding risk. Monitor INR closely.".into(),
            },
            DdiRule {
                drug_a: "misoprostol".into(),
                drug_b: "oxytocin".into(),
                severity: WarningSeverity::Contraindicated,
                message: "Misoprostol + Oxytocin: absolutely contraindicated. Risk of uterine rupture.".into(),
            },
            DdiRule {
                drug_a: "lisinopril".into(),
                drug_b: "potassium".into(),
                severity: WarningSeverity::Moderate,
                message: "ACE inhibitor + potassium supplement: hyperkalaemia risk. Monitor electrolytes.".into(),
            },
            DdiRule {
                drug_a: "clarithromycin".into(),
                drug_b: "carbamazepine".into(),
                severity: WarningSeverity::Severe,
                message: "Clarithromycin + Carbamazepine: toxic carbamazepine levels. Use azithromycin instead.".into(),
            },
        ])
    }

    fn engine() -> MedicationEngine {
        MedicationEngine::new(test_table())
    }

    #[test]
    fn no_medications_no_warnings() {
        let (warnings, escalate) =
            engine().evaluate(&[], &[symptom("mild headache")], &VulnerabilityFlags::default());
        assert!(warnings.is_empty());
        assert!(!escalate);
    }

    #[test]
    fn severe_ddi_detected_and_overrides() {
        let (warnings, escalate) = engine().evaluate(
            &[med("Warfarin"), med("Aspirin")],
            &[],
            &VulnerabilityFlags::default(),
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].warning_type, WarningType::DrugDrug);
        assert_eq!(warnings[0].severity, WarningSeverity::Severe);
        assert_eq!(warnings[0].drug2.as_deref(), Some("Aspirin"));
        assert!(warnings[0].action_required);
        assert!(escalate);
    }

    #[test]
    fn contraindicated_pair_overrides() {
        let (warnings, escalate) = engine().evaluate(
            &[med("misoprostol"), med("oxytocin")],
            &[],
            &VulnerabilityFlags::default(),
        );
        assert_eq!(warnings[0].severity, WarningSeverity::Contraindicated);
        assert!(escalate);
    }

    #[test]
    fn moderate_ddi_does_not_override() {
        let (warnings, escalate) = engine().evaluate(
            &[med("lisinopril"), med("potassium")],
            &[],
            &VulnerabilityFlags::default(),
        );
        assert_eq!(warnings.len(), 1);
        assert!(!warnings[0].override_triggered);
        assert!(!escalate);
    }

    #[test]
    fn free_text_dose_still_matches_pair() {
        let (warnings, _) = engine().evaluate(
            &[med("Warfarin 5mg OD"), med("Aspirin 75mg")],
            &[],
            &VulnerabilityFlags::default(),
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].drug1, "Warfarin 5mg OD");
    }

    #[test]
    fn trigram_match_catches_misspelling() {
        let (warnings, _) = engine().evaluate(
            &[med("clarithromicin"), med("carbamazepine")],
            &[],
            &VulnerabilityFlags::default(),
        );
        assert_eq!(warnings.len(), 1, "misspelt clarithromycin should still match");
    }

    #[test]
    fn trigram_similarity_behaves() {
        assert!((trigram_similarity("warfarin", "warfarin") - 1.0).abs() < 1e-9);
        assert!(trigram_similarity("clarithromycin", "clarithromicin") > TRIGRAM_THRESHOLD);
        // short names degrade fast: one dropped letter already falls below
        assert!(trigram_similarity("warfarin", "warfrin") < TRIGRAM_THRESHOLD);
        assert!(trigram_similarity("warfarin", "aspirin") < TRIGRAM_THRESHOLD);
        assert_eq!(trigram_similarity("", "warfarin"), 0.0);
    }

    #[test]
    fn anticoagulant_head_injury_is_named_danger() {
        let (warnings, escalate) = engine().evaluate(
            &[med("Warfarin")],
            &[symptom("head injury after fall")],
            &VulnerabilityFlags::default(),
        );
        let danger = warnings
            .iter()
            .find(|w| w.warning_type == WarningType::DrugSymptom)
            .unwrap();
        assert_eq!(danger.severity, WarningSeverity::Severe);
        assert!(danger.override_triggered);
        assert!(escalate);
    }

    #[test]
    fn beta_blocker_bradycardia_is_moderate_without_override() {
        let (warnings, escalate) = engine().evaluate(
            &[med("Atenolol 50mg")],
            &[symptom("dizziness")],
            &VulnerabilityFlags::default(),
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, WarningSeverity::Moderate);
        assert!(!warnings[0].override_triggered);
        assert!(!escalate);
    }

    #[test]
    fn beta_blocker_diabetic_condition_conflict() {
        let flags = VulnerabilityFlags {
            diabetic: true,
            ..Default::default()
        };
        let (warnings, escalate) = engine().evaluate(&[med("Atenolol 50mg OD")], &[], &flags);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].warning_type, WarningType::DrugCondition);
        assert_eq!(warnings[0].severity, WarningSeverity::Severe);
        assert!(warnings[0].drug1.contains("Atenolol"));
        assert!(escalate);

        // same drug without the flag: nothing fires
        let (warnings, _) =
            engine().evaluate(&[med("Atenolol 50mg OD")], &[], &VulnerabilityFlags::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn nsaid_heart_disease_condition_conflict() {
        let flags = VulnerabilityFlags {
            heart_disease: true,
            ..Default::default()
        };
        let (warnings, escalate) = engine().evaluate(&[med("Ibuprofen 400mg")], &[], &flags);
        assert_eq!(warnings[0].warning_type, WarningType::DrugCondition);
        assert_eq!(warnings[0].severity, WarningSeverity::Severe);
        assert!(escalate);

        // same drug without the flag: nothing fires
        let (warnings, _) =
            engine().evaluate(&[med("Ibuprofen 400mg")], &[], &VulnerabilityFlags::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn anticoagulant_pregnancy_condition_conflict() {
        let flags = VulnerabilityFlags {
            pregnant: true,
            ..Default::default()
        };
        let (warnings, _) = engine().evaluate(&[med("heparin")], &[], &flags);
        assert!(warnings
            .iter()
            .any(|w| w.warning_type == WarningType::DrugCondition));
    }

    #[test]
    fn immunocompromised_fever_special_case() {
        let flags = VulnerabilityFlags {
            immunocompromised: true,
            ..Default::default()
        };
        let (warnings, escalate) = engine().evaluate(&[], &[symptom("high fever")], &flags);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].override_triggered);
        assert!(escalate);
    }

    #[test]
    fn insulin_confusion_danger_pattern() {
        let (warnings, escalate) = engine().evaluate(
            &[med("Insulin glargine")],
            &[symptom("confusion and sweating")],
            &VulnerabilityFlags::default(),
        );
        assert!(warnings.iter().any(|w| w.message.contains("hypoglycaemia")));
        assert!(escalate);
    }
}
