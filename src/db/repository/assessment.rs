use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{ModelOutcome, RiskAssessment, RuleOutcome, Sbar};

use super::{conversion_err, parse_datetime, parse_uuid};

const ASSESSMENT_COLUMNS: &str = "id, case_id, rule_triggered, rule_level, rule_reasons, \
     rule_override_ml, ml_risk_probability, ml_risk_level, shap_top_features, shap_text, \
     med_warnings, med_override_triggered, final_risk_level, final_risk_score, \
     recommendation, escalation_suggested, model_version, \
     sbar_situation, sbar_background, sbar_assessment, sbar_recommendation, assessed_at";

pub fn insert_assessment(
    conn: &Connection,
    assessment: &RiskAssessment,
) -> Result<(), DatabaseError> {
    let to_json = |field: &str, value: serde_json::Result<String>| {
        value.map_err(|e| DatabaseError::InvalidValue {
            field: field.into(),
            reason: e.to_string(),
        })
    };

    conn.execute(
        "INSERT INTO risk_assessments (id, case_id, rule_triggered, rule_level,
             rule_reasons, rule_override_ml, ml_risk_probability, ml_risk_level,
             shap_top_features, shap_text, med_warnings, med_override_triggered,
             final_risk_level, final_risk_score, recommendation, escalation_suggested,
             model_version, sbar_situation, sbar_background, sbar_assessment,
             sbar_recommendation, assessed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
        params![
            assessment.id.to_string(),
            assessment.case_id.to_string(),
            assessment.rule.triggered,
            assessment.rule.risk_level.map(|l| l.as_str()),
            to_json("rule_reasons", serde_json::to_string(&assessment.rule.reasons))?,
            assessment.rule.override_ml,
            assessment.ml.as_ref().map(|m| m.risk_probability),
            assessment.ml.as_ref().map(|m| m.risk_level.as_str()),
            assessment
                .ml
                .as_ref()
                .map(|m| to_json("shap_top_features", serde_json::to_string(&m.shap_features)))
                .transpose()?,
            assessment.ml.as_ref().map(|m| m.shap_text.clone()),
            to_json("med_warnings", serde_json::to_string(&assessment.med_warnings))?,
            assessment.med_override_triggered,
            assessment.final_risk_level.as_str(),
            assessment.final_risk_score,
            assessment.recommendation,
            assessment.escalation_suggested,
            assessment.model_version,
            assessment.sbar.as_ref().map(|s| s.situation.clone()),
            assessment.sbar.as_ref().map(|s| s.background.clone()),
            assessment.sbar.as_ref().map(|s| s.assessment.clone()),
            assessment.sbar.as_ref().map(|s| s.recommendation.clone()),
            assessment.assessed_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_assessment(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<RiskAssessment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM risk_assessments WHERE id = ?1"
    ))?;
    let assessment = stmt
        .query_row(params![id.to_string()], row_to_assessment)
        .optional()?;
    Ok(assessment)
}

/// The most recent assessment for a case.
pub fn latest_for_case(
    conn: &Connection,
    case_id: &Uuid,
) -> Result<Option<RiskAssessment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM risk_assessments
         WHERE case_id = ?1 ORDER BY assessed_at DESC, rowid DESC LIMIT 1"
    ))?;
    let assessment = stmt
        .query_row(params![case_id.to_string()], row_to_assessment)
        .optional()?;
    Ok(assessment)
}

pub fn list_for_case(
    conn: &Connection,
    case_id: &Uuid,
) -> Result<Vec<RiskAssessment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM risk_assessments
         WHERE case_id = ?1 ORDER BY assessed_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(params![case_id.to_string()], row_to_assessment)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DatabaseError::from)
}

/// Persist generated handover text onto an assessment.
pub fn set_sbar(conn: &Connection, id: &Uuid, sbar: &Sbar) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE risk_assessments
         SET sbar_situation = ?2, sbar_background = ?3, sbar_assessment = ?4,
             sbar_recommendation = ?5
         WHERE id = ?1",
        params![
            id.to_string(),
            sbar.situation,
            sbar.background,
            sbar.assessment,
            sbar.recommendation,
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "risk_assessment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

fn row_to_assessment(row: &rusqlite::Row) -> Result<RiskAssessment, rusqlite::Error> {
    let id: String = row.get(0)?;
    let case_id: String = row.get(1)?;
    let rule_level: Option<String> = row.get(3)?;
    let rule_reasons: String = row.get(4)?;
    let ml_probability: Option<f64> = row.get(6)?;
    let ml_level: Option<String> = row.get(7)?;
    let shap_features: Option<String> = row.get(8)?;
    let shap_text: Option<String> = row.get(9)?;
    let med_warnings: String = row.get(10)?;
    let final_level: String = row.get(12)?;
    let sbar_situation: Option<String> = row.get(17)?;
    let assessed_at: String = row.get(21)?;

    let ml = match (ml_probability, ml_level) {
        (Some(risk_probability), Some(level)) => Some(ModelOutcome {
            risk_probability,
            risk_level: level.parse().map_err(|e| conversion_err(7, e))?,
            shap_features: shap_features
                .map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_err(8, e)))
                .transpose()?
                .unwrap_or_default(),
            shap_text: shap_text.unwrap_or_default(),
        }),
        _ => None,
    };

    let sbar = match sbar_situation {
        Some(situation) => Some(Sbar {
            situation,
            background: row.get::<_, Option<String>>(18)?.unwrap_or_default(),
            assessment: row.get::<_, Option<String>>(19)?.unwrap_or_default(),
            recommendation: row.get::<_, Option<String>>(20)?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(RiskAssessment {
        id: parse_uuid(0, &id)?,
        case_id: parse_uuid(1, &case_id)?,
        rule: RuleOutcome {
            triggered: row.get(2)?,
            risk_level: rule_level
                .map(|l| l.parse().map_err(|e| conversion_err(3, e)))
                .transpose()?,
            reasons: serde_json::from_str(&rule_reasons).map_err(|e| conversion_err(4, e))?,
            override_ml: row.get(5)?,
        },
        ml,
        med_warnings: serde_json::from_str(&med_warnings).map_err(|e| conversion_err(10, e))?,
        med_override_triggered: row.get(11)?,
        final_risk_level: final_level.parse().map_err(|e| conversion_err(12, e))?,
        final_risk_score: row.get(13)?,
        recommendation: row.get(14)?,
        escalation_suggested: row.get(15)?,
        model_version: row.get(16)?,
        sbar,
        assessed_at: parse_datetime(21, &assessed_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::case::insert_case;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{
        Attribution, Case, MedWarning, PatientSnapshot, RiskLevel, Sex, VulnerabilityFlags,
        WarningSeverity, WarningType,
    };
    use chrono::Utc;

    fn seeded_case(conn: &Connection) -> Case {
        let case = Case::new(
            Uuid::new_v4(),
            "test complaint".into(),
            PatientSnapshot {
                age: 45,
                sex: Sex::Female,
                village: None,
                district: None,
                vulnerability_flags: VulnerabilityFlags::default(),
            },
        );
        insert_case(conn, &case).unwrap();
        case
    }

    fn sample_assessment(case_id: Uuid) -> RiskAssessment {
        RiskAssessment {
            id: Uuid::new_v4(),
            case_id,
            rule: RuleOutcome {
                triggered: true,
                risk_level: Some(RiskLevel::Critical),
                reasons: vec!["Severe hypotension/shock risk: SBP = 85 mmHg".into()],
                override_ml: true,
            },
            ml: Some(ModelOutcome {
                risk_probability: 0.91,
                risk_level: RiskLevel::Critical,
                shap_features: vec![Attribution {
                    feature: "shock_index".into(),
                    value: 1.39,
                    shap_value: 1.38,
                    label: "Shock Index (HR/SBP) = 1.4 (impact: ↑1.376)".into(),
                }],
                shap_text: "Primary driver: shock indicators.".into(),
            }),
            med_warnings: vec![MedWarning {
                drug1: "Atenolol".into(),
                drug2: None,
                warning_type: WarningType::DrugSymptom,
                severity: WarningSeverity::Severe,
                message: "Beta-blocker with bradycardia symptoms: monitor heart rate.".into(),
                action_required: true,
                override_triggered: true,
            }],
            med_override_triggered: true,
            final_risk_level: RiskLevel::Critical,
            final_risk_score: 0.91,
            recommendation: "IMMEDIATE ESCALATION REQUIRED.".into(),
            escalation_suggested: true,
            model_version: Some("calibrated-gam-v1".into()),
            sbar: None,
            assessed_at: Utc::now(),
        }
    }

    #[test]
    fn round_trip_full_assessment() {
        let conn = open_memory_database().unwrap();
        let case = seeded_case(&conn);
        let assessment = sample_assessment(case.id);
        insert_assessment(&conn, &assessment).unwrap();

        let fetched = get_assessment(&conn, &assessment.id).unwrap().unwrap();
        assert_eq!(fetched.final_risk_level, RiskLevel::Critical);
        assert!(fetched.rule.override_ml);
        let ml = fetched.ml.unwrap();
        assert!((ml.risk_probability - 0.91).abs() < 1e-9);
        assert_eq!(ml.shap_features.len(), 1);
        assert_eq!(fetched.med_warnings.len(), 1);
        assert_eq!(fetched.med_warnings[0].severity, WarningSeverity::Severe);
        assert!(fetched.sbar.is_none());
    }

    #[test]
    fn round_trip_without_model() {
        let conn = open_memory_database().unwrap();
        let case = seeded_case(&conn);
        let mut assessment = sample_assessment(case.id);
        assessment.ml = None;
        assessment.model_version = None;
        insert_assessment(&conn, &assessment).unwrap();

        let fetched = get_assessment(&conn, &assessment.id).unwrap().unwrap();
        assert!(fetched.ml.is_none());
        assert!(fetched.model_version.is_none());
    }

    #[test]
    fn latest_picks_newest() {
        let conn = open_memory_database().unwrap();
        let case = seeded_case(&conn);

        let mut first = sample_assessment(case.id);
        first.assessed_at = Utc::now() - chrono::Duration::minutes(5);
        insert_assessment(&conn, &first).unwrap();

        let second = sample_assessment(case.id);
        insert_assessment(&conn, &second).unwrap();

        let latest = latest_for_case(&conn, &case.id).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(list_for_case(&conn, &case.id).unwrap().len(), 2);
    }

    #[test]
    fn sbar_persisted_on_assessment() {
        let conn = open_memory_database().unwrap();
        let case = seeded_case(&conn);
        let assessment = sample_assessment(case.id);
        insert_assessment(&conn, &assessment).unwrap();

        let sbar = Sbar {
            situation: "s".into(),
            background: "b".into(),
            assessment: "a".into(),
            recommendation: "r".into(),
        };
        set_sbar(&conn, &assessment.id, &sbar).unwrap();

        let fetched = get_assessment(&conn, &assessment.id).unwrap().unwrap();
        assert_eq!(fetched.sbar.unwrap(), sbar);
    }

    #[test]
    fn set_sbar_on_missing_assessment_fails() {
        let conn = open_memory_database().unwrap();
        let sbar = Sbar {
            situation: "s".into(),
            background: "b".into(),
            assessment: "a".into(),
            recommendation: "r".into(),
        };
        assert!(matches!(
            set_sbar(&conn, &Uuid::new_v4(), &sbar),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
