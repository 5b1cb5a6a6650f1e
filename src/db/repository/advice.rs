use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::SpecialistAdvice;

use super::{conversion_err, parse_datetime, parse_uuid};

pub fn insert_advice(conn: &Connection, advice: &SpecialistAdvice) -> Result<(), DatabaseError> {
    let to_json = |field: &str, value: serde_json::Result<String>| {
        value.map_err(|e| DatabaseError::InvalidValue {
            field: field.into(),
            reason: e.to_string(),
        })
    };

    conn.execute(
        "INSERT INTO specialist_advice (id, case_id, risk_assessment_id, specialist_id,
             advice_type, custom_notes, medications_advised, investigations,
             follow_up_hours, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            advice.id.to_string(),
            advice.case_id.to_string(),
            advice.risk_assessment_id.to_string(),
            advice.specialist_id.map(|id| id.to_string()),
            advice.advice_type.as_str(),
            advice.custom_notes,
            to_json(
                "medications_advised",
                serde_json::to_string(&advice.medications_advised)
            )?,
            to_json("investigations", serde_json::to_string(&advice.investigations))?,
            advice.follow_up_hours,
            advice.submitted_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// All advice for a case in submission order; the last row is authoritative.
pub fn list_for_case(
    conn: &Connection,
    case_id: &Uuid,
) -> Result<Vec<SpecialistAdvice>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, case_id, risk_assessment_id, specialist_id, advice_type,
                custom_notes, medications_advised, investigations, follow_up_hours,
                submitted_at
         FROM specialist_advice WHERE case_id = ?1
         ORDER BY submitted_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![case_id.to_string()], row_to_advice)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DatabaseError::from)
}

fn row_to_advice(row: &rusqlite::Row) -> Result<SpecialistAdvice, rusqlite::Error> {
    let id: String = row.get(0)?;
    let case_id: String = row.get(1)?;
    let assessment_id: String = row.get(2)?;
    let specialist_id: Option<String> = row.get(3)?;
    let advice_type: String = row.get(4)?;
    let medications: String = row.get(6)?;
    let investigations: String = row.get(7)?;
    let submitted_at: String = row.get(9)?;

    Ok(SpecialistAdvice {
        id: parse_uuid(0, &id)?,
        case_id: parse_uuid(1, &case_id)?,
        risk_assessment_id: parse_uuid(2, &assessment_id)?,
        specialist_id: specialist_id.map(|s| parse_uuid(3, &s)).transpose()?,
        advice_type: advice_type.parse().map_err(|e| conversion_err(4, e))?,
        custom_notes: row.get(5)?,
        medications_advised: serde_json::from_str(&medications)
            .map_err(|e| conversion_err(6, e))?,
        investigations: serde_json::from_str(&investigations)
            .map_err(|e| conversion_err(7, e))?,
        follow_up_hours: row.get(8)?,
        submitted_at: parse_datetime(9, &submitted_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::assessment::insert_assessment;
    use crate::db::repository::case::insert_case;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{
        AdviceType, Case, PatientSnapshot, RiskAssessment, RiskLevel, RuleOutcome, Sex,
        VulnerabilityFlags,
    };
    use chrono::Utc;

    fn seed(conn: &Connection) -> (Uuid, Uuid) {
        let case = Case::new(
            Uuid::new_v4(),
            "complaint".into(),
            PatientSnapshot {
                age: 50,
                sex: Sex::Male,
                village: None,
                district: None,
                vulnerability_flags: VulnerabilityFlags::default(),
            },
        );
        insert_case(conn, &case).unwrap();

        let assessment = RiskAssessment {
            id: Uuid::new_v4(),
            case_id: case.id,
            rule: RuleOutcome::quiet(),
            ml: None,
            med_warnings: vec![],
            med_override_triggered: false,
            final_risk_level: RiskLevel::High,
            final_risk_score: 0.70,
            recommendation: "URGENT".into(),
            escalation_suggested: true,
            model_version: None,
            sbar: None,
            assessed_at: Utc::now(),
        };
        insert_assessment(conn, &assessment).unwrap();
        (case.id, assessment.id)
    }

    fn advice(case_id: Uuid, assessment_id: Uuid, advice_type: AdviceType) -> SpecialistAdvice {
        SpecialistAdvice {
            id: Uuid::new_v4(),
            case_id,
            risk_assessment_id: assessment_id,
            specialist_id: None,
            advice_type,
            custom_notes: Some("check electrolytes".into()),
            medications_advised: vec!["IV saline".into()],
            investigations: vec!["CBC".into(), "electrolytes".into()],
            follow_up_hours: Some(24),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn advice_round_trip() {
        let conn = open_memory_database().unwrap();
        let (case_id, assessment_id) = seed(&conn);

        insert_advice(&conn, &advice(case_id, assessment_id, AdviceType::UrgentReferral)).unwrap();

        let all = list_for_case(&conn, &case_id).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].advice_type, AdviceType::UrgentReferral);
        assert_eq!(all[0].investigations.len(), 2);
        assert_eq!(all[0].follow_up_hours, Some(24));
    }

    #[test]
    fn advice_is_append_only_latest_last() {
        let conn = open_memory_database().unwrap();
        let (case_id, assessment_id) = seed(&conn);

        let mut first = advice(case_id, assessment_id, AdviceType::Observe2h);
        first.submitted_at = Utc::now() - chrono::Duration::minutes(10);
        insert_advice(&conn, &first).unwrap();

        let second = advice(case_id, assessment_id, AdviceType::Admit);
        insert_advice(&conn, &second).unwrap();

        let all = list_for_case(&conn, &case_id).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.last().unwrap().advice_type, AdviceType::Admit);
    }
}
