use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{
    Case, CaseStatus, MedicationEntry, PatientSnapshot, SymptomEntry, VitalsSnapshot,
};

use super::{conversion_err, parse_datetime, parse_uuid};

const CASE_COLUMNS: &str = "id, phw_id, specialist_id, status, chief_complaint, \
     escalation_reason, escalation_token_hash, escalation_token_expires_at, \
     patient_age, patient_sex, village, district, vulnerability_flags, \
     created_at, updated_at, closed_at, deleted_at";

/// Insert a new case row.
pub fn insert_case(conn: &Connection, case: &Case) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO cases (id, phw_id, specialist_id, status, chief_complaint,
             escalation_reason, escalation_token_hash, escalation_token_expires_at,
             patient_age, patient_sex, village, district, vulnerability_flags,
             created_at, updated_at, closed_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            case.id.to_string(),
            case.phw_id.to_string(),
            case.specialist_id.map(|id| id.to_string()),
            case.status.as_str(),
            case.chief_complaint,
            case.escalation_reason,
            case.escalation_token_hash,
            case.escalation_token_expires_at.map(|t| t.to_rfc3339()),
            case.patient.age,
            case.patient.sex.as_str(),
            case.patient.village,
            case.patient.district,
            serde_json::to_string(&case.patient.vulnerability_flags)
                .map_err(|e| DatabaseError::InvalidValue {
                    field: "vulnerability_flags".into(),
                    reason: e.to_string(),
                })?,
            case.created_at.to_rfc3339(),
            case.updated_at.to_rfc3339(),
            case.closed_at.map(|t| t.to_rfc3339()),
            case.deleted_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

/// Fetch one case; soft-deleted cases are invisible.
pub fn get_case(conn: &Connection, id: &Uuid) -> Result<Option<Case>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CASE_COLUMNS} FROM cases WHERE id = ?1 AND deleted_at IS NULL"
    ))?;
    let case = stmt
        .query_row(params![id.to_string()], row_to_case)
        .optional()?;
    Ok(case)
}

/// Resolve a case from an escalation token hash.
pub fn get_case_by_token_hash(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<Case>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CASE_COLUMNS} FROM cases
         WHERE escalation_token_hash = ?1 AND deleted_at IS NULL"
    ))?;
    let case = stmt.query_row(params![token_hash], row_to_case).optional()?;
    Ok(case)
}

/// All live cases owned by one PHW, newest first.
pub fn list_cases_for_phw(conn: &Connection, phw_id: &Uuid) -> Result<Vec<Case>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CASE_COLUMNS} FROM cases
         WHERE phw_id = ?1 AND deleted_at IS NULL
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![phw_id.to_string()], row_to_case)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DatabaseError::from)
}

pub fn set_status(
    conn: &Connection,
    case_id: &Uuid,
    status: CaseStatus,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE cases SET status = ?2, updated_at = ?3,
             closed_at = COALESCE(?4, closed_at)
         WHERE id = ?1 AND deleted_at IS NULL",
        params![
            case_id.to_string(),
            status.as_str(),
            updated_at.to_rfc3339(),
            closed_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "case".into(),
            id: case_id.to_string(),
        });
    }
    Ok(())
}

/// Record an escalation: reason, optional target specialist, token hash and
/// expiry. Replaces any previous token hash.
#[allow(clippy::too_many_arguments)]
pub fn set_escalation(
    conn: &Connection,
    case_id: &Uuid,
    reason: &str,
    specialist_id: Option<&Uuid>,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE cases SET escalation_reason = ?2, specialist_id = COALESCE(?3, specialist_id),
             escalation_token_hash = ?4, escalation_token_expires_at = ?5, updated_at = ?6
         WHERE id = ?1 AND deleted_at IS NULL",
        params![
            case_id.to_string(),
            reason,
            specialist_id.map(|id| id.to_string()),
            token_hash,
            expires_at.to_rfc3339(),
            updated_at.to_rfc3339(),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "case".into(),
            id: case_id.to_string(),
        });
    }
    Ok(())
}

/// Revoke the live escalation token, if any.
pub fn clear_escalation_token(conn: &Connection, case_id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE cases SET escalation_token_hash = NULL, escalation_token_expires_at = NULL
         WHERE id = ?1",
        params![case_id.to_string()],
    )?;
    Ok(())
}

/// Soft-delete: the case becomes invisible to all reads.
pub fn soft_delete(
    conn: &Connection,
    case_id: &Uuid,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE cases SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        params![case_id.to_string(), at.to_rfc3339()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "case".into(),
            id: case_id.to_string(),
        });
    }
    Ok(())
}

// ── Intake children ─────────────────────────────────────────

/// Insert one immutable vitals snapshot; returns its id.
pub fn insert_vitals(
    conn: &Connection,
    case_id: &Uuid,
    vitals: &VitalsSnapshot,
    recorded_at: DateTime<Utc>,
) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO vitals (id, case_id, systolic_bp, diastolic_bp, heart_rate,
             respiratory_rate, spo2, temperature, blood_glucose_mgdl, weight_kg,
             gcs_score, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id.to_string(),
            case_id.to_string(),
            vitals.systolic_bp,
            vitals.diastolic_bp,
            vitals.heart_rate,
            vitals.respiratory_rate,
            vitals.spo2,
            vitals.temperature,
            vitals.blood_glucose_mgdl,
            vitals.weight_kg,
            vitals.gcs_score,
            recorded_at.to_rfc3339(),
        ],
    )?;
    Ok(id)
}

pub fn latest_vitals(
    conn: &Connection,
    case_id: &Uuid,
) -> Result<Option<VitalsSnapshot>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT systolic_bp, diastolic_bp, heart_rate, respiratory_rate, spo2,
                temperature, blood_glucose_mgdl, weight_kg, gcs_score
         FROM vitals WHERE case_id = ?1
         ORDER BY recorded_at DESC LIMIT 1",
    )?;
    let vitals = stmt
        .query_row(params![case_id.to_string()], |row| {
            Ok(VitalsSnapshot {
                systolic_bp: row.get(0)?,
                diastolic_bp: row.get(1)?,
                heart_rate: row.get(2)?,
                respiratory_rate: row.get(3)?,
                spo2: row.get(4)?,
                temperature: row.get(5)?,
                blood_glucose_mgdl: row.get(6)?,
                weight_kg: row.get(7)?,
                gcs_score: row.get(8)?,
            })
        })
        .optional()?;
    Ok(vitals)
}

pub fn insert_medications(
    conn: &Connection,
    case_id: &Uuid,
    medications: &[MedicationEntry],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO case_medications (id, case_id, drug_name, code, dose, frequency, route)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for med in medications {
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            case_id.to_string(),
            med.drug_name,
            med.code,
            med.dose,
            med.frequency,
            med.route,
        ])?;
    }
    Ok(())
}

pub fn get_medications(
    conn: &Connection,
    case_id: &Uuid,
) -> Result<Vec<MedicationEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT drug_name, code, dose, frequency, route
         FROM case_medications WHERE case_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![case_id.to_string()], |row| {
        Ok(MedicationEntry {
            drug_name: row.get(0)?,
            code: row.get(1)?,
            dose: row.get(2)?,
            frequency: row.get(3)?,
            route: row.get(4)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DatabaseError::from)
}

pub fn insert_symptoms(
    conn: &Connection,
    case_id: &Uuid,
    symptoms: &[SymptomEntry],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO case_symptoms (id, case_id, symptom_name, is_red_flag, severity, duration_hours)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for symptom in symptoms {
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            case_id.to_string(),
            symptom.symptom_name,
            symptom.is_red_flag,
            symptom.severity.map(|s| s.as_str()),
            symptom.duration_hours,
        ])?;
    }
    Ok(())
}

pub fn get_symptoms(conn: &Connection, case_id: &Uuid) -> Result<Vec<SymptomEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT symptom_name, is_red_flag, severity, duration_hours
         FROM case_symptoms WHERE case_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![case_id.to_string()], |row| {
        let severity: Option<String> = row.get(2)?;
        Ok(SymptomEntry {
            symptom_name: row.get(0)?,
            is_red_flag: row.get(1)?,
            severity: severity
                .map(|s| s.parse().map_err(|e| conversion_err(2, e)))
                .transpose()?,
            duration_hours: row.get(3)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(DatabaseError::from)
}

fn row_to_case(row: &rusqlite::Row) -> Result<Case, rusqlite::Error> {
    let id: String = row.get(0)?;
    let phw_id: String = row.get(1)?;
    let specialist_id: Option<String> = row.get(2)?;
    let status: String = row.get(3)?;
    let sex: String = row.get(9)?;
    let flags_json: String = row.get(12)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;
    let closed_at: Option<String> = row.get(15)?;
    let deleted_at: Option<String> = row.get(16)?;
    let token_expiry: Option<String> = row.get(7)?;

    Ok(Case {
        id: parse_uuid(0, &id)?,
        phw_id: parse_uuid(1, &phw_id)?,
        specialist_id: specialist_id
            .map(|s| parse_uuid(2, &s))
            .transpose()?,
        status: status.parse().map_err(|e| conversion_err(3, e))?,
        chief_complaint: row.get(4)?,
        escalation_reason: row.get(5)?,
        escalation_token_hash: row.get(6)?,
        escalation_token_expires_at: token_expiry
            .map(|s| parse_datetime(7, &s))
            .transpose()?,
        patient: PatientSnapshot {
            age: row.get(8)?,
            sex: sex.parse().map_err(|e| conversion_err(9, e))?,
            village: row.get(10)?,
            district: row.get(11)?,
            vulnerability_flags: serde_json::from_str(&flags_json)
                .map_err(|e| conversion_err(12, e))?,
        },
        created_at: parse_datetime(13, &created_at)?,
        updated_at: parse_datetime(14, &updated_at)?,
        closed_at: closed_at.map(|s| parse_datetime(15, &s)).transpose()?,
        deleted_at: deleted_at.map(|s| parse_datetime(16, &s)).transpose()?,
    })
}
