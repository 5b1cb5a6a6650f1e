//! Transactional case store.
//!
//! Every mutation validates the case state machine and writes its audit row
//! inside one transaction. Per-case serialization is provided by a
//! case-scoped async mutex handed out by [`CaseStore::case_lock`]; callers
//! hold it across the mutation and the event publish so events leave in
//! commit order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::medication::InteractionTable;
use crate::engine::{AnalysisInput, AnalysisOutput};
use crate::models::{
    AdvicePayload, Case, CaseStatus, RiskAssessment, Sbar, SpecialistAdvice,
};
use crate::token;

use super::repository::audit::AuditEntry;
use super::repository::{advice, assessment, audit, case as case_repo, interactions};
use super::DatabaseError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("case not found")]
    CaseNotFound,

    #[error("case has no risk assessment")]
    AssessmentMissing,

    #[error("transition from '{from}' to '{to}' is not permitted")]
    InvalidTransition { from: CaseStatus, to: CaseStatus },

    #[error("advice not accepted while case status is '{current}'")]
    AdviceNotAccepted { current: CaseStatus },

    #[error("escalation token unknown, expired, or revoked")]
    TokenInvalid,

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(DatabaseError::Sqlite(e))
    }
}

/// Who/what caused a mutation, recorded on its audit row.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub request_id: Option<String>,
}

impl AuditContext {
    fn entry<'a>(&'a self, action: &'a str, resource: &'a str) -> AuditEntry<'a> {
        AuditEntry {
            user_id: self.user_id.as_deref(),
            action,
            resource,
            ip: self.ip.as_deref(),
            request_id: self.request_id.as_deref(),
            old_value: None,
            new_value: None,
        }
    }
}

pub struct CaseStore {
    conn: Mutex<Connection>,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl CaseStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(super::sqlite::open_memory_database()?))
    }

    /// Case-scoped mutex; transitions on one case are totally ordered.
    pub fn case_lock(&self, case_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("case lock map poisoned");
        locks
            .entry(case_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Borrow the connection for an out-of-band audit write (request log).
    pub fn audit_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.lock_conn()
    }

    pub fn load_interaction_table(&self) -> Result<InteractionTable, StoreError> {
        let conn = self.lock_conn()?;
        Ok(interactions::load_interaction_table(&conn)?)
    }

    // ── Writes ───────────────────────────────────────────────

    /// Persist one analyze call: case, intake children, vitals, and the
    /// assessment, transitioning intake -> analyzed, all in one transaction.
    pub fn record_analysis(
        &self,
        phw_id: Uuid,
        input: &AnalysisInput,
        output: &AnalysisOutput,
        audit_ctx: &AuditContext,
    ) -> Result<(Case, RiskAssessment), StoreError> {
        let mut case = Case::new(phw_id, input.chief_complaint.clone(), input.patient.clone());
        let assessment = RiskAssessment {
            id: Uuid::new_v4(),
            case_id: case.id,
            rule: output.rule.clone(),
            ml: output.ml.clone(),
            med_warnings: output.med_warnings.clone(),
            med_override_triggered: output.med_override,
            final_risk_level: output.final_risk_level,
            final_risk_score: output.final_risk_score,
            recommendation: output.recommendation.clone(),
            escalation_suggested: output.escalation_suggested,
            model_version: output.model_version.clone(),
            sbar: None,
            assessed_at: Utc::now(),
        };

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        case_repo::insert_case(&tx, &case)?;
        case_repo::insert_medications(&tx, &case.id, &input.medications)?;
        case_repo::insert_symptoms(&tx, &case.id, &input.symptoms)?;
        case_repo::insert_vitals(&tx, &case.id, &input.vitals, assessment.assessed_at)?;
        assessment::insert_assessment(&tx, &assessment)?;

        let now = Utc::now();
        case_repo::set_status(&tx, &case.id, CaseStatus::Analyzed, now, None)?;

        let resource = format!("case:{}", case.id);
        audit::insert_audit(&tx, &audit_ctx.entry("create_case", &resource))?;
        let mut entry = audit_ctx.entry("write_assessment", &resource);
        entry.old_value = Some(CaseStatus::Intake.as_str());
        entry.new_value = Some(CaseStatus::Analyzed.as_str());
        audit::insert_audit(&tx, &entry)?;

        tx.commit()?;

        case.status = CaseStatus::Analyzed;
        case.updated_at = now;
        Ok((case, assessment))
    }

    /// Append a further vitals snapshot to an existing case.
    pub fn append_vitals(
        &self,
        case_id: Uuid,
        vitals: &crate::models::VitalsSnapshot,
        audit_ctx: &AuditContext,
    ) -> Result<Uuid, StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let case = case_repo::get_case(&tx, &case_id)?.ok_or(StoreError::CaseNotFound)?;
        if case.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                from: case.status,
                to: case.status,
            });
        }
        let vitals_id = case_repo::insert_vitals(&tx, &case_id, vitals, Utc::now())?;

        let resource = format!("case:{case_id}");
        audit::insert_audit(&tx, &audit_ctx.entry("append_vitals", &resource))?;
        tx.commit()?;
        Ok(vitals_id)
    }

    /// Record an escalation: validates the transition (or re-mint while
    /// already escalated, which invalidates the previous token), stores the
    /// token hash and expiry, and moves the case to `escalated`.
    pub fn mint_escalation(
        &self,
        case_id: Uuid,
        reason: &str,
        specialist_id: Option<Uuid>,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        audit_ctx: &AuditContext,
    ) -> Result<Case, StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let case = case_repo::get_case(&tx, &case_id)?.ok_or(StoreError::CaseNotFound)?;
        let from = case.status;
        let remint = from.holds_escalation_token();
        if !remint && !from.can_transition_to(CaseStatus::Escalated) {
            return Err(StoreError::InvalidTransition {
                from,
                to: CaseStatus::Escalated,
            });
        }

        let now = Utc::now();
        case_repo::set_escalation(
            &tx,
            &case_id,
            reason,
            specialist_id.as_ref(),
            token_hash,
            expires_at,
            now,
        )?;
        if !remint {
            case_repo::set_status(&tx, &case_id, CaseStatus::Escalated, now, None)?;
        }

        let resource = format!("case:{case_id}");
        let mut entry = audit_ctx.entry("mint_escalation", &resource);
        entry.old_value = Some(from.as_str());
        entry.new_value = Some(CaseStatus::Escalated.as_str());
        audit::insert_audit(&tx, &entry)?;
        tx.commit()?;

        case_repo::get_case(&conn, &case_id)?.ok_or(StoreError::CaseNotFound)
    }

    /// Validate an escalation token and open the case for the specialist.
    /// First use transitions the case to `specialist_reviewing`; the bool in
    /// the result reports whether a transition happened.
    pub fn consume_escalation(
        &self,
        presented_token: &str,
        now: DateTime<Utc>,
        audit_ctx: &AuditContext,
    ) -> Result<(Case, bool), StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let case = self.resolve_token(&tx, presented_token, now)?;

        let transitioned = if case.status == CaseStatus::Escalated {
            let at = Utc::now();
            case_repo::set_status(&tx, &case.id, CaseStatus::SpecialistReviewing, at, None)?;
            let resource = format!("case:{}", case.id);
            let mut entry = audit_ctx.entry("consume_escalation", &resource);
            entry.old_value = Some(CaseStatus::Escalated.as_str());
            entry.new_value = Some(CaseStatus::SpecialistReviewing.as_str());
            audit::insert_audit(&tx, &entry)?;
            true
        } else {
            let resource = format!("case:{}", case.id);
            audit::insert_audit(&tx, &audit_ctx.entry("portal_read", &resource))?;
            false
        };

        tx.commit()?;
        let case = case_repo::get_case(&conn, &case.id)?.ok_or(StoreError::CaseNotFound)?;
        Ok((case, transitioned))
    }

    /// Append specialist advice under token auth. The claimed case id must
    /// match the token's case. Transitions to `advised` on first advice and
    /// optionally revokes the token when `single_use` is set.
    #[allow(clippy::too_many_arguments)]
    pub fn append_advice(
        &self,
        presented_token: &str,
        claimed_case_id: Uuid,
        payload: AdvicePayload,
        now: DateTime<Utc>,
        single_use: bool,
        audit_ctx: &AuditContext,
    ) -> Result<(Case, SpecialistAdvice, CaseStatus), StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let case = self.resolve_token(&tx, presented_token, now)?;
        if case.id != claimed_case_id {
            return Err(StoreError::TokenInvalid);
        }
        if !case.status.accepts_advice() {
            return Err(StoreError::AdviceNotAccepted {
                current: case.status,
            });
        }

        let latest = assessment::latest_for_case(&tx, &case.id)?
            .ok_or(StoreError::AssessmentMissing)?;
        let advice_row =
            SpecialistAdvice::from_payload(case.id, latest.id, case.specialist_id, payload);
        advice::insert_advice(&tx, &advice_row)?;

        let at = Utc::now();
        let from = case.status;
        if from != CaseStatus::Advised {
            case_repo::set_status(&tx, &case.id, CaseStatus::Advised, at, None)?;
        }
        if single_use {
            case_repo::clear_escalation_token(&tx, &case.id)?;
        }

        let resource = format!("case:{}", case.id);
        let mut entry = audit_ctx.entry("append_advice", &resource);
        entry.old_value = Some(from.as_str());
        entry.new_value = Some(CaseStatus::Advised.as_str());
        audit::insert_audit(&tx, &entry)?;
        tx.commit()?;

        let case = case_repo::get_case(&conn, &case.id)?.ok_or(StoreError::CaseNotFound)?;
        Ok((case, advice_row, from))
    }

    /// Generic status transition (close, cancel). Closing or cancelling
    /// revokes any live escalation token.
    pub fn update_status(
        &self,
        case_id: Uuid,
        to: CaseStatus,
        audit_ctx: &AuditContext,
    ) -> Result<Case, StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let case = case_repo::get_case(&tx, &case_id)?.ok_or(StoreError::CaseNotFound)?;
        let from = case.status;
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        let now = Utc::now();
        let closed_at = matches!(to, CaseStatus::Closed | CaseStatus::Cancelled).then_some(now);
        case_repo::set_status(&tx, &case_id, to, now, closed_at)?;
        if to.is_terminal() {
            case_repo::clear_escalation_token(&tx, &case_id)?;
        }

        let resource = format!("case:{case_id}");
        let mut entry = audit_ctx.entry("update_status", &resource);
        entry.old_value = Some(from.as_str());
        entry.new_value = Some(to.as_str());
        audit::insert_audit(&tx, &entry)?;
        tx.commit()?;

        case_repo::get_case(&conn, &case_id)?.ok_or(StoreError::CaseNotFound)
    }

    /// Soft-delete: the case disappears from all reads.
    pub fn soft_delete_case(
        &self,
        case_id: Uuid,
        audit_ctx: &AuditContext,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        case_repo::get_case(&tx, &case_id)?.ok_or(StoreError::CaseNotFound)?;
        case_repo::soft_delete(&tx, &case_id, Utc::now())?;

        let resource = format!("case:{case_id}");
        audit::insert_audit(&tx, &audit_ctx.entry("soft_delete", &resource))?;
        tx.commit()?;
        Ok(())
    }

    /// Persist generated handover text. Kept outside the escalation
    /// transaction so a late failure cannot roll back a committed escalation.
    pub fn set_sbar(&self, assessment_id: Uuid, sbar: &Sbar) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        assessment::set_sbar(&conn, &assessment_id, sbar)?;
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────

    pub fn get_case(&self, case_id: Uuid) -> Result<Option<Case>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(case_repo::get_case(&conn, &case_id)?)
    }

    pub fn list_cases_for_phw(&self, phw_id: Uuid) -> Result<Vec<Case>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(case_repo::list_cases_for_phw(&conn, &phw_id)?)
    }

    pub fn latest_assessment(&self, case_id: Uuid) -> Result<Option<RiskAssessment>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(assessment::latest_for_case(&conn, &case_id)?)
    }

    pub fn assessments_for_case(&self, case_id: Uuid) -> Result<Vec<RiskAssessment>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(assessment::list_for_case(&conn, &case_id)?)
    }

    pub fn advice_for_case(&self, case_id: Uuid) -> Result<Vec<SpecialistAdvice>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(advice::list_for_case(&conn, &case_id)?)
    }

    pub fn latest_vitals(
        &self,
        case_id: Uuid,
    ) -> Result<Option<crate::models::VitalsSnapshot>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(case_repo::latest_vitals(&conn, &case_id)?)
    }

    pub fn medications_for_case(
        &self,
        case_id: Uuid,
    ) -> Result<Vec<crate::models::MedicationEntry>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(case_repo::get_medications(&conn, &case_id)?)
    }

    pub fn symptoms_for_case(
        &self,
        case_id: Uuid,
    ) -> Result<Vec<crate::models::SymptomEntry>, StoreError> {
        let conn = self.lock_conn()?;
        Ok(case_repo::get_symptoms(&conn, &case_id)?)
    }

    // ── Token resolution ─────────────────────────────────────

    /// Read-only token check, used for websocket auth. Does not transition.
    pub fn validate_escalation_token(
        &self,
        presented_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Case, StoreError> {
        let conn = self.lock_conn()?;
        self.resolve_token(&conn, presented_token, now)
    }

    /// Hash the presented token, look the case up by hash, and constant-time
    /// compare before honoring it. Expired, revoked, or state-violating
    /// tokens all fail identically.
    fn resolve_token(
        &self,
        conn: &Connection,
        presented_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Case, StoreError> {
        let computed = token::hash_token_hex(presented_token);
        let case = case_repo::get_case_by_token_hash(conn, &computed)?
            .ok_or(StoreError::TokenInvalid)?;

        let stored = case
            .escalation_token_hash
            .as_deref()
            .ok_or(StoreError::TokenInvalid)?;
        if !token::hashes_match(stored, &computed) {
            return Err(StoreError::TokenInvalid);
        }
        let expires = case
            .escalation_token_expires_at
            .ok_or(StoreError::TokenInvalid)?;
        if expires <= now {
            return Err(StoreError::TokenInvalid);
        }
        if !case.status.holds_escalation_token() && !case.status.accepts_advice() {
            return Err(StoreError::TokenInvalid);
        }
        Ok(case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AdviceType, PatientSnapshot, RiskLevel, RuleOutcome, Sex, SymptomEntry, VitalsSnapshot,
        VulnerabilityFlags,
    };
    use crate::token::mint;

    fn input() -> AnalysisInput {
        AnalysisInput {
            patient: PatientSnapshot {
                age: 45,
                sex: Sex::Female,
                village: None,
                district: None,
                vulnerability_flags: VulnerabilityFlags::default(),
            },
            vitals: VitalsSnapshot {
                systolic_bp: 85,
                diastolic_bp: 55,
                heart_rate: 118,
                respiratory_rate: 26,
                spo2: 91.5,
                temperature: 38.8,
                blood_glucose_mgdl: None,
                weight_kg: None,
                gcs_score: None,
            },
            medications: vec![],
            symptoms: vec![SymptomEntry {
                symptom_name: "chest pain".into(),
                is_red_flag: true,
                severity: None,
                duration_hours: None,
            }],
            chief_complaint: "chest pain and breathlessness".into(),
        }
    }

    fn output() -> AnalysisOutput {
        AnalysisOutput {
            rule: RuleOutcome {
                triggered: true,
                risk_level: Some(RiskLevel::Critical),
                reasons: vec!["Severe hypotension/shock risk: SBP = 85 mmHg".into()],
                override_ml: true,
            },
            ml: None,
            med_warnings: vec![],
            med_override: false,
            med_engine_failed: false,
            final_risk_level: RiskLevel::Critical,
            final_risk_score: 1.0,
            recommendation: "IMMEDIATE ESCALATION REQUIRED.".into(),
            escalation_suggested: true,
            model_version: None,
        }
    }

    fn analyzed_case(store: &CaseStore) -> Case {
        let (case, _) = store
            .record_analysis(Uuid::new_v4(), &input(), &output(), &AuditContext::default())
            .unwrap();
        case
    }

    fn escalate(store: &CaseStore, case: &Case) -> crate::token::MintedToken {
        let minted = mint(chrono::Duration::hours(24));
        store
            .mint_escalation(
                case.id,
                "needs specialist",
                None,
                &minted.hash_hex,
                minted.expires_at,
                &AuditContext::default(),
            )
            .unwrap();
        minted
    }

    fn payload() -> AdvicePayload {
        AdvicePayload {
            advice_type: AdviceType::UrgentReferral,
            custom_notes: None,
            medications_advised: vec![],
            investigations: vec![],
            follow_up_hours: None,
        }
    }

    #[test]
    fn record_analysis_creates_analyzed_case() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        assert_eq!(case.status, CaseStatus::Analyzed);

        let fetched = store.get_case(case.id).unwrap().unwrap();
        assert_eq!(fetched.status, CaseStatus::Analyzed);
        assert!(store.latest_assessment(case.id).unwrap().is_some());
        assert!(store.latest_vitals(case.id).unwrap().is_some());
        assert_eq!(store.symptoms_for_case(case.id).unwrap().len(), 1);
    }

    #[test]
    fn escalation_lifecycle_roundtrip() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let minted = escalate(&store, &case);

        let escalated = store.get_case(case.id).unwrap().unwrap();
        assert_eq!(escalated.status, CaseStatus::Escalated);
        assert!(escalated.has_live_token(Utc::now()));

        // first portal read transitions
        let (reviewing, transitioned) = store
            .consume_escalation(&minted.token, Utc::now(), &AuditContext::default())
            .unwrap();
        assert!(transitioned);
        assert_eq!(reviewing.status, CaseStatus::SpecialistReviewing);

        // second read does not
        let (_, transitioned) = store
            .consume_escalation(&minted.token, Utc::now(), &AuditContext::default())
            .unwrap();
        assert!(!transitioned);

        // advice moves to advised
        let (advised, advice_row, previous) = store
            .append_advice(
                &minted.token,
                case.id,
                payload(),
                Utc::now(),
                false,
                &AuditContext::default(),
            )
            .unwrap();
        assert_eq!(advised.status, CaseStatus::Advised);
        assert_eq!(previous, CaseStatus::SpecialistReviewing);
        assert_eq!(advice_row.advice_type, AdviceType::UrgentReferral);
        assert_eq!(store.advice_for_case(case.id).unwrap().len(), 1);
    }

    #[test]
    fn expired_token_rejected() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let minted = mint(chrono::Duration::seconds(-1));
        store
            .mint_escalation(
                case.id,
                "needs specialist",
                None,
                &minted.hash_hex,
                minted.expires_at,
                &AuditContext::default(),
            )
            .unwrap();

        let result = store.consume_escalation(&minted.token, Utc::now(), &AuditContext::default());
        assert!(matches!(result, Err(StoreError::TokenInvalid)));
    }

    #[test]
    fn unknown_token_rejected() {
        let store = CaseStore::in_memory().unwrap();
        analyzed_case(&store);
        let result =
            store.consume_escalation("no-such-token", Utc::now(), &AuditContext::default());
        assert!(matches!(result, Err(StoreError::TokenInvalid)));
    }

    #[test]
    fn remint_invalidates_previous_token() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let first = escalate(&store, &case);
        let second = escalate(&store, &case);

        assert!(matches!(
            store.consume_escalation(&first.token, Utc::now(), &AuditContext::default()),
            Err(StoreError::TokenInvalid)
        ));
        assert!(store
            .consume_escalation(&second.token, Utc::now(), &AuditContext::default())
            .is_ok());
    }

    #[test]
    fn advice_rejected_before_escalation() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let minted = mint(chrono::Duration::hours(24));
        // token never minted on the case
        let result = store.append_advice(
            &minted.token,
            case.id,
            payload(),
            Utc::now(),
            false,
            &AuditContext::default(),
        );
        assert!(matches!(result, Err(StoreError::TokenInvalid)));
    }

    #[test]
    fn advice_case_mismatch_rejected() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let other = analyzed_case(&store);
        let minted = escalate(&store, &case);

        let result = store.append_advice(
            &minted.token,
            other.id,
            payload(),
            Utc::now(),
            false,
            &AuditContext::default(),
        );
        assert!(matches!(result, Err(StoreError::TokenInvalid)));
    }

    #[test]
    fn multiple_advice_rows_append() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let minted = escalate(&store, &case);

        for _ in 0..3 {
            store
                .append_advice(
                    &minted.token,
                    case.id,
                    payload(),
                    Utc::now(),
                    false,
                    &AuditContext::default(),
                )
                .unwrap();
        }
        assert_eq!(store.advice_for_case(case.id).unwrap().len(), 3);
        let fetched = store.get_case(case.id).unwrap().unwrap();
        assert_eq!(fetched.status, CaseStatus::Advised);
    }

    #[test]
    fn single_use_revokes_token_after_advice() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let minted = escalate(&store, &case);

        store
            .append_advice(
                &minted.token,
                case.id,
                payload(),
                Utc::now(),
                true,
                &AuditContext::default(),
            )
            .unwrap();

        assert!(matches!(
            store.consume_escalation(&minted.token, Utc::now(), &AuditContext::default()),
            Err(StoreError::TokenInvalid)
        ));
    }

    #[test]
    fn close_revokes_token_and_blocks_advice() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let minted = escalate(&store, &case);

        store
            .update_status(case.id, CaseStatus::Closed, &AuditContext::default())
            .unwrap();

        let closed = store.get_case(case.id).unwrap().unwrap();
        assert_eq!(closed.status, CaseStatus::Closed);
        assert!(closed.closed_at.is_some());

        assert!(matches!(
            store.append_advice(
                &minted.token,
                case.id,
                payload(),
                Utc::now(),
                false,
                &AuditContext::default()
            ),
            Err(StoreError::TokenInvalid)
        ));
    }

    #[test]
    fn invalid_transitions_rejected() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);

        store
            .update_status(case.id, CaseStatus::Closed, &AuditContext::default())
            .unwrap();
        let result = store.update_status(case.id, CaseStatus::Cancelled, &AuditContext::default());
        assert!(matches!(
            result,
            Err(StoreError::InvalidTransition {
                from: CaseStatus::Closed,
                to: CaseStatus::Cancelled
            })
        ));
    }

    #[test]
    fn cancel_is_terminal_from_any_live_state() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        escalate(&store, &case);

        let cancelled = store
            .update_status(case.id, CaseStatus::Cancelled, &AuditContext::default())
            .unwrap();
        assert_eq!(cancelled.status, CaseStatus::Cancelled);
        assert!(cancelled.escalation_token_hash.is_none());
    }

    #[test]
    fn escalation_requires_live_case() {
        let store = CaseStore::in_memory().unwrap();
        let minted = mint(chrono::Duration::hours(24));
        let result = store.mint_escalation(
            Uuid::new_v4(),
            "reason",
            None,
            &minted.hash_hex,
            minted.expires_at,
            &AuditContext::default(),
        );
        assert!(matches!(result, Err(StoreError::CaseNotFound)));
    }

    #[test]
    fn soft_deleted_case_disappears() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        store
            .soft_delete_case(case.id, &AuditContext::default())
            .unwrap();
        assert!(store.get_case(case.id).unwrap().is_none());
    }

    #[test]
    fn append_vitals_to_live_case() {
        let store = CaseStore::in_memory().unwrap();
        let case = analyzed_case(&store);
        let mut vitals = input().vitals;
        vitals.heart_rate = 95;
        store
            .append_vitals(case.id, &vitals, &AuditContext::default())
            .unwrap();
        let latest = store.latest_vitals(case.id).unwrap().unwrap();
        assert_eq!(latest.heart_rate, 95);
    }

    #[test]
    fn case_lock_is_stable_per_case() {
        let store = CaseStore::in_memory().unwrap();
        let id = Uuid::new_v4();
        let a = store.case_lock(id);
        let b = store.case_lock(id);
        assert!(Arc::ptr_eq(&a, &b));
        let c = store.case_lock(Uuid::new_v4());
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
