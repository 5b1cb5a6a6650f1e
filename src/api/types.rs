//! Shared state and auth types for the API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::bus::CaseEventBus;
use crate::config::Config;
use crate::db::CaseStore;
use crate::engine::DecisionEngine;
use crate::handover::HandoverGenerator;
use crate::token;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<CaseStore>,
    pub engine: Arc<DecisionEngine>,
    pub bus: Arc<CaseEventBus>,
    pub handover: Arc<HandoverGenerator>,
    pub phws: Arc<Mutex<PhwRegistry>>,
    pub config: Arc<Config>,
}

impl ApiContext {
    pub fn new(
        store: Arc<CaseStore>,
        engine: Arc<DecisionEngine>,
        bus: Arc<CaseEventBus>,
        handover: Arc<HandoverGenerator>,
        phws: PhwRegistry,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            engine,
            bus,
            handover,
            phws: Arc::new(Mutex::new(phws)),
            config,
        }
    }

    /// Validate a PHW bearer token against the registry.
    pub fn authenticate_phw(&self, bearer: &str) -> Option<PhwIdentity> {
        let registry = self.phws.lock().ok()?;
        registry.validate(bearer)
    }
}

/// Authenticated PHW, injected into request extensions by the auth
/// middleware after successful token validation.
#[derive(Debug, Clone)]
pub struct PhwIdentity {
    pub id: Uuid,
    pub full_name: String,
    pub facility: String,
}

/// Request-scoped metadata, injected by the outer context middleware.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: Uuid,
    pub ip: Option<String>,
}

/// In-memory registry of provisioned PHW bearer tokens, keyed by token
/// hash. Session management proper is out of scope; this stands in so the
/// authenticated surface is exercisable.
#[derive(Debug, Default)]
pub struct PhwRegistry {
    by_hash: HashMap<String, PhwIdentity>,
    by_id: HashMap<Uuid, PhwIdentity>,
}

impl PhwRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bearer token; returns the assigned PHW id.
    pub fn register(&mut self, bearer: &str, full_name: &str, facility: &str) -> Uuid {
        let identity = PhwIdentity {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            facility: facility.to_string(),
        };
        self.by_hash
            .insert(token::hash_token_hex(bearer), identity.clone());
        self.by_id.insert(identity.id, identity.clone());
        identity.id
    }

    pub fn validate(&self, bearer: &str) -> Option<PhwIdentity> {
        self.by_hash.get(&token::hash_token_hex(bearer)).cloned()
    }

    pub fn get(&self, id: &Uuid) -> Option<PhwIdentity> {
        self.by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_validate() {
        let mut registry = PhwRegistry::new();
        let id = registry.register("secret-token", "Asha Devi", "PHC Rampur");

        let identity = registry.validate("secret-token").unwrap();
        assert_eq!(identity.id, id);
        assert_eq!(identity.full_name, "Asha Devi");
        assert_eq!(registry.get(&id).unwrap().facility, "PHC Rampur");
    }

    #[test]
    fn wrong_token_rejected() {
        let mut registry = PhwRegistry::new();
        registry.register("secret-token", "Asha Devi", "PHC Rampur");
        assert!(registry.validate("other-token").is_none());
        assert!(registry.validate("").is_none());
    }

    #[test]
    fn tokens_are_stored_hashed() {
        let mut registry = PhwRegistry::new();
        registry.register("secret-token", "Asha Devi", "PHC Rampur");
        assert!(!registry.by_hash.contains_key("secret-token"));
    }
}
