//! Hybrid decision engine: deterministic rule guardrail, calibrated risk
//! model with per-prediction attribution, medication safety engine, and the
//! aggregator that fuses the three under a fixed override precedence.

pub mod aggregate;
pub mod features;
pub mod medication;
pub mod model;
pub mod rules;

pub use aggregate::{AnalysisInput, AnalysisOutput, DecisionEngine};
pub use medication::{InteractionTable, MedicationEngine};
pub use model::{ModelRegistry, RiskModel};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The rule guardrail is the safety floor; its failure is fatal.
    #[error("rule guardrail failed: {0}")]
    RuleGuardrail(String),

    #[error("rule guardrail missed its {0:?} deadline")]
    RuleDeadline(std::time::Duration),

    #[error("analyzer fan-out exceeded the composite deadline")]
    CompositeDeadline,
}
