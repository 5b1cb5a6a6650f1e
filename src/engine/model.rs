//! Calibrated risk model with per-prediction attribution.
//!
//! The artifact is a JSON additive-logit model: each feature carries hinge
//! or linear terms in log-odds space, so a feature's summed term value is
//! both its contribution to the logit and its attribution for the
//! prediction. Loaded once at startup behind a health flag; when the
//! artifact is missing or unreadable the component reports unavailable and
//! assessments proceed without it.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::models::{Attribution, ModelOutcome, RiskLevel};

use super::features::{feature_label, FeatureVector, FEATURE_NAMES};

/// How many attributions are surfaced per prediction.
const TOP_K: usize = 5;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model artifact not found or unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model artifact references unknown feature '{0}'")]
    UnknownFeature(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    /// `slope * max(0, value - knot)`
    Above,
    /// `slope * max(0, knot - value)`
    Below,
    /// `slope * (value - knot)` — may contribute negatively
    Linear,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HingeTerm {
    pub kind: TermKind,
    pub knot: f64,
    pub slope: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactFeature {
    pub name: String,
    #[serde(default)]
    pub terms: Vec<HingeTerm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub bias: f64,
    pub features: Vec<ArtifactFeature>,
}

/// An immutable, loaded model artifact.
#[derive(Debug)]
pub struct RiskModel {
    artifact: ModelArtifact,
}

impl RiskModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_str(raw)?;
        for feature in &artifact.features {
            if !FEATURE_NAMES.contains(&feature.name.as_str()) {
                return Err(ModelError::UnknownFeature(feature.name.clone()));
            }
        }
        Ok(Self { artifact })
    }

    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    /// Produce probability, tier, and top-k attributions for one vector.
    pub fn predict(&self, fv: &FeatureVector) -> ModelOutcome {
        // contribution per feature, parallel to FEATURE_NAMES
        let mut contributions = [0.0f64; 22];
        for feature in &self.artifact.features {
            let idx = FEATURE_NAMES
                .iter()
                .position(|n| *n == feature.name)
                .expect("validated at load");
            let value = fv.values[idx];
            let total: f64 = feature
                .terms
                .iter()
                .map(|t| match t.kind {
                    TermKind::Above => t.slope * (value - t.knot).max(0.0),
                    TermKind::Below => t.slope * (t.knot - value).max(0.0),
                    TermKind::Linear => t.slope * (value - t.knot),
                })
                .sum();
            contributions[idx] = total;
        }

        let logit: f64 = self.artifact.bias + contributions.iter().sum::<f64>();
        let probability = (sigmoid(logit) * 1000.0).round() / 1000.0;
        let probability = probability.clamp(0.0, 1.0);
        let risk_level = probability_to_level(probability);

        // top-k by |contribution|, stable on the fixed feature order
        let mut order: Vec<usize> = (0..FEATURE_NAMES.len()).collect();
        order.sort_by(|&a, &b| {
            contributions[b]
                .abs()
                .partial_cmp(&contributions[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let shap_features: Vec<Attribution> = order
            .iter()
            .take(TOP_K)
            .map(|&idx| {
                let name = FEATURE_NAMES[idx];
                let value = fv.values[idx];
                let contribution = contributions[idx];
                Attribution {
                    feature: name.to_string(),
                    value: (value * 10_000.0).round() / 10_000.0,
                    shap_value: (contribution * 10_000.0).round() / 10_000.0,
                    label: format!(
                        "{} = {:.1} (impact: {}{:.3})",
                        feature_label(name),
                        value,
                        if contribution >= 0.0 { "↑" } else { "↓" },
                        contribution.abs()
                    ),
                }
            })
            .collect();

        let shap_text = build_summary(&shap_features, risk_level);

        ModelOutcome {
            risk_probability: probability,
            risk_level,
            shap_features,
            shap_text,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Tier mapping: [0,0.30) low, [0.30,0.55) moderate, [0.55,0.80) high,
/// [0.80,1.0] critical.
pub fn probability_to_level(p: f64) -> RiskLevel {
    if p >= 0.80 {
        RiskLevel::Critical
    } else if p >= 0.55 {
        RiskLevel::High
    } else if p >= 0.30 {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Clinical interpretation of one attribution for the text summary.
fn interpret(feature: &str, value: f64) -> String {
    match feature {
        "systolic_bp" => {
            if value < 100.0 {
                "low blood pressure".into()
            } else {
                "elevated blood pressure".into()
            }
        }
        "age_years" => {
            if value < 40.0 {
                "younger age".into()
            } else {
                "older age".into()
            }
        }
        "spo2" => "oxygen desaturation".into(),
        "shock_index" => "shock indicators (elevated HR relative to BP)".into(),
        "respiratory_rate" => "rapid breathing".into(),
        "heart_rate" => "rapid heart rate".into(),
        "has_altered_consciousness" => "altered level of consciousness".into(),
        "has_chest_pain" => "chest pain".into(),
        "is_immunocompromised" => "immunocompromised state".into(),
        "is_pregnant" => "pregnancy-related risk".into(),
        "temperature" => "abnormal temperature".into(),
        other => other.replace('_', " "),
    }
}

/// One-sentence summary joining the top two attributions.
fn build_summary(features: &[Attribution], risk_level: RiskLevel) -> String {
    let Some(top) = features.first() else {
        return "Insufficient data to generate clinical interpretation.".into();
    };

    let mut text = format!("Primary driver: {}", interpret(&top.feature, top.value));
    if let Some(second) = features.get(1) {
        text.push_str(&format!(
            " combined with {}",
            interpret(&second.feature, second.value)
        ));
    }

    let phrase = match risk_level {
        RiskLevel::Critical => "suggest critical deterioration requiring immediate intervention",
        RiskLevel::High => "indicate high risk, escalation strongly recommended",
        RiskLevel::Moderate => "suggest moderate risk, close monitoring required",
        RiskLevel::Low => "suggest lower risk, standard care appropriate",
    };

    format!("{text} {phrase}.")
}

/// Holds the loaded model. Loaded once at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    model: Option<RiskModel>,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self { model: None }
    }

    pub fn with_model(model: RiskModel) -> Self {
        Self { model: Some(model) }
    }

    /// Load from disk. A missing or invalid artifact leaves the registry
    /// unavailable rather than failing startup.
    pub fn load(path: &Path) -> Self {
        match RiskModel::load(path) {
            Ok(model) => {
                tracing::info!(version = model.version(), "risk model loaded");
                Self { model: Some(model) }
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(),
                    "risk model unavailable, assessments will omit ml_result");
                Self { model: None }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn version(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.version())
    }

    pub fn predict(&self, fv: &FeatureVector) -> Option<ModelOutcome> {
        self.model.as_ref().map(|m| m.predict(fv))
    }
}
