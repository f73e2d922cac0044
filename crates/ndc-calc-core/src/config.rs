//! Tunable weights and policies.
//!
//! Defaults reproduce the shipped behavior. Every field can be overridden
//! from JSON; missing fields keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Candidate matcher weights. Heuristic; higher score wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Per query token found in the product's search tokens
    pub token_match: i32,
    pub form_match: i32,
    /// Subtracted when both forms are known and differ
    pub form_mismatch_penalty: i32,
    pub route_match: i32,
    /// Subtracted when the product declares routes and none match
    pub route_mismatch_penalty: i32,
    /// Per numeric token found in an ingredient strength
    pub strength_match: i32,
    /// Extra when a unit token is also found in a strength
    pub strength_unit_match: i32,
    /// Per package whose description contains a numeric token
    pub package_strength_match: i32,
    pub package_unit_match: i32,
    /// Fallback pass: full drug text found in the product names
    pub fallback_full_match: i32,
    /// Fallback pass: first word only
    pub fallback_partial_match: i32,
    /// Maximum ranked candidates returned by any pass
    pub candidate_limit: usize,
    /// Candidates shown to the collaborator for disambiguation
    pub assistant_candidates: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            token_match: 4,
            form_match: 12,
            form_mismatch_penalty: 8,
            route_match: 6,
            route_mismatch_penalty: 6,
            strength_match: 8,
            strength_unit_match: 4,
            package_strength_match: 3,
            package_unit_match: 2,
            fallback_full_match: 100,
            fallback_partial_match: 10,
            candidate_limit: 100,
            assistant_candidates: 6,
        }
    }
}

/// Package selection and warning policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Maximum selections returned, clamped to 1..=5
    pub max_selections: usize,
    /// Emit overfill/overage-guidance warnings for the primary selection
    pub overfill_warnings: bool,
    /// Overfill fraction above which the tolerance warning fires
    pub overfill_tolerance: f64,
    /// Emit a warning when a lookup returns no package records
    pub report_empty_lookups: bool,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            max_selections: 5,
            overfill_warnings: false,
            overfill_tolerance: 0.12,
            report_empty_lookups: false,
        }
    }
}

/// Top-level calculator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalcConfig {
    pub scoring: ScoringWeights,
    pub selection: SelectionPolicy,
}

impl CalcConfig {
    /// Parse from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
