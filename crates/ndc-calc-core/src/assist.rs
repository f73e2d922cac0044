//! Optional text-extraction collaborator.
//!
//! The core never depends on a collaborator being present. Every method
//! returns `None` when the collaborator cannot help, and callers fall back
//! to the deterministic pattern rules.

use serde::{Deserialize, Serialize};

/// Free-text prescription as entered by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchQuery {
    /// Drug name, brand, or descriptive text
    pub drug: String,
    /// Dosing instruction text
    pub sig: Option<String>,
    /// Days supply
    pub days: Option<f64>,
}

impl MatchQuery {
    /// Create a query for a drug name only.
    pub fn new(drug: impl Into<String>) -> Self {
        Self {
            drug: drug.into(),
            sig: None,
            days: None,
        }
    }

    /// Attach a SIG.
    pub fn with_sig(mut self, sig: impl Into<String>) -> Self {
        self.sig = Some(sig.into());
        self
    }

    /// Attach a days supply.
    pub fn with_days(mut self, days: f64) -> Self {
        self.days = Some(days);
        self
    }
}

/// Structured SIG fields returned by a collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SigExtraction {
    pub dose: Option<f64>,
    pub unit: Option<String>,
    pub frequency_per_day: Option<f64>,
}

/// Prescription attributes used to rank catalog products.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionAttributes {
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    /// Numeric/unit strength tokens (e.g., "10", "mg")
    pub strength_tokens: Vec<String>,
    pub dosage_form: Option<String>,
    pub route: Option<String>,
    pub additional_keywords: Vec<String>,
}

/// Compact view of a ranked candidate shown to a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateSummary {
    pub product_ndc: String,
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    pub dosage_form: Option<String>,
    pub route: Vec<String>,
    pub labeler_name: Option<String>,
    pub score: i32,
    pub active_ingredients: Vec<crate::models::ActiveIngredient>,
    pub package_examples: Vec<PackageExample>,
}

/// A package NDC and its description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageExample {
    pub ndc: String,
    pub description: Option<String>,
}

/// A collaborator's pick among ranked candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CandidateSelection {
    /// `None` when no candidate is suitable
    pub product_ndc: Option<String>,
    pub confidence: Option<f64>,
    pub rationale: String,
    pub model: Option<String>,
}

/// A best-effort text-extraction service (typically a language model).
pub trait TextAssistant: Send + Sync {
    /// Extract dose, unit and frequency from a SIG.
    fn extract_sig(&self, sig: &str) -> Option<SigExtraction>;

    /// Extract matching attributes from a free-text prescription.
    fn extract_prescription(&self, query: &MatchQuery) -> Option<PrescriptionAttributes>;

    /// Pick the best product among ranked candidates.
    fn select_candidate(
        &self,
        attributes: &PrescriptionAttributes,
        candidates: &[CandidateSummary],
    ) -> Option<CandidateSelection>;
}

/// Parsing strategy, chosen once per request.
#[derive(Clone, Copy)]
pub enum Assistance<'a> {
    /// Deterministic rules only
    PatternOnly,
    /// Rules first, then the collaborator
    Assisted(&'a dyn TextAssistant),
}

impl<'a> Assistance<'a> {
    /// Strategy for an optional collaborator.
    pub fn from_option(assistant: Option<&'a dyn TextAssistant>) -> Self {
        match assistant {
            Some(a) => Assistance::Assisted(a),
            None => Assistance::PatternOnly,
        }
    }

    pub fn is_assisted(&self) -> bool {
        matches!(self, Assistance::Assisted(_))
    }

    /// The collaborator, if any.
    pub fn assistant(&self) -> Option<&'a dyn TextAssistant> {
        match self {
            Assistance::Assisted(a) => Some(*a),
            Assistance::PatternOnly => None,
        }
    }
}

impl std::fmt::Debug for Assistance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Assistance::PatternOnly => f.write_str("PatternOnly"),
            Assistance::Assisted(_) => f.write_str("Assisted"),
        }
    }
}
