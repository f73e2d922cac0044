//! Query tokenization for candidate matching.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::assist::{MatchQuery, PrescriptionAttributes};
use crate::models::tokenize;

use super::forms::{canonical_dosage_form, canonical_route, derive_route, guess_dosage_form};

/// Tokens too generic to discriminate between products.
const STOP_TOKENS: &[&str] = &[
    "tab", "tabs", "tablet", "tablets", "capsule", "capsules", "cap", "caps", "ml", "mg", "mcg",
    "solution", "oral", "po", "take", "sig", "daily", "day", "supply",
];

/// Tokens classified as strength units.
const UNIT_TOKENS: &[&str] = &[
    "mg", "mcg", "g", "ml", "unit", "units", "meq", "puff", "actuation", "actuations",
    "inhalation", "inhalations",
];

/// Classified query tokens plus the desired form and route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenContext {
    /// Every accepted token
    pub tokens: BTreeSet<String>,
    pub ingredient_tokens: BTreeSet<String>,
    /// Tokens containing a digit
    pub numeric_tokens: BTreeSet<String>,
    pub unit_tokens: BTreeSet<String>,
    pub dosage_form: Option<String>,
    pub route: Option<String>,
}

impl TokenContext {
    /// Build from the raw query and its extracted attributes.
    pub fn build(query: &MatchQuery, attributes: &PrescriptionAttributes) -> Self {
        let mut ctx = Self::default();

        let free_text = [
            Some(query.drug.as_str()),
            attributes.generic_name.as_deref(),
            attributes.brand_name.as_deref(),
            attributes.dosage_form.as_deref(),
        ];
        for value in free_text.into_iter().flatten() {
            for token in tokenize(value) {
                ctx.register(&token);
            }
        }
        for keyword in &attributes.additional_keywords {
            ctx.register(keyword);
        }
        for strength in &attributes.strength_tokens {
            ctx.register(strength);
        }

        let sig = query.sig.as_deref();
        ctx.dosage_form = attributes
            .dosage_form
            .clone()
            .or_else(|| guess_dosage_form(&split_words(&format!("{} {}", query.drug, sig.unwrap_or("")))))
            .and_then(|form| canonical_dosage_form(&form));
        ctx.route = attributes
            .route
            .clone()
            .or_else(|| sig.and_then(derive_route).map(str::to_string))
            .and_then(|route| canonical_route(&route));

        ctx
    }

    fn register(&mut self, token: &str) {
        let normalized = token.trim().to_lowercase();
        if normalized.chars().count() < 2 || STOP_TOKENS.contains(&normalized.as_str()) {
            return;
        }

        if normalized.chars().any(|c| c.is_ascii_digit()) {
            self.numeric_tokens.insert(normalized.clone());
        } else if UNIT_TOKENS.contains(&normalized.as_str()) {
            self.unit_tokens.insert(normalized.clone());
        } else {
            self.ingredient_tokens.insert(normalized.clone());
        }
        self.tokens.insert(normalized);
    }

    /// Nothing usable for scoring was extracted.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.numeric_tokens.is_empty() && self.ingredient_tokens.is_empty()
    }

    /// Ingredient tokens long enough to require a hit.
    pub fn desired_ingredients(&self) -> impl Iterator<Item = &str> {
        self.ingredient_tokens
            .iter()
            .map(String::as_str)
            .filter(|token| token.chars().count() > 2)
    }
}

/// Lowercase and split on whitespace and commas.
fn split_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Local attribute extraction when no collaborator helps.
pub fn fallback_parse(query: &MatchQuery) -> PrescriptionAttributes {
    let drug_tokens = split_words(&query.drug);
    let sig_tokens = query.sig.as_deref().map(split_words).unwrap_or_default();
    let combined: Vec<String> = drug_tokens.iter().chain(&sig_tokens).cloned().collect();

    let strength_tokens: Vec<String> = drug_tokens
        .iter()
        .filter(|token| token.chars().any(|c| c.is_ascii_digit()))
        .cloned()
        .collect();

    let additional_keywords = combined
        .iter()
        .filter(|token| token.chars().count() > 2 && !strength_tokens.contains(token))
        .cloned()
        .collect();

    PrescriptionAttributes {
        generic_name: Some(query.drug.clone()),
        brand_name: None,
        dosage_form: guess_dosage_form(&combined),
        route: query.sig.as_deref().and_then(derive_route).map(str::to_string),
        strength_tokens,
        additional_keywords,
    }
}
