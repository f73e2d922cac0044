//! Drug product catalog models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An active ingredient and its labeled strength.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActiveIngredient {
    pub name: Option<String>,
    /// Strength text (e.g., "10 mg/1")
    pub strength: Option<String>,
}

/// A raw package entry as listed by the drug registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPackage {
    /// Package NDC as published (usually hyphenated)
    pub ndc: String,
    pub description: Option<String>,
    pub marketing_end_date: Option<String>,
    pub sample: Option<bool>,
    /// Explicit package count, used when the description has no usable unit
    pub count: Option<f64>,
}

impl CatalogPackage {
    /// Create a package entry with a description.
    pub fn new(ndc: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            ndc: ndc.into(),
            description: Some(description.into()),
            ..Default::default()
        }
    }
}

/// A drug product in the pre-loaded catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    /// Product NDC as published (labeler-product)
    pub product_ndc: String,
    pub labeler_name: Option<String>,
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    /// Registry dosage form (e.g., "TABLET, FILM COATED")
    pub dosage_form: Option<String>,
    /// Registry routes (e.g., ["ORAL"])
    #[serde(default)]
    pub routes: Vec<String>,
    pub marketing_end_date: Option<String>,
    #[serde(default)]
    pub active_ingredients: Vec<ActiveIngredient>,
    #[serde(default)]
    pub packages: Vec<CatalogPackage>,
    /// Lowercase tokens from names, form and ingredients
    #[serde(default)]
    pub search_tokens: BTreeSet<String>,
}

impl CatalogProduct {
    /// Create a new product with required fields.
    pub fn new(product_ndc: impl Into<String>) -> Self {
        Self {
            product_ndc: product_ndc.into(),
            labeler_name: None,
            generic_name: None,
            brand_name: None,
            dosage_form: None,
            routes: Vec::new(),
            marketing_end_date: None,
            active_ingredients: Vec::new(),
            packages: Vec::new(),
            search_tokens: BTreeSet::new(),
        }
    }

    /// Product NDC with non-digits removed.
    pub fn product_ndc_plain(&self) -> String {
        self.product_ndc.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    /// Recompute `search_tokens` from the descriptive fields.
    pub fn refresh_search_tokens(&mut self) {
        let mut tokens = BTreeSet::new();
        let sources = [
            self.generic_name.as_deref(),
            self.brand_name.as_deref(),
            self.dosage_form.as_deref(),
        ];
        let ingredient_names = self.active_ingredients.iter().map(|i| i.name.as_deref());

        for value in sources.into_iter().chain(ingredient_names).flatten() {
            tokens.extend(tokenize(value));
        }
        self.search_tokens = tokens;
    }

    /// Best name for display: generic, then brand, then product NDC.
    pub fn display_name(&self) -> &str {
        self.generic_name
            .as_deref()
            .or(self.brand_name.as_deref())
            .unwrap_or(&self.product_ndc)
    }

    /// Name for package records: generic, then brand.
    pub fn product_name(&self) -> Option<String> {
        self.generic_name.clone().or_else(|| self.brand_name.clone())
    }

    /// Lowercased "generic brand" text for substring matching.
    pub fn name_haystack(&self) -> String {
        format!(
            "{} {}",
            self.generic_name.as_deref().unwrap_or(""),
            self.brand_name.as_deref().unwrap_or("")
        )
        .to_lowercase()
    }

    /// Lowercased ingredient names.
    pub fn ingredient_names(&self) -> Vec<String> {
        self.active_ingredients
            .iter()
            .filter_map(|i| i.name.as_deref())
            .filter(|n| !n.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    /// Lowercased ingredient strengths.
    pub fn ingredient_strengths(&self) -> Vec<String> {
        self.active_ingredients
            .iter()
            .filter_map(|i| i.strength.as_deref())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

/// Lowercase, replace anything but `[a-z0-9\s]` with a space, split.
pub fn tokenize(value: &str) -> Vec<String> {
    value
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
