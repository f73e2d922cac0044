//! Free-text prescription → catalog product suggestion.
//!
//! Pipeline: Attribute extraction → Token context → Ranking → Selection

mod cache;
mod forms;
mod matcher;
mod tokens;

pub use cache::*;
pub use forms::*;
pub use matcher::*;
pub use tokens::*;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assist::{
    Assistance, CandidateSummary, MatchQuery, PackageExample, PrescriptionAttributes,
};
use crate::catalog::Catalog;
use crate::config::ScoringWeights;
use crate::models::CatalogProduct;

/// Model label for picks made without a collaborator.
pub const LOCAL_MODEL: &str = "fallback-local";

/// How the suggested product was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionMethod {
    /// The collaborator picked among the top candidates
    Assisted,
    /// The collaborator was asked but did not pick a listed candidate
    AssistedFallback,
    /// Highest-ranked candidate, no collaborator
    Local,
}

/// Extracted attributes, token context and ranking for one query.
#[derive(Debug, Clone)]
pub struct QueryAnalysis<'a> {
    pub attributes: PrescriptionAttributes,
    pub context: TokenContext,
    pub ranking: Ranking<'a>,
}

/// The product suggested for a free-text prescription.
#[derive(Debug, Clone)]
pub struct Suggestion<'a> {
    pub product: &'a CatalogProduct,
    pub score: i32,
    pub rationale: String,
    pub confidence: Option<f64>,
    pub method: SuggestionMethod,
    pub model: Option<String>,
    pub pass: MatchPass,
    /// Canonical dosage form the query asked for
    pub dosage_form: Option<String>,
    /// Canonical route the query asked for
    pub route: Option<String>,
}

/// Resolver that coordinates the suggestion pipeline over a catalog.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    weights: &'a ScoringWeights,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, weights: &'a ScoringWeights) -> Self {
        Self { catalog, weights }
    }

    /// Extract attributes and rank the catalog, consulting the cache first.
    pub fn analyze(
        &self,
        query: &MatchQuery,
        assistance: Assistance<'_>,
        cache: Option<&RankingCache>,
    ) -> QueryAnalysis<'a> {
        let key = RankingCache::key(
            self.catalog.generation(),
            &query.drug,
            query.sig.as_deref(),
            assistance.is_assisted(),
        );
        if let Some(hit) = cache.and_then(|c| c.get(&key, self.catalog)) {
            debug!(drug = %query.drug, "ranking cache hit");
            return hit;
        }

        // A silent collaborator degrades to the local parse
        let attributes = assistance
            .assistant()
            .and_then(|a| a.extract_prescription(query))
            .unwrap_or_else(|| fallback_parse(query));
        let context = TokenContext::build(query, &attributes);
        let ranking = CandidateMatcher::new(self.catalog, self.weights).rank(&query.drug, &context);

        let analysis = QueryAnalysis {
            attributes,
            context,
            ranking,
        };
        if let Some(cache) = cache {
            cache.insert(key, &analysis);
        }
        analysis
    }

    /// Suggest a single product, or `None` if nothing matches.
    pub fn suggest(
        &self,
        query: &MatchQuery,
        assistance: Assistance<'_>,
        cache: Option<&RankingCache>,
    ) -> Option<Suggestion<'a>> {
        let analysis = self.analyze(query, assistance, cache);
        let top = *analysis.ranking.top()?;

        let suggestion = |candidate: ScoredCandidate<'a>, rationale: String, confidence, method, model| Suggestion {
            product: candidate.product,
            score: candidate.score,
            rationale,
            confidence,
            method,
            model,
            pass: analysis.ranking.pass,
            dosage_form: analysis.context.dosage_form.clone(),
            route: analysis.context.route.clone(),
        };

        let Some(assistant) = assistance.assistant() else {
            return Some(suggestion(
                top,
                local_rationale(top.product),
                None,
                SuggestionMethod::Local,
                Some(LOCAL_MODEL.to_string()),
            ));
        };

        let shortlist: Vec<ScoredCandidate<'a>> = analysis
            .ranking
            .candidates
            .iter()
            .take(self.weights.assistant_candidates)
            .copied()
            .collect();
        let summaries: Vec<CandidateSummary> = shortlist.iter().map(summarize).collect();
        let selection = assistant.select_candidate(&analysis.attributes, &summaries);

        let picked = selection.as_ref().and_then(|sel| {
            let code = sel.product_ndc.as_deref()?;
            shortlist.iter().find(|c| c.product.product_ndc == code).copied()
        });

        match (picked, selection) {
            (Some(candidate), Some(sel)) => {
                let rationale = if sel.rationale.trim().is_empty() {
                    "Collaborator-selected NDC based on text similarity".to_string()
                } else {
                    sel.rationale
                };
                Some(suggestion(
                    candidate,
                    rationale,
                    sel.confidence,
                    SuggestionMethod::Assisted,
                    sel.model,
                ))
            }
            (_, selection) => {
                debug!(drug = %query.drug, "collaborator made no usable pick, using top candidate");
                Some(suggestion(
                    top,
                    "Matched local NDC index via keyword scoring (collaborator fallback).".to_string(),
                    None,
                    SuggestionMethod::AssistedFallback,
                    selection
                        .and_then(|sel| sel.model)
                        .or_else(|| Some(LOCAL_MODEL.to_string())),
                ))
            }
        }
    }
}

fn local_rationale(product: &CatalogProduct) -> String {
    let tokens: Vec<&str> = product
        .search_tokens
        .iter()
        .map(String::as_str)
        .filter(|t| t.chars().count() > 2)
        .take(5)
        .collect();
    format!("Matched local NDC index on tokens: {}", tokens.join(", "))
}

/// Collaborator-facing view of a candidate.
fn summarize(candidate: &ScoredCandidate<'_>) -> CandidateSummary {
    let product = candidate.product;
    CandidateSummary {
        product_ndc: product.product_ndc.clone(),
        generic_name: product.generic_name.clone(),
        brand_name: product.brand_name.clone(),
        dosage_form: product.dosage_form.clone(),
        route: product.routes.clone(),
        labeler_name: product.labeler_name.clone(),
        score: candidate.score,
        active_ingredients: product.active_ingredients.iter().take(3).cloned().collect(),
        package_examples: product
            .packages
            .iter()
            .take(3)
            .map(|pkg| PackageExample {
                ndc: pkg.ndc.clone(),
                description: pkg.description.clone(),
            })
            .collect(),
    }
}
