//! Catalog candidate ranking.
//!
//! Three escalating passes, first non-empty result wins:
//! - Strict: form/route mismatches reject a product
//! - Relaxed: mismatches only cost points
//! - Fallback: substring match of the raw drug name
//!
//! Ties keep catalog order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::ScoringWeights;
use crate::models::CatalogProduct;

use super::forms::{canonical_dosage_form, canonical_route};
use super::tokens::TokenContext;

/// Which pass produced a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPass {
    Strict,
    Relaxed,
    Fallback,
}

/// A catalog product with its heuristic score.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    /// Position in the catalog
    pub index: usize,
    pub product: &'a CatalogProduct,
    pub score: i32,
}

/// Ranked candidates, best first.
#[derive(Debug, Clone)]
pub struct Ranking<'a> {
    pub pass: MatchPass,
    pub candidates: Vec<ScoredCandidate<'a>>,
}

impl<'a> Ranking<'a> {
    pub fn top(&self) -> Option<&ScoredCandidate<'a>> {
        self.candidates.first()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Scores catalog products against a query.
pub struct CandidateMatcher<'a> {
    catalog: &'a Catalog,
    weights: &'a ScoringWeights,
}

impl<'a> CandidateMatcher<'a> {
    pub fn new(catalog: &'a Catalog, weights: &'a ScoringWeights) -> Self {
        Self { catalog, weights }
    }

    /// Rank the catalog for a query.
    pub fn rank(&self, drug: &str, ctx: &TokenContext) -> Ranking<'a> {
        if ctx.is_empty() {
            return self.fallback(drug);
        }

        let strict = self.evaluate(ctx, false);
        if !strict.is_empty() {
            return Ranking {
                pass: MatchPass::Strict,
                candidates: strict,
            };
        }

        let relaxed = self.evaluate(ctx, true);
        if !relaxed.is_empty() {
            debug!(drug, candidates = relaxed.len(), "strict pass empty, using relaxed pass");
            return Ranking {
                pass: MatchPass::Relaxed,
                candidates: relaxed,
            };
        }

        self.fallback(drug)
    }

    fn fallback(&self, drug: &str) -> Ranking<'a> {
        let candidates = self.simple_fallback(drug);
        debug!(drug, candidates = candidates.len(), "name fallback pass");
        Ranking {
            pass: MatchPass::Fallback,
            candidates,
        }
    }

    /// Score every product; `relaxed` turns rejections into penalties only.
    fn evaluate(&self, ctx: &TokenContext, relaxed: bool) -> Vec<ScoredCandidate<'a>> {
        let w = self.weights;
        let desired_form = ctx.dosage_form.as_deref();
        let desired_route = ctx.route.as_deref();
        let desired_ingredients: Vec<&str> = ctx.desired_ingredients().collect();

        let mut candidates = Vec::new();

        for (index, product) in self.catalog.products().iter().enumerate() {
            let form = product.dosage_form.as_deref().and_then(canonical_dosage_form);
            let routes: Vec<String> = product.routes.iter().filter_map(|r| canonical_route(r)).collect();

            let form_conflict = matches!((desired_form, form.as_deref()), (Some(d), Some(f)) if d != f);
            let route_conflict = desired_route
                .is_some_and(|d| !routes.is_empty() && !routes.iter().any(|r| r == d));

            if !relaxed && (form_conflict || route_conflict) {
                continue;
            }

            if !desired_ingredients.is_empty() && !has_ingredient_hit(product, &desired_ingredients) {
                continue;
            }

            let mut score = 0;

            score += w.token_match
                * ctx.tokens.iter().filter(|t| product.search_tokens.contains(*t)).count() as i32;

            if desired_form.is_some() && form.as_deref() == desired_form {
                score += w.form_match;
            } else if form_conflict {
                score -= w.form_mismatch_penalty;
            }

            if let Some(route) = desired_route {
                if routes.iter().any(|r| r == route) {
                    score += w.route_match;
                } else if !routes.is_empty() {
                    score -= w.route_mismatch_penalty;
                }
            }

            score += strength_score(product, ctx, w);

            if score > 0 {
                candidates.push(ScoredCandidate { index, product, score });
            }
        }

        sort_and_cap(&mut candidates, w.candidate_limit);
        candidates
    }

    /// Substring match of the raw drug name against product names.
    fn simple_fallback(&self, drug: &str) -> Vec<ScoredCandidate<'a>> {
        let needle = drug.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let Some(first_word) = needle.split(' ').next().filter(|w| !w.is_empty()) else {
            return Vec::new();
        };

        let mut candidates: Vec<ScoredCandidate<'a>> = self
            .catalog
            .products()
            .iter()
            .enumerate()
            .filter_map(|(index, product)| {
                let haystack = product.name_haystack();
                if !haystack.contains(first_word) {
                    return None;
                }
                let score = if haystack.contains(&needle) {
                    self.weights.fallback_full_match
                } else {
                    self.weights.fallback_partial_match
                };
                Some(ScoredCandidate { index, product, score })
            })
            .collect();

        sort_and_cap(&mut candidates, self.weights.candidate_limit);
        candidates
    }
}

fn has_ingredient_hit(product: &CatalogProduct, desired: &[&str]) -> bool {
    let names = product.ingredient_names();
    desired.iter().any(|token| {
        names.iter().any(|name| name.contains(token)) || product.search_tokens.contains(*token)
    })
}

/// Bonus for numeric/unit tokens found in strengths and package descriptions.
fn strength_score(product: &CatalogProduct, ctx: &TokenContext, w: &ScoringWeights) -> i32 {
    if ctx.numeric_tokens.is_empty() {
        return 0;
    }

    let mut score = 0;
    let strengths = product.ingredient_strengths();
    let unit_in = |text: &str| ctx.unit_tokens.iter().any(|unit| text.contains(unit.as_str()));
    let strength_has_unit = strengths.iter().any(|s| unit_in(s.as_str()));

    for numeric in &ctx.numeric_tokens {
        if strengths.iter().any(|s| s.contains(numeric.as_str())) {
            score += w.strength_match;
            if strength_has_unit {
                score += w.strength_unit_match;
            }
        }
    }

    for pkg in &product.packages {
        let Some(description) = pkg.description.as_deref().map(str::to_lowercase) else {
            continue;
        };
        if description.is_empty() {
            continue;
        }
        if ctx.numeric_tokens.iter().any(|n| description.contains(n.as_str())) {
            score += w.package_strength_match;
            if unit_in(description.as_str()) {
                score += w.package_unit_match;
            }
        }
    }

    score
}

/// Descending by score; stable so ties keep catalog order.
fn sort_and_cap(candidates: &mut Vec<ScoredCandidate<'_>>, limit: usize) {
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(limit);
}
