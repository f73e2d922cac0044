//! Memoized rankings for repeated identical queries.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::assist::PrescriptionAttributes;
use crate::catalog::Catalog;

use super::matcher::{MatchPass, Ranking, ScoredCandidate};
use super::tokens::TokenContext;
use super::QueryAnalysis;

#[derive(Debug, Clone)]
struct CachedRanking {
    attributes: PrescriptionAttributes,
    context: TokenContext,
    pass: MatchPass,
    /// (catalog position, score)
    entries: Vec<(usize, i32)>,
}

/// Unbounded ranking cache, keyed by catalog generation and normalized
/// query text.
///
/// Entries refer to catalog positions; the generation in the key keeps a
/// ranking from being replayed against a different catalog.
#[derive(Debug, Default)]
pub struct RankingCache {
    entries: Mutex<HashMap<String, CachedRanking>>,
}

impl RankingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key: catalog generation, mode, then lowercased,
    /// whitespace-collapsed drug and SIG.
    pub fn key(generation: u64, drug: &str, sig: Option<&str>, assisted: bool) -> String {
        let collapse = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        format!(
            "{}|{}|{}|{}",
            generation,
            if assisted { "assisted" } else { "pattern" },
            collapse(drug),
            collapse(sig.unwrap_or(""))
        )
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedRanking>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get<'a>(&self, key: &str, catalog: &'a Catalog) -> Option<QueryAnalysis<'a>> {
        let cached = self.lock().get(key).cloned()?;
        let products = catalog.products();
        let candidates = cached
            .entries
            .into_iter()
            .map(|(index, score)| {
                products.get(index).map(|product| ScoredCandidate { index, product, score })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(QueryAnalysis {
            attributes: cached.attributes,
            context: cached.context,
            ranking: Ranking {
                pass: cached.pass,
                candidates,
            },
        })
    }

    pub fn insert(&self, key: String, analysis: &QueryAnalysis<'_>) {
        let cached = CachedRanking {
            attributes: analysis.attributes.clone(),
            context: analysis.context.clone(),
            pass: analysis.ranking.pass,
            entries: analysis
                .ranking
                .candidates
                .iter()
                .map(|c| (c.index, c.score))
                .collect(),
        };
        self.lock().insert(key, cached);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
