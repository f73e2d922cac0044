//! Prescription → dispense quantity service.
//!
//! Lookup order:
//! 1. Drug text that looks like an NDC resolves through the catalog
//! 2. Caller-supplied packages (already fetched from a registry)
//! 3. Catalog suggestion from the free-text drug name
//!
//! Steady-state failures (no SIG parse, no match, unsupported packages)
//! come back as warnings. Only malformed input is an error.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::assist::{Assistance, MatchQuery, TextAssistant};
use crate::catalog::{convert_packages, Catalog, PackageConversion};
use crate::config::CalcConfig;
use crate::db::DbError;
use crate::models::{
    issue_warnings, CalcResult, InactivePackage, PackageIssue, PackageRecord, ParsedInstruction,
    UnparsedPackage,
};
use crate::ndc::{looks_like_ndc, Ndc, NdcError};
use crate::parser::parse_sig;
use crate::quantity::{select_packages, QuantityError};
use crate::resolver::{RankingCache, Resolver, SuggestionMethod};

pub const INVALID_REQUEST: &str = "Provide drug (or NDC), SIG, and days supply (>0).";

/// Calculation service errors.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    InvalidFormat(#[from] NdcError),

    #[error(transparent)]
    InvalidQuantity(#[from] QuantityError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// A prescription to calculate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalcRequest {
    /// Drug name or NDC
    pub drug: String,
    pub sig: String,
    pub days: f64,
    /// Packages already fetched by the caller
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
}

impl CalcRequest {
    pub fn new(drug: impl Into<String>, sig: impl Into<String>, days: f64) -> Self {
        Self {
            drug: drug.into(),
            sig: sig.into(),
            days,
            packages: Vec::new(),
        }
    }

    pub fn with_packages(mut self, packages: Vec<PackageRecord>) -> Self {
        self.packages = packages;
        self
    }
}

/// Where the dispensable packages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    Ndc,
    Supplied,
    Matched,
}

/// Catalog suggestion reported back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSummary {
    pub product_ndc: String,
    pub rationale: String,
    pub confidence: Option<f64>,
    pub method: SuggestionMethod,
    pub model: Option<String>,
}

/// Full calculation response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalcResponse {
    pub drug_name: String,
    pub lookup: LookupKind,
    pub parsed_sig: Option<ParsedInstruction>,
    /// `None` when the SIG could not be parsed
    pub calc: Option<CalcResult>,
    pub unparsed_packages: Vec<UnparsedPackage>,
    pub inactive_ndcs: Vec<InactivePackage>,
    pub suggestion: Option<SuggestionSummary>,
    /// Canonical dosage form used for matching
    pub dosage_form: Option<String>,
    /// Canonical route used for matching
    pub route: Option<String>,
    /// SIG, issue and selection warnings, in that order
    pub warnings: Vec<String>,
}

/// Calculation service over a loaded catalog.
pub struct Calculator<'a> {
    catalog: &'a Catalog,
    config: &'a CalcConfig,
    assistant: Option<&'a dyn TextAssistant>,
    cache: Option<&'a RankingCache>,
    today: NaiveDate,
}

impl<'a> Calculator<'a> {
    /// Create a pattern-only calculator dated today (UTC).
    pub fn new(catalog: &'a Catalog, config: &'a CalcConfig) -> Self {
        Self {
            catalog,
            config,
            assistant: None,
            cache: None,
            today: Utc::now().date_naive(),
        }
    }

    /// Consult a text-extraction collaborator when patterns fail.
    pub fn with_assistant(mut self, assistant: &'a dyn TextAssistant) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Memoize catalog rankings.
    pub fn with_cache(mut self, cache: &'a RankingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Date used to judge package inactivity.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn assistance(&self) -> Assistance<'a> {
        Assistance::from_option(self.assistant)
    }

    /// Run a calculation.
    pub fn calculate(&self, request: &CalcRequest) -> ServiceResult<CalcResponse> {
        let drug = request.drug.trim();
        let sig = request.sig.trim();
        let days = request.days;
        if drug.is_empty() || sig.is_empty() || !days.is_finite() || days <= 0.0 {
            return Err(ServiceError::InvalidInput(INVALID_REQUEST.to_string()));
        }

        let mut found = PackageConversion::default();
        let mut lookup = LookupKind::Supplied;
        let mut drug_name: Option<String> = None;

        if looks_like_ndc(drug) {
            let ndc = Ndc::parse(drug)?;
            lookup = LookupKind::Ndc;
            match self.catalog.product_for_code(ndc.as_str()) {
                Some(product) => {
                    found = convert_packages(product, self.today);
                    drug_name = product
                        .product_name()
                        .or_else(|| product.labeler_name.clone());
                }
                None => found.issues.push(PackageIssue::NoPackages),
            }
        } else if !request.packages.is_empty() {
            found.packages = request.packages.clone();
            drug_name = request
                .packages
                .iter()
                .find_map(|p| p.product_name.clone())
                .or_else(|| request.packages.first().and_then(|p| p.labeler_name.clone()));
        }

        let mut suggestion = None;
        let mut dosage_form = None;
        let mut route = None;

        if found.packages.is_empty() {
            info!(drug, sig, days, "no packages from lookup, invoking catalog suggestion");
            let query = MatchQuery::new(drug).with_sig(sig).with_days(days);
            let resolver = Resolver::new(self.catalog, &self.config.scoring);

            if let Some(suggested) = resolver.suggest(&query, self.assistance(), self.cache) {
                dosage_form = suggested.dosage_form.clone();
                route = suggested.route.clone();
                suggestion = Some(SuggestionSummary {
                    product_ndc: suggested.product.product_ndc.clone(),
                    rationale: suggested.rationale.clone(),
                    confidence: suggested.confidence,
                    method: suggested.method,
                    model: suggested.model.clone(),
                });

                let converted = convert_packages(suggested.product, self.today);
                if !converted.packages.is_empty() {
                    lookup = LookupKind::Matched;
                    drug_name = drug_name.or_else(|| Some(suggested.product.display_name().to_string()));
                    debug!(
                        product_ndc = %suggested.product.product_ndc,
                        packages = converted.packages.len(),
                        "suggestion produced packages"
                    );
                    found.extend(converted);
                }
            }
        }

        let drug_name = drug_name.unwrap_or_else(|| drug.to_string());
        let inactive_ndcs = inactive_packages(&found.issues);

        let sig_parse = parse_sig(sig, self.assistance());
        let mut warnings = sig_parse.warnings;

        let Some(parsed) = sig_parse.parsed else {
            return Ok(CalcResponse {
                drug_name,
                lookup,
                parsed_sig: None,
                calc: None,
                unparsed_packages: found.unparsed,
                inactive_ndcs,
                suggestion,
                dosage_form,
                route,
                warnings,
            });
        };

        let calc = select_packages(&parsed, days, &found.packages, &self.config.selection)?;

        warnings.extend(issue_warnings(
            &found.issues,
            self.config.selection.report_empty_lookups,
        ));
        warnings.extend(calc.warnings.iter().cloned());

        Ok(CalcResponse {
            drug_name,
            lookup,
            parsed_sig: Some(parsed),
            calc: Some(calc),
            unparsed_packages: found.unparsed,
            inactive_ndcs,
            suggestion,
            dosage_form,
            route,
            warnings,
        })
    }
}

fn inactive_packages(issues: &[PackageIssue]) -> Vec<InactivePackage> {
    issues
        .iter()
        .filter_map(|issue| match issue {
            PackageIssue::Inactive { ndc, end_date } => Some(InactivePackage {
                ndc: ndc.clone(),
                expiry: end_date.clone(),
            }),
            _ => None,
        })
        .collect()
}
