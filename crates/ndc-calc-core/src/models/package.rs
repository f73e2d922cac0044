//! Dispensable package models.

use serde::{Deserialize, Serialize};

use super::CanonicalUnit;
use crate::ndc::Ndc;

/// A single dispensable package of a drug product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    /// Canonical 11-digit NDC
    pub ndc: String,
    /// 5-4-2 display form
    pub formatted_ndc: String,
    /// Number of units in one package
    pub size: f64,
    /// Unit the size is expressed in
    pub unit: CanonicalUnit,
    /// Marketing has ended for this package or its product
    pub inactive: bool,
    /// Raw package description from the registry
    pub description: String,
    pub labeler_name: Option<String>,
    pub product_name: Option<String>,
    pub marketing_end_date: Option<String>,
}

impl PackageRecord {
    /// Create an active package record with required fields.
    pub fn new(ndc: &Ndc, size: f64, unit: CanonicalUnit, description: impl Into<String>) -> Self {
        Self {
            ndc: ndc.as_str().to_string(),
            formatted_ndc: ndc.formatted(),
            size,
            unit,
            inactive: false,
            description: description.into(),
            labeler_name: None,
            product_name: None,
            marketing_end_date: None,
        }
    }
}

/// A package chosen to fill a prescription, with pack arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPackage {
    #[serde(flatten)]
    pub package: PackageRecord,
    /// Whole packages needed (always >= 1)
    pub packs: u32,
    /// packs * size
    pub dispensed_qty: f64,
    /// (dispensed - needed) / needed
    pub overfill_pct: f64,
}

/// A package whose description could not be turned into a size and unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnparsedPackage {
    pub ndc: String,
    pub description: String,
    pub labeler_name: Option<String>,
    pub product_name: Option<String>,
}

/// Inactive package reference surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InactivePackage {
    pub ndc: String,
    pub expiry: Option<String>,
}

/// Problems found while turning catalog entries into packages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackageIssue {
    /// Marketing ended before today
    Inactive {
        ndc: String,
        end_date: Option<String>,
    },
    /// Description did not resolve to a canonical unit
    UnsupportedUnit {
        ndc: String,
        description: String,
        unit: Option<String>,
    },
    /// The lookup produced no package records at all
    NoPackages,
}

impl PackageIssue {
    /// Sort key when rendering issues into warnings.
    pub fn priority(&self) -> u8 {
        match self {
            PackageIssue::Inactive { .. } => 0,
            PackageIssue::UnsupportedUnit { .. } => 1,
            PackageIssue::NoPackages => 2,
        }
    }

    /// Human-readable warning for this issue.
    ///
    /// `NoPackages` only renders when `report_empty` is set.
    pub fn message(&self, report_empty: bool) -> Option<String> {
        match self {
            PackageIssue::Inactive { ndc, end_date } => {
                let expiry = end_date
                    .as_ref()
                    .map(|d| format!(" (expired {})", d))
                    .unwrap_or_default();
                Some(format!(
                    "{}{} is inactive. Select an active package before dispensing.",
                    ndc, expiry
                ))
            }
            PackageIssue::UnsupportedUnit { ndc, unit, .. } => Some(format!(
                "Package {} uses unsupported unit \"{}\". Try searching by drug name or selecting a different NDC.",
                ndc,
                unit.as_deref().unwrap_or("unknown unit")
            )),
            PackageIssue::NoPackages if report_empty => {
                Some("No package records were found for this NDC or drug.".to_string())
            }
            PackageIssue::NoPackages => None,
        }
    }
}

/// Render issues as warnings, highest priority first.
pub fn issue_warnings(issues: &[PackageIssue], report_empty: bool) -> Vec<String> {
    let mut sorted: Vec<&PackageIssue> = issues.iter().collect();
    sorted.sort_by_key(|issue| issue.priority());
    sorted
        .into_iter()
        .filter_map(|issue| issue.message(report_empty))
        .collect()
}
