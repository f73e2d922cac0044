//! Catalog package → dispensable package conversion.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{CatalogProduct, PackageIssue, PackageRecord, UnparsedPackage};
use crate::ndc::Ndc;
use crate::parser::{first_unit_token, parse_package_size};

/// Packages of one product, split by parse outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageConversion {
    pub packages: Vec<PackageRecord>,
    pub unparsed: Vec<UnparsedPackage>,
    pub issues: Vec<PackageIssue>,
}

impl PackageConversion {
    /// Append another conversion's output.
    pub fn extend(&mut self, other: PackageConversion) {
        self.packages.extend(other.packages);
        self.unparsed.extend(other.unparsed);
        self.issues.extend(other.issues);
    }
}

/// Parse a registry date (`YYYY-MM-DD` or `YYYYMMDD`).
pub fn parse_registry_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()
}

fn ended_before(end_date: Option<&str>, today: NaiveDate) -> bool {
    end_date
        .and_then(parse_registry_date)
        .is_some_and(|date| date < today)
}

/// A package is inactive when it or its product stopped marketing before `today`.
pub fn is_inactive(product_end: Option<&str>, package_end: Option<&str>, today: NaiveDate) -> bool {
    ended_before(product_end, today) || ended_before(package_end, today)
}

/// Convert a product's registry packages into dispensable packages.
///
/// Codes that do not normalize are skipped. Duplicate codes keep the
/// first occurrence.
pub fn convert_packages(product: &CatalogProduct, today: NaiveDate) -> PackageConversion {
    let mut conversion = PackageConversion::default();
    let mut seen = HashSet::new();

    if product.packages.is_empty() {
        conversion.issues.push(PackageIssue::NoPackages);
        return conversion;
    }

    for pkg in &product.packages {
        let Ok(ndc) = Ndc::parse(&pkg.ndc) else {
            continue;
        };
        if !seen.insert(ndc.clone()) {
            continue;
        }

        let formatted = ndc.formatted();
        let description = pkg.description.clone().unwrap_or_default();

        let Some(size) = parse_package_size(pkg.description.as_deref(), pkg.count) else {
            conversion.issues.push(PackageIssue::UnsupportedUnit {
                ndc: formatted.clone(),
                description: description.clone(),
                unit: first_unit_token(&description),
            });
            conversion.unparsed.push(UnparsedPackage {
                ndc: formatted,
                description,
                labeler_name: product.labeler_name.clone(),
                product_name: product.product_name(),
            });
            continue;
        };

        let inactive = is_inactive(
            product.marketing_end_date.as_deref(),
            pkg.marketing_end_date.as_deref(),
            today,
        );
        let end_date = pkg
            .marketing_end_date
            .clone()
            .or_else(|| product.marketing_end_date.clone());
        if inactive {
            conversion.issues.push(PackageIssue::Inactive {
                ndc: formatted.clone(),
                end_date: end_date.clone(),
            });
        }

        conversion.packages.push(PackageRecord {
            ndc: ndc.as_str().to_string(),
            formatted_ndc: formatted,
            size: size.size,
            unit: size.unit,
            inactive,
            description,
            labeler_name: product.labeler_name.clone(),
            product_name: product.product_name(),
            marketing_end_date: end_date,
        });
    }

    debug!(
        product_ndc = %product.product_ndc,
        total = product.packages.len(),
        parsed = conversion.packages.len(),
        unsupported = conversion.unparsed.len(),
        "converted catalog packages"
    );

    conversion
}
