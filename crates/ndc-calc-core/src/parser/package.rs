//! Package description parsing.
//!
//! Registry descriptions look like
//! `"1 CANISTER in 1 CARTON (80425-0266-1) / 200 AEROSOL, METERED in 1 CANISTER"`.
//! The first `<number><unit>` pair whose unit is known wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::CanonicalUnit;

static QUANTITY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*([A-Za-z\[\]\-]+)").expect("Quantity token pattern should be valid")
});

/// Size and unit of one package.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackageSize {
    pub size: f64,
    pub unit: CanonicalUnit,
}

/// Parse the first recognizable size/unit pair from a description.
pub fn parse_package_description(description: &str) -> Option<PackageSize> {
    QUANTITY_TOKEN.captures_iter(description).find_map(|caps| {
        let size: f64 = caps[1].parse().ok()?;
        let unit = CanonicalUnit::from_package_token(&caps[2])?;
        Some(PackageSize { size, unit })
    })
}

/// Parse a description, falling back to an explicit package count.
///
/// The count is reported in the generic `unit` unit.
pub fn parse_package_size(description: Option<&str>, count: Option<f64>) -> Option<PackageSize> {
    description
        .and_then(parse_package_description)
        .or_else(|| {
            count
                .filter(|c| c.is_finite() && *c > 0.0)
                .map(|size| PackageSize {
                    size,
                    unit: CanonicalUnit::Unit,
                })
        })
}

/// The first raw unit token in a description, for unsupported-unit reports.
pub fn first_unit_token(description: &str) -> Option<String> {
    QUANTITY_TOKEN
        .captures(description)
        .map(|caps| caps[2].to_string())
}
