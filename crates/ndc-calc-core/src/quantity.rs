//! Package selection and quantity calculation.
//!
//! Ordering: active before inactive, then least overfill, then least
//! dispensed quantity. Ties keep input order.

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;

use crate::config::SelectionPolicy;
use crate::models::{CalcResult, PackageRecord, ParsedInstruction, SelectedPackage};

/// Hard cap on returned selections, whatever the policy asks for.
pub const MAX_SELECTIONS: usize = 5;

pub const NO_PACKAGES_WARNING: &str =
    "No NDC packages match this drug. Verify the drug name or enter an NDC directly.";

/// Quantity errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantityError {
    #[error("Calculated quantity must be greater than zero (got {0})")]
    InvalidQuantity(f64),
}

pub type QuantityResult<T> = Result<T, QuantityError>;

/// One band of the overage guidance table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverageGuidance {
    pub min: f64,
    pub max: f64,
    pub allowance_units: Option<f64>,
    pub allowance_percent: Option<f64>,
    pub notes: &'static str,
}

/// FDA 2011-style overfill allowances by total quantity.
pub static FDA_OVERAGE_GUIDANCE: [OverageGuidance; 4] = [
    OverageGuidance {
        min: 0.0,
        max: 30.0,
        allowance_units: Some(1.0),
        allowance_percent: None,
        notes: "<=30 units: +1 unit (~2-3%)",
    },
    OverageGuidance {
        min: 31.0,
        max: 100.0,
        allowance_units: Some(1.0),
        allowance_percent: None,
        notes: "31-100 units: +1 unit (~1%)",
    },
    OverageGuidance {
        min: 101.0,
        max: 500.0,
        allowance_units: Some(2.0),
        allowance_percent: None,
        notes: "101-500 units: +1-2 units (0.5-1%)",
    },
    OverageGuidance {
        min: 501.0,
        max: f64::INFINITY,
        allowance_units: None,
        allowance_percent: Some(0.5),
        notes: ">500 units: +0.25-0.5%",
    },
];

/// The guidance band containing `qty`, if any.
pub fn guidance_for_quantity(qty: f64) -> Option<&'static OverageGuidance> {
    FDA_OVERAGE_GUIDANCE
        .iter()
        .find(|g| qty >= g.min && qty <= g.max)
}

/// Fraction by which `dispensed` exceeds `total_needed`.
pub fn calculate_overfill(total_needed: f64, dispensed: f64) -> f64 {
    if total_needed <= 0.0 {
        return 0.0;
    }
    (dispensed - total_needed) / total_needed
}

/// Total units needed for a days supply, rounded to 2 decimals.
pub fn total_quantity(instruction: &ParsedInstruction, days: f64) -> QuantityResult<f64> {
    let total = round_to(instruction.daily_quantity() * days, 2);
    if !total.is_finite() || total <= 0.0 {
        return Err(QuantityError::InvalidQuantity(total));
    }
    Ok(total)
}

/// Pack arithmetic for one package.
///
/// `None` for zero-size packages and for pack counts that overflow `u32`.
pub fn fill_package(total_qty: f64, package: &PackageRecord) -> Option<SelectedPackage> {
    if !(package.size > 0.0) {
        return None;
    }
    let packs = (total_qty / package.size).ceil().max(1.0);
    if !packs.is_finite() || packs > f64::from(u32::MAX) {
        return None;
    }
    let packs = packs as u32;
    let dispensed_qty = f64::from(packs) * package.size;
    Some(SelectedPackage {
        package: package.clone(),
        packs,
        dispensed_qty,
        overfill_pct: calculate_overfill(total_qty, dispensed_qty),
    })
}

fn compare_selections(a: &SelectedPackage, b: &SelectedPackage) -> Ordering {
    a.package
        .inactive
        .cmp(&b.package.inactive)
        .then_with(|| {
            a.overfill_pct
                .partial_cmp(&b.overfill_pct)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| {
            a.dispensed_qty
                .partial_cmp(&b.dispensed_qty)
                .unwrap_or(Ordering::Equal)
        })
}

/// Select the best packages for an instruction and days supply.
pub fn select_packages(
    instruction: &ParsedInstruction,
    days: f64,
    packages: &[PackageRecord],
    policy: &SelectionPolicy,
) -> QuantityResult<CalcResult> {
    let total_qty = total_quantity(instruction, days)?;
    let mut warnings = Vec::new();

    let mut selections: Vec<SelectedPackage> = packages
        .iter()
        .filter_map(|pkg| fill_package(total_qty, pkg))
        .collect();
    selections.sort_by(compare_selections);

    let Some(primary) = selections.first() else {
        warnings.push(NO_PACKAGES_WARNING.to_string());
        return Ok(CalcResult {
            selections,
            total_qty,
            primary_dispensed_qty: 0.0,
            primary_overfill_pct: 0.0,
            warnings,
        });
    };

    if primary.package.inactive {
        warnings.push(format!(
            "Recommended NDC {} is inactive. Select an alternate active package.",
            primary.package.formatted_ndc
        ));
    }

    if policy.overfill_warnings {
        warnings.extend(overfill_warning(primary, total_qty, policy.overfill_tolerance));
    }

    let primary_dispensed_qty = primary.dispensed_qty;
    let primary_overfill_pct = round_to(primary.overfill_pct, 4);
    selections.truncate(policy.max_selections.clamp(1, MAX_SELECTIONS));

    Ok(CalcResult {
        selections,
        total_qty,
        primary_dispensed_qty,
        primary_overfill_pct,
        warnings,
    })
}

fn overfill_warning(primary: &SelectedPackage, total_qty: f64, tolerance: f64) -> Option<String> {
    let guidance = guidance_for_quantity(total_qty);
    if primary.overfill_pct > tolerance {
        Some(format!(
            "Overfill {:.2}% exceeds {:.0}% tolerance. FDA guidance ({}) recommends limiting excess fill. Consider alternative packaging or manual adjustment.",
            primary.overfill_pct * 100.0,
            tolerance * 100.0,
            guidance.map(|g| g.notes).unwrap_or("2011 allowance")
        ))
    } else {
        guidance.map(|g| format!("FDA 2011 overage guidance: {}", g.notes))
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalUnit, InstructionSource};
    use crate::ndc::Ndc;

    fn base_sig() -> ParsedInstruction {
        ParsedInstruction {
            dose: 1.0,
            unit: CanonicalUnit::Tablet,
            frequency_per_day: 1.0,
            prn: false,
            source: InstructionSource::Pattern,
        }
    }

    fn package(code: &str, size: f64, inactive: bool) -> PackageRecord {
        let ndc = Ndc::parse(code).unwrap();
        let mut pkg = PackageRecord::new(&ndc, size, CanonicalUnit::Tablet, "Bottle of tablets");
        pkg.inactive = inactive;
        pkg
    }

    #[test]
    fn test_overfill() {
        assert_eq!(calculate_overfill(30.0, 30.0), 0.0);
        assert!((calculate_overfill(30.0, 36.0) - 0.2).abs() < 1e-9);
        assert_eq!(calculate_overfill(0.0, 36.0), 0.0);
    }

    #[test]
    fn test_guidance_bands() {
        assert_eq!(guidance_for_quantity(25.0).unwrap().allowance_units, Some(1.0));
        assert_eq!(guidance_for_quantity(350.0).unwrap().allowance_units, Some(2.0));
        assert_eq!(guidance_for_quantity(600.0).unwrap().allowance_percent, Some(0.5));
        assert!(guidance_for_quantity(30.5).is_none());
    }

    #[test]
    fn test_prefers_active_package() {
        let active = package("01234-5678-90", 30.0, false);
        let inactive = package("12345-6789-01", 60.0, true);

        let result =
            select_packages(&base_sig(), 30.0, &[inactive, active.clone()], &SelectionPolicy::default())
                .unwrap();

        assert_eq!(result.total_qty, 30.0);
        assert_eq!(result.selections[0].package.ndc, active.ndc);
        assert_eq!(result.primary_overfill_pct, 0.0);
        assert_eq!(result.selections.len(), 2);
        assert!(result.warnings.is_empty());

        // With guidance enabled the exact fill still carries the overage note
        let policy = SelectionPolicy {
            overfill_warnings: true,
            ..Default::default()
        };
        let inactive = package("12345-6789-01", 60.0, true);
        let result = select_packages(&base_sig(), 30.0, &[active, inactive], &policy).unwrap();
        assert_eq!(result.selections[0].overfill_pct, 0.0);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_inactive_primary_warns() {
        let inactive = package("12345-6789-01", 30.0, true);
        let result =
            select_packages(&base_sig(), 30.0, &[inactive], &SelectionPolicy::default()).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("12345-6789-01 is inactive"));
    }

    #[test]
    fn test_overfill_warning_policy() {
        let large = package("23456-7890-12", 100.0, false);

        let quiet =
            select_packages(&base_sig(), 30.0, &[large.clone()], &SelectionPolicy::default()).unwrap();
        assert!((quiet.selections[0].overfill_pct - (100.0 - 30.0) / 30.0).abs() < 1e-9);
        assert!(quiet.warnings.is_empty());

        let policy = SelectionPolicy {
            overfill_warnings: true,
            ..Default::default()
        };
        let loud = select_packages(&base_sig(), 30.0, &[large], &policy).unwrap();
        assert!(loud.warnings.iter().any(|w| w.contains("Overfill")));
    }

    #[test]
    fn test_guidance_note_within_tolerance() {
        let policy = SelectionPolicy {
            overfill_warnings: true,
            ..Default::default()
        };
        let exact = package("01234-5678-90", 30.0, false);
        let result = select_packages(&base_sig(), 30.0, &[exact], &policy).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("FDA 2011 overage guidance"));
    }

    #[test]
    fn test_no_packages() {
        let result = select_packages(&base_sig(), 30.0, &[], &SelectionPolicy::default()).unwrap();
        assert!(result.selections.is_empty());
        assert_eq!(result.primary_dispensed_qty, 0.0);
        assert!(result.warnings[0].starts_with("No NDC packages"));

        let zero = package("01234-5678-90", 0.0, false);
        let result = select_packages(&base_sig(), 30.0, &[zero], &SelectionPolicy::default()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_pack_arithmetic_and_ordering() {
        let sig = ParsedInstruction {
            dose: 2.0,
            frequency_per_day: 2.0,
            ..base_sig()
        };
        // 2 * 2 * 30 = 120
        let packages = vec![
            package("00000-0000-01", 100.0, false),
            package("00000-0000-02", 60.0, false),
            package("00000-0000-03", 30.0, false),
            package("00000-0000-04", 500.0, false),
        ];
        let result = select_packages(&sig, 30.0, &packages, &SelectionPolicy::default()).unwrap();

        assert_eq!(result.total_qty, 120.0);
        // 60x2 and 30x4 both exact; 60 listed first
        assert_eq!(result.selections[0].package.formatted_ndc, "00000-0000-02");
        assert_eq!(result.selections[0].packs, 2);
        assert_eq!(result.selections[1].package.formatted_ndc, "00000-0000-03");
        assert_eq!(result.selections[1].packs, 4);
        assert_eq!(result.selections[2].dispensed_qty, 200.0);
        assert_eq!(result.selections[3].packs, 1);
    }

    #[test]
    fn test_selection_cap() {
        let packages: Vec<PackageRecord> = (1..=8)
            .map(|i| package(&format!("00000-0000-{:02}", i), 10.0 * i as f64, false))
            .collect();
        let result =
            select_packages(&base_sig(), 30.0, &packages, &SelectionPolicy::default()).unwrap();
        assert_eq!(result.selections.len(), 5);
    }

    #[test]
    fn test_policy_cannot_exceed_cap() {
        let packages: Vec<PackageRecord> = (1..=8)
            .map(|i| package(&format!("00000-0000-{:02}", i), 10.0 * i as f64, false))
            .collect();
        let wide = SelectionPolicy {
            max_selections: 50,
            ..Default::default()
        };
        let result = select_packages(&base_sig(), 30.0, &packages, &wide).unwrap();
        assert_eq!(result.selections.len(), MAX_SELECTIONS);

        let narrow = SelectionPolicy {
            max_selections: 0,
            ..Default::default()
        };
        let result = select_packages(&base_sig(), 30.0, &packages, &narrow).unwrap();
        assert_eq!(result.selections.len(), 1);
    }

    #[test]
    fn test_pack_count_overflow_skips_package() {
        let sig = ParsedInstruction {
            dose: 1000.0,
            frequency_per_day: 4.0,
            ..base_sig()
        };
        let tiny = package("00000-0000-01", 0.001, false);
        let bulk = package("00000-0000-02", 100_000.0, false);

        assert!(fill_package(4_800_000.0, &tiny).is_none());

        let result =
            select_packages(&sig, 1200.0, &[tiny, bulk], &SelectionPolicy::default()).unwrap();
        assert_eq!(result.total_qty, 4_800_000.0);
        assert_eq!(result.selections.len(), 1);
        let primary = result.primary().unwrap();
        assert_eq!(primary.package.formatted_ndc, "00000-0000-02");
        assert_eq!(primary.packs, 48);
        assert!(primary.dispensed_qty >= result.total_qty);
        assert!(primary.overfill_pct >= 0.0);
    }

    #[test]
    fn test_invalid_quantity() {
        let result = select_packages(&base_sig(), 0.0, &[], &SelectionPolicy::default());
        assert!(matches!(result, Err(QuantityError::InvalidQuantity(_))));

        let result = select_packages(&base_sig(), f64::NAN, &[], &SelectionPolicy::default());
        assert!(result.is_err());
    }
}
