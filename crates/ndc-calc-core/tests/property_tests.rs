//! Property-based tests for NDC handling and quantity selection.

use proptest::prelude::*;

use ndc_calc_core::config::SelectionPolicy;
use ndc_calc_core::models::{CanonicalUnit, InstructionSource, PackageRecord, ParsedInstruction};
use ndc_calc_core::ndc::{format_ndc11, normalize_ndc, Ndc};
use ndc_calc_core::quantity::select_packages;

/// A 10-digit NDC in one of the three published layouts, with its canonical form.
fn published_ndc() -> impl Strategy<Value = (String, String)> {
    prop_oneof![
        ("[0-9]{4}", "[0-9]{4}", "[0-9]{2}")
            .prop_map(|(l, p, k)| (format!("{}-{}-{}", l, p, k), format!("0{}{}{}", l, p, k))),
        ("[0-9]{5}", "[0-9]{3}", "[0-9]{2}")
            .prop_map(|(l, p, k)| (format!("{}-{}-{}", l, p, k), format!("{}0{}{}", l, p, k))),
        ("[0-9]{5}", "[0-9]{4}", "[0-9]{1}")
            .prop_map(|(l, p, k)| (format!("{}-{}-{}", l, p, k), format!("{}{}0{}", l, p, k))),
    ]
}

proptest! {
    /// Formatting a normalized code always yields the 5-4-2 display form
    #[test]
    fn format_after_normalize_is_5_4_2((published, canonical) in published_ndc()) {
        let normalized = normalize_ndc(&published).unwrap();
        prop_assert_eq!(&normalized, &canonical);

        let formatted = format_ndc11(&normalized).unwrap();
        let segments: Vec<usize> = formatted.split('-').map(str::len).collect();
        prop_assert_eq!(segments, vec![5, 4, 2]);
        prop_assert_eq!(formatted.replace('-', ""), canonical);
    }

    /// Normalization is idempotent on canonical codes
    #[test]
    fn normalize_is_idempotent(code in "[0-9]{11}") {
        let once = normalize_ndc(&code).unwrap();
        prop_assert_eq!(&once, &code);
        prop_assert_eq!(normalize_ndc(&once).unwrap(), once);
    }

    /// Display form round-trips through normalization
    #[test]
    fn formatted_round_trips(code in "[0-9]{11}") {
        let formatted = format_ndc11(&code).unwrap();
        prop_assert_eq!(normalize_ndc(&formatted).unwrap(), code);
    }

    /// Any digit count other than 10 or 11 is rejected
    #[test]
    fn wrong_lengths_rejected(code in "[0-9]{1,9}|[0-9]{12,16}") {
        prop_assert!(normalize_ndc(&code).is_err());
    }

    /// Valid instructions always select packages that cover the need
    #[test]
    fn selections_cover_need(
        dose in 0.25..10.0f64,
        frequency in prop_oneof![Just(0.5), Just(1.0), Just(2.0), Just(3.0), Just(4.0), Just(6.0)],
        days in 1u32..120,
        sizes in proptest::collection::vec(1u32..1000, 1..8),
    ) {
        let instruction = ParsedInstruction {
            dose,
            unit: CanonicalUnit::Tablet,
            frequency_per_day: frequency,
            prn: false,
            source: InstructionSource::Pattern,
        };
        let packages: Vec<PackageRecord> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let ndc = Ndc::parse(&format!("00093-7180-{:02}", i)).unwrap();
                PackageRecord::new(&ndc, f64::from(*size), CanonicalUnit::Tablet, "")
            })
            .collect();

        let result = select_packages(&instruction, f64::from(days), &packages, &SelectionPolicy::default()).unwrap();

        prop_assert!(result.total_qty > 0.0);
        prop_assert!(!result.selections.is_empty());
        prop_assert!(result.selections.len() <= 5);
        for selection in &result.selections {
            prop_assert!(selection.packs >= 1);
            prop_assert!(selection.dispensed_qty >= result.total_qty);
            prop_assert!(selection.overfill_pct >= 0.0);
        }
        for pair in result.selections.windows(2) {
            prop_assert!(pair[0].overfill_pct <= pair[1].overfill_pct);
        }
    }
}
