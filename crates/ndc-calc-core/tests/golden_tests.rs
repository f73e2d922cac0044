//! Golden tests for normalization, parsing and selection.
//!
//! These tests pin the documented behavior against known cases.

use ndc_calc_core::assist::Assistance;
use ndc_calc_core::config::SelectionPolicy;
use ndc_calc_core::models::{CanonicalUnit, InstructionSource, PackageRecord, ParsedInstruction};
use ndc_calc_core::ndc::{format_ndc11, looks_like_ndc, normalize_ndc, Ndc, NdcError};
use ndc_calc_core::parser::{parse_package_description, parse_sig, PRN_WARNING};
use ndc_calc_core::quantity::{calculate_overfill, select_packages, NO_PACKAGES_WARNING};

/// Normalization case.
struct NdcCase {
    id: &'static str,
    input: &'static str,
    expected: &'static str,
}

fn get_ndc_cases() -> Vec<NdcCase> {
    vec![
        NdcCase {
            id: "4-4-2",
            input: "1234-5678-90",
            expected: "01234567890",
        },
        NdcCase {
            id: "5-3-2",
            input: "50242-040-62",
            expected: "50242004062",
        },
        NdcCase {
            id: "5-4-1",
            input: "12345-6789-1",
            expected: "12345678901",
        },
        NdcCase {
            id: "eleven-plain",
            input: "00093718056",
            expected: "00093718056",
        },
        NdcCase {
            id: "eleven-hyphenated",
            input: "00093-7180-56",
            expected: "00093718056",
        },
        NdcCase {
            id: "ten-undelimited",
            input: "0093718056",
            expected: "00093718056",
        },
        NdcCase {
            id: "padded-whitespace",
            input: "  0093-7180-56 ",
            expected: "00093718056",
        },
    ]
}

#[test]
fn test_ndc_golden_cases() {
    for case in get_ndc_cases() {
        let normalized = normalize_ndc(case.input)
            .unwrap_or_else(|e| panic!("Case {}: unexpected error {}", case.id, e));
        assert_eq!(normalized, case.expected, "Case {}: normalize mismatch", case.id);
    }
}

#[test]
fn test_ndc_rejections() {
    assert_eq!(normalize_ndc("abc"), Err(NdcError::NoDigits));
    assert!(matches!(normalize_ndc("12345"), Err(NdcError::InvalidLength(5))));
    assert!(matches!(normalize_ndc("123-4567-8"), Err(NdcError::InvalidLength(8))));
    // Unrecognized delimiting falls back to a 4-4-2 split
    assert_eq!(normalize_ndc("12345-67-890").unwrap(), "01234567890");
}

#[test]
fn test_format_golden_cases() {
    assert_eq!(format_ndc11("01234567890").unwrap(), "01234-5678-90");
    assert!(format_ndc11("123").is_err());
    assert_eq!(
        format_ndc11(&normalize_ndc("50242-040-62").unwrap()).unwrap(),
        "50242-0040-62"
    );
}

#[test]
fn test_looks_like_ndc_cases() {
    let cases = vec![
        ("0093-7180-56", true),
        ("00093718056", true),
        ("50242 040 62", true),
        ("lisinopril", false),
        ("10 mg", false),
        ("123-456-789-0123", false),
    ];

    for (input, expected) in cases {
        assert_eq!(looks_like_ndc(input), expected, "looks_like_ndc({:?})", input);
    }
}

#[test]
fn test_overfill_cases() {
    assert_eq!(calculate_overfill(30.0, 30.0), 0.0);
    assert!((calculate_overfill(30.0, 36.0) - 0.2).abs() < 1e-9);
    assert_eq!(calculate_overfill(0.0, 36.0), 0.0);
}

#[test]
fn test_description_golden_cases() {
    let cases = vec![
        (
            "1 CANISTER in 1 CARTON (80425-0266-1)  / 200 AEROSOL, METERED in 1 CANISTER",
            Some((200.0, CanonicalUnit::Puff)),
        ),
        ("1 INHALER (200 ACTUATIONS)", Some((1.0, CanonicalUnit::Inhaler))),
        ("30 TABLET in 1 BOTTLE (0093-7180-56)", Some((30.0, CanonicalUnit::Tablet))),
        ("100 CAPSULE in 1 BOTTLE", Some((100.0, CanonicalUnit::Capsule))),
        ("1 BOTTLE in 1 CARTON / 150 mL in 1 BOTTLE", Some((150.0, CanonicalUnit::Ml))),
        ("10 VIAL in 1 CARTON / 1 mL in 1 VIAL", Some((10.0, CanonicalUnit::Vial))),
        ("1 KIT", Some((1.0, CanonicalUnit::Kit))),
        ("1 POUCH in 1 CARTON", None),
    ];

    for (description, expected) in cases {
        let parsed = parse_package_description(description).map(|p| (p.size, p.unit));
        assert_eq!(parsed, expected, "description {:?}", description);
    }
}

#[test]
fn test_sig_twice_daily() {
    let result = parse_sig("Take 1 tablet twice daily", Assistance::PatternOnly);
    let parsed = result.parsed.unwrap();

    assert_eq!(parsed.dose, 1.0);
    assert_eq!(parsed.unit, CanonicalUnit::Tablet);
    assert_eq!(parsed.frequency_per_day, 2.0);
    assert!(!parsed.prn);
    assert_eq!(parsed.source, InstructionSource::Pattern);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_sig_prn_interval() {
    let result = parse_sig("Take 1 capsule every 6 hours as needed (PRN)", Assistance::PatternOnly);
    let parsed = result.parsed.unwrap();

    assert_eq!(parsed.unit, CanonicalUnit::Capsule);
    assert!((parsed.frequency_per_day - 4.0).abs() < 1e-9);
    assert!(parsed.prn);
    assert!(result.warnings.iter().any(|w| w.contains("PRN")));
    assert_eq!(result.warnings, vec![PRN_WARNING.to_string()]);
}

#[test]
fn test_sig_unparseable_without_assistance() {
    let result = parse_sig("Use as directed", Assistance::PatternOnly);
    assert!(result.parsed.is_none());
    assert!(!result.warnings.is_empty());
}

#[test]
fn test_sig_frequency_table() {
    let cases = vec![
        ("1 tab bid", 2.0),
        ("1 tab tid", 3.0),
        ("1 tab qid", 4.0),
        ("1 tab every other day", 0.5),
        ("1 tab qd", 1.0),
        ("2 puffs q4h", 6.0),
        ("1 tab every 8 hours", 3.0),
        ("1 cap 3 times per day", 3.0),
    ];

    for (sig, expected) in cases {
        let parsed = parse_sig(sig, Assistance::PatternOnly)
            .parsed
            .unwrap_or_else(|| panic!("SIG {:?} should parse", sig));
        assert!(
            (parsed.frequency_per_day - expected).abs() < 1e-9,
            "SIG {:?}: expected {}, got {}",
            sig,
            expected,
            parsed.frequency_per_day
        );
    }
}

fn once_daily() -> ParsedInstruction {
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
    let mut pkg = PackageRecord::new(&ndc, size, CanonicalUnit::Tablet, format!("{} TABLET in 1 BOTTLE", size));
    pkg.inactive = inactive;
    pkg
}

#[test]
fn test_selection_prefers_active() {
    let policy = SelectionPolicy {
        overfill_warnings: true,
        ..Default::default()
    };
    let packages = vec![
        package("00093-7180-60", 60.0, true),
        package("00093-7180-30", 30.0, false),
    ];

    let result = select_packages(&once_daily(), 30.0, &packages, &policy).unwrap();
    let primary = result.primary().unwrap();

    assert_eq!(primary.package.formatted_ndc, "00093-7180-30");
    assert!(!primary.package.inactive);
    assert_eq!(result.primary_overfill_pct, 0.0);
    assert!(!result.warnings.is_empty());
    // Inactive package sorts last
    assert!(result.selections[1].package.inactive);
}

#[test]
fn test_selection_overfill_warning() {
    let policy = SelectionPolicy {
        overfill_warnings: true,
        ..Default::default()
    };
    let packages = vec![package("00093-7180-99", 100.0, false)];

    let result = select_packages(&once_daily(), 30.0, &packages, &policy).unwrap();
    assert!((result.primary_overfill_pct - 70.0 / 30.0).abs() < 1e-3);
    assert!(result.warnings.iter().any(|w| w.contains("Overfill")));

    // Off by default
    let quiet = select_packages(&once_daily(), 30.0, &packages, &SelectionPolicy::default()).unwrap();
    assert!(quiet.warnings.is_empty());
}

#[test]
fn test_selection_without_packages() {
    let result = select_packages(&once_daily(), 30.0, &[], &SelectionPolicy::default()).unwrap();
    assert!(result.selections.is_empty());
    assert_eq!(result.warnings, vec![NO_PACKAGES_WARNING.to_string()]);
}

#[test]
fn test_selection_caps_at_five() {
    let packages: Vec<PackageRecord> = (1..=8)
        .map(|i| package(&format!("00093-7180-{:02}", i), 10.0 * i as f64, false))
        .collect();

    let result = select_packages(&once_daily(), 30.0, &packages, &SelectionPolicy::default()).unwrap();
    assert_eq!(result.selections.len(), 5);
    // 3x10 and 1x30 both fill exactly
    assert_eq!(result.primary().unwrap().dispensed_qty, 30.0);
}
