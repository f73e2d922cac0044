//! End-to-end calculation tests over a registry index document.

use chrono::NaiveDate;

use ndc_calc_core::assist::{
    CandidateSelection, CandidateSummary, MatchQuery, PrescriptionAttributes, SigExtraction,
    TextAssistant,
};
use ndc_calc_core::calculator::{CalcRequest, Calculator, LookupKind, ServiceError};
use ndc_calc_core::config::CalcConfig;
use ndc_calc_core::db::Database;
use ndc_calc_core::export::ResultExport;
use ndc_calc_core::parser::{ASSIST_FAILED_WARNING, UNPARSEABLE_WARNING};
use ndc_calc_core::resolver::{RankingCache, SuggestionMethod};
use ndc_calc_core::Catalog;

const INDEX: &str = r#"{
  "generatedAt": "2024-05-01T00:00:00Z",
  "items": [
    {
      "productNdc": "0093-7180",
      "labelerName": "Teva Pharmaceuticals USA, Inc.",
      "genericName": "Lisinopril",
      "dosageForm": "TABLET",
      "route": ["ORAL"],
      "activeIngredients": [{"name": "LISINOPRIL", "strength": "10 mg/1"}],
      "packages": [
        {"ndc": "0093-7180-56", "description": "30 TABLET in 1 BOTTLE (0093-7180-56)"},
        {"ndc": "0093-7180-01", "description": "90 TABLET in 1 BOTTLE (0093-7180-01)"},
        {"ndc": "0093-7180-10", "description": "1000 TABLET in 1 BOTTLE (0093-7180-10)", "marketingEndDate": "20220331"}
      ]
    },
    {
      "productNdc": "0093-7181",
      "genericName": "Lisinopril",
      "dosageForm": "TABLET",
      "route": ["ORAL"],
      "activeIngredients": [{"name": "LISINOPRIL", "strength": "20 mg/1"}],
      "packages": [
        {"ndc": "0093-7181-56", "description": "30 TABLET in 1 BOTTLE (0093-7181-56)"}
      ]
    },
    {
      "productNdc": "50242-040",
      "genericName": "Amoxicillin",
      "dosageForm": "CAPSULE",
      "route": ["ORAL"],
      "activeIngredients": [{"name": "AMOXICILLIN", "strength": "500 mg/1"}],
      "packages": [
        {"ndc": "50242-040-62", "description": "21 CAPSULE in 1 BOTTLE"},
        {"ndc": "50242-040-63", "description": "1 BLISTER PACK in 1 CARTON"}
      ]
    },
    {
      "productNdc": "50242-041",
      "genericName": "Amoxicillin",
      "dosageForm": "POWDER, FOR SUSPENSION",
      "route": ["ORAL"],
      "activeIngredients": [{"name": "AMOXICILLIN", "strength": "400 mg/5mL"}],
      "packages": [
        {"ndc": "50242-041-10", "description": "1 BOTTLE in 1 CARTON / 100 mL in 1 BOTTLE"}
      ]
    },
    {
      "productNdc": "80425-0266",
      "genericName": "Albuterol Sulfate",
      "brandName": "ProAir HFA",
      "dosageForm": "AEROSOL, METERED",
      "route": ["RESPIRATORY (INHALATION)"],
      "activeIngredients": [{"name": "ALBUTEROL SULFATE", "strength": "90 ug/1"}],
      "packages": [
        {"ndc": "80425-0266-1", "description": "1 CANISTER in 1 CARTON (80425-0266-1)  / 200 AEROSOL, METERED in 1 CANISTER"}
      ]
    },
    {
      "labelerName": "No code at all",
      "genericName": "Ghost"
    }
  ]
}"#;

fn catalog() -> Catalog {
    Catalog::from_index_json(INDEX).unwrap()
}

/// Route service logs to the test harness; set RUST_LOG to see them.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

/// Collaborator with fixed answers.
#[derive(Default)]
struct FixedAssistant {
    sig: Option<SigExtraction>,
    attributes: Option<PrescriptionAttributes>,
    pick: Option<String>,
}

impl TextAssistant for FixedAssistant {
    fn extract_sig(&self, _sig: &str) -> Option<SigExtraction> {
        self.sig.clone()
    }

    fn extract_prescription(&self, _query: &MatchQuery) -> Option<PrescriptionAttributes> {
        self.attributes.clone()
    }

    fn select_candidate(
        &self,
        _attributes: &PrescriptionAttributes,
        candidates: &[CandidateSummary],
    ) -> Option<CandidateSelection> {
        let pick = self.pick.clone()?;
        assert!(!candidates.is_empty());
        Some(CandidateSelection {
            product_ndc: Some(pick),
            confidence: Some(0.8),
            rationale: "fixed pick".to_string(),
            model: Some("fixed".to_string()),
        })
    }
}

#[test]
fn test_index_loads() {
    let catalog = catalog();
    assert_eq!(catalog.len(), 5);
    assert_eq!(catalog.generated_at(), Some("2024-05-01T00:00:00Z"));
    assert!(catalog.find_package("80425-266-01").is_some());
}

#[test]
fn test_lookup_by_ndc_reports_issues() {
    let catalog = catalog();
    let config = CalcConfig::default();
    let calculator = Calculator::new(&catalog, &config).with_today(today());

    let response = calculator
        .calculate(&CalcRequest::new("50242-040-62", "Take 1 capsule three times daily", 7.0))
        .unwrap();

    assert_eq!(response.lookup, LookupKind::Ndc);
    assert_eq!(response.drug_name, "Amoxicillin");
    let calc = response.calc.as_ref().unwrap();
    assert_eq!(calc.total_qty, 21.0);
    assert_eq!(calc.primary().unwrap().package.ndc, "50242004062");
    assert_eq!(response.unparsed_packages.len(), 1);
    assert_eq!(response.unparsed_packages[0].ndc, "50242-0040-63");
    assert!(response.warnings.iter().any(|w| w.contains("unsupported unit \"BLISTER\"")));
}

#[test]
fn test_inactive_packages_listed() {
    let catalog = catalog();
    let config = CalcConfig::default();
    let calculator = Calculator::new(&catalog, &config).with_today(today());

    let response = calculator
        .calculate(&CalcRequest::new("00093718001", "1 tab daily", 90.0))
        .unwrap();

    assert_eq!(response.inactive_ndcs.len(), 1);
    assert_eq!(response.inactive_ndcs[0].ndc, "00093-7180-10");
    assert_eq!(response.inactive_ndcs[0].expiry.as_deref(), Some("20220331"));
    assert!(response
        .warnings
        .iter()
        .any(|w| w.starts_with("00093-7180-10 (expired 20220331) is inactive.")));

    let calc = response.calc.unwrap();
    assert!(calc.selections.last().unwrap().package.inactive);
    assert!(!calc.primary().unwrap().package.inactive);
}

#[test]
fn test_strength_picks_product() {
    let catalog = catalog();
    let config = CalcConfig::default();
    let calculator = Calculator::new(&catalog, &config).with_today(today());

    let response = calculator
        .calculate(&CalcRequest::new("Lisinopril 20 mg tablets", "Take 1 tablet by mouth daily", 30.0))
        .unwrap();

    assert_eq!(response.lookup, LookupKind::Matched);
    let suggestion = response.suggestion.unwrap();
    assert_eq!(suggestion.product_ndc, "0093-7181");
    assert_eq!(suggestion.method, SuggestionMethod::Local);
    assert_eq!(response.dosage_form.as_deref(), Some("tablet"));
    assert_eq!(response.route.as_deref(), Some("oral"));
    assert_eq!(response.calc.unwrap().primary().unwrap().package.formatted_ndc, "00093-7181-56");
}

#[test]
fn test_form_separates_products() {
    let catalog = catalog();
    let config = CalcConfig::default();
    let calculator = Calculator::new(&catalog, &config).with_today(today());

    let capsule = calculator
        .calculate(&CalcRequest::new("amoxicillin 500 mg capsule", "1 cap tid", 10.0))
        .unwrap();
    assert_eq!(capsule.suggestion.unwrap().product_ndc, "50242-040");

    let suspension = calculator
        .calculate(&CalcRequest::new("amoxicillin suspension", "5 ml bid", 10.0))
        .unwrap();
    assert_eq!(suspension.suggestion.unwrap().product_ndc, "50242-041");
    let calc = suspension.calc.unwrap();
    assert_eq!(calc.total_qty, 100.0);
    assert_eq!(calc.primary().unwrap().packs, 1);
}

#[test]
fn test_collaborator_paths() {
    let catalog = catalog();
    let config = CalcConfig::default();
    let cache = RankingCache::new();
    let assistant = FixedAssistant {
        sig: Some(SigExtraction {
            dose: Some(1.0),
            unit: Some("tablets".into()),
            frequency_per_day: Some(1.0),
        }),
        pick: Some("0093-7181".into()),
        ..Default::default()
    };
    let calculator = Calculator::new(&catalog, &config)
        .with_today(today())
        .with_assistant(&assistant)
        .with_cache(&cache);

    let response = calculator
        .calculate(&CalcRequest::new("lisinopril", "one by mouth each morning", 30.0))
        .unwrap();

    let suggestion = response.suggestion.unwrap();
    assert_eq!(suggestion.product_ndc, "0093-7181");
    assert_eq!(suggestion.method, SuggestionMethod::Assisted);
    assert_eq!(suggestion.model.as_deref(), Some("fixed"));
    assert!(!response.warnings.iter().any(|w| w == UNPARSEABLE_WARNING));
    assert_eq!(response.calc.unwrap().total_qty, 30.0);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_failing_collaborator_degrades() {
    init_logging();
    let catalog = catalog();
    let config = CalcConfig::default();
    let silent = FixedAssistant::default();
    let calculator = Calculator::new(&catalog, &config)
        .with_today(today())
        .with_assistant(&silent);

    let response = calculator
        .calculate(&CalcRequest::new("albuterol", "as directed", 30.0))
        .unwrap();

    // Local attributes still find the product
    let suggestion = response.suggestion.unwrap();
    assert_eq!(suggestion.product_ndc, "80425-0266");
    assert_eq!(suggestion.method, SuggestionMethod::AssistedFallback);
    assert!(response.calc.is_none());
    assert_eq!(response.warnings, vec![ASSIST_FAILED_WARNING.to_string()]);
}

#[test]
fn test_invalid_quantity_is_an_error() {
    let catalog = catalog();
    let config = CalcConfig::default();
    let calculator = Calculator::new(&catalog, &config).with_today(today());

    // 0.001 * 1 * 1 rounds to zero
    let result = calculator.calculate(&CalcRequest::new("0093-7180-56", "0.001 ml daily", 1.0));
    assert!(matches!(result, Err(ServiceError::InvalidQuantity(_))));
}

#[test]
fn test_empty_lookup_warning_policy() {
    let catalog = Catalog::default();
    let mut config = CalcConfig::default();
    config.selection.report_empty_lookups = true;
    let calculator = Calculator::new(&catalog, &config).with_today(today());

    let response = calculator
        .calculate(&CalcRequest::new("0093-7180-56", "1 tab daily", 30.0))
        .unwrap();
    assert_eq!(response.lookup, LookupKind::Ndc);
    assert!(response
        .warnings
        .iter()
        .any(|w| w == "No package records were found for this NDC or drug."));
}

#[test]
fn test_store_backed_calculation_and_export() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    {
        let db = Database::open(&path).unwrap();
        db.upsert_products(catalog().products()).unwrap();
    }

    let db = Database::open(&path).unwrap();
    let catalog = db.load_catalog().unwrap();
    let config = CalcConfig::default();
    let calculator = Calculator::new(&catalog, &config).with_today(today());

    let request = CalcRequest::new("albuterol inhaler", "Inhale 2 puffs every 4 hours PRN", 10.0);
    let response = calculator.calculate(&request).unwrap();
    let export = ResultExport::from_response(&request, &response);

    assert_eq!(export.input.lookup_type, LookupKind::Matched);
    assert_eq!(export.drug_name, "Albuterol Sulfate");
    assert_eq!(export.total_quantity, 120.0);
    assert_eq!(export.dispensed_quantity, 200.0);
    assert_eq!(export.overfill_percent, 66.67);
    assert_eq!(export.ndcs[0].formatted, "80425-0266-01");
    assert_eq!(export.ndcs[0].unit, "puff");
    assert!(export.warnings.iter().any(|w| w.contains("PRN")));
}
