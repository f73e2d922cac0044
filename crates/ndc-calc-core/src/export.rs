//! Calculation result export.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calculator::{CalcRequest, CalcResponse, LookupKind, SuggestionSummary};
use crate::models::{InactivePackage, UnparsedPackage};

/// Exported calculation document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultExport {
    pub export_id: String,
    pub input: ExportInput,
    pub drug_name: String,
    /// Total quantity needed, 0 when no calculation ran
    pub total_quantity: f64,
    /// Quantity dispensed by the primary selection
    pub dispensed_quantity: f64,
    /// Primary overfill as a percentage, 2 decimals
    pub overfill_percent: f64,
    pub ndcs: Vec<ExportSelection>,
    pub unparsed_packages: Vec<UnparsedPackage>,
    pub inactive_ndcs: Vec<InactivePackage>,
    pub suggestion: Option<SuggestionSummary>,
    pub warnings: Vec<String>,
    /// RFC 3339
    pub generated_at: String,
}

/// Echo of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportInput {
    pub drug: String,
    pub sig: String,
    pub days: f64,
    pub lookup_type: LookupKind,
}

/// One exported package selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSelection {
    pub ndc11: String,
    pub formatted: String,
    pub package_size: f64,
    pub unit: String,
    pub packs: u32,
    pub dispensed_qty: f64,
    pub inactive: bool,
}

impl ResultExport {
    /// Build an export from a request and its response.
    pub fn from_response(request: &CalcRequest, response: &CalcResponse) -> Self {
        let calc = response.calc.as_ref();

        let ndcs = calc
            .map(|c| {
                c.selections
                    .iter()
                    .map(|sel| ExportSelection {
                        ndc11: sel.package.ndc.clone(),
                        formatted: sel.package.formatted_ndc.clone(),
                        package_size: sel.package.size,
                        unit: sel.package.unit.to_string(),
                        packs: sel.packs,
                        dispensed_qty: sel.dispensed_qty,
                        inactive: sel.package.inactive,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            export_id: Uuid::new_v4().to_string(),
            input: ExportInput {
                drug: request.drug.clone(),
                sig: request.sig.clone(),
                days: request.days,
                lookup_type: response.lookup,
            },
            drug_name: response.drug_name.clone(),
            total_quantity: calc.map(|c| c.total_qty).unwrap_or(0.0),
            dispensed_quantity: calc.map(|c| c.primary_dispensed_qty).unwrap_or(0.0),
            overfill_percent: calc
                .map(|c| (c.primary_overfill_pct * 100.0 * 100.0).round() / 100.0)
                .unwrap_or(0.0),
            ndcs,
            unparsed_packages: response.unparsed_packages.clone(),
            inactive_ndcs: response.inactive_ndcs.clone(),
            suggestion: response.suggestion.clone(),
            warnings: response.warnings.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export selections to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("export_id,drug_name,ndc11,formatted,package_size,unit,packs,dispensed_qty,inactive\n");

        for sel in &self.ndcs {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                escape_csv(&self.export_id),
                escape_csv(&self.drug_name),
                sel.ndc11,
                sel.formatted,
                sel.package_size,
                sel.unit,
                sel.packs,
                sel.dispensed_qty,
                sel.inactive,
            ));
        }

        csv
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
