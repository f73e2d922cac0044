//! Structured output parsing for model responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use ndc_calc_core::assist::{CandidateSelection, PrescriptionAttributes, SigExtraction};

/// Extraction errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Completion backend error: {0}")]
    Backend(String),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Locate the JSON object inside a response that may carry extra prose.
pub fn extract_json_object(response: &str) -> ExtractionResult<&str> {
    let start = response.find('{').ok_or_else(|| {
        ExtractionError::InvalidFormat("No JSON object found in response".into())
    })?;
    let end = response.rfind('}').ok_or_else(|| {
        ExtractionError::InvalidFormat("No closing brace found in response".into())
    })?;
    if end < start {
        return Err(ExtractionError::InvalidFormat(
            "Closing brace precedes opening brace".into(),
        ));
    }
    Ok(&response[start..=end])
}

/// Raw SIG payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigResponse {
    #[serde(default)]
    pub dose: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, alias = "frequency_per_day")]
    pub frequency_per_day: Option<Value>,
}

/// Raw prescription-attribute payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrescriptionResponse {
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub strength_tokens: Option<Value>,
    #[serde(default)]
    pub dosage_form: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub additional_keywords: Option<Value>,
}

/// Raw candidate-selection payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionResponse {
    #[serde(default)]
    pub product_ndc: Option<String>,
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Parse a SIG response. Numbers must be JSON numbers.
pub fn parse_sig_response(response: &str) -> ExtractionResult<SigExtraction> {
    let raw: SigResponse = serde_json::from_str(extract_json_object(response)?)?;
    Ok(SigExtraction {
        dose: raw.dose.as_ref().and_then(Value::as_f64),
        unit: raw.unit.and_then(non_empty),
        frequency_per_day: raw.frequency_per_day.as_ref().and_then(Value::as_f64),
    })
}

/// Parse a prescription-attribute response.
///
/// Non-array token fields become empty lists and token values are
/// stringified, so a sloppy payload still yields usable attributes.
pub fn parse_prescription_response(response: &str) -> ExtractionResult<PrescriptionAttributes> {
    let raw: PrescriptionResponse = serde_json::from_str(extract_json_object(response)?)?;
    Ok(PrescriptionAttributes {
        generic_name: raw.generic_name.and_then(non_empty),
        brand_name: raw.brand_name.and_then(non_empty),
        strength_tokens: string_list(raw.strength_tokens),
        dosage_form: raw.dosage_form.and_then(non_empty),
        route: raw.route.and_then(non_empty),
        additional_keywords: string_list(raw.additional_keywords),
    })
}

/// Parse a candidate-selection response. The model name is left unset.
pub fn parse_selection_response(response: &str) -> ExtractionResult<CandidateSelection> {
    let raw: SelectionResponse = serde_json::from_str(extract_json_object(response)?)?;
    Ok(CandidateSelection {
        product_ndc: raw.product_ndc.and_then(non_empty),
        confidence: raw.confidence.as_ref().and_then(Value::as_f64),
        rationale: raw.rationale.unwrap_or_default(),
        model: None,
    })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => non_empty(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}
