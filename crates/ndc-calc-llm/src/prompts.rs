//! Prompts for prescription text extraction.
//!
//! Each task has a short system prompt and a user prompt builder. Backends
//! that only take a single prompt string can use [`build_full_prompt`].

use ndc_calc_core::assist::{CandidateSummary, MatchQuery, PrescriptionAttributes};

use crate::extraction::ExtractionResult;

/// System prompt for SIG parsing.
pub const SIG_SYSTEM_PROMPT: &str = r#"Parse prescription SIG strings. Respond ONLY with JSON: {"dose": number, "unit": string, "frequencyPerDay": number}. Normalize unit to tablet, capsule, ml, drop, puff, or unit."#;

/// System prompt for prescription attribute extraction.
pub const PRESCRIPTION_SYSTEM_PROMPT: &str = "You extract structured data from prescriptions.";

/// System prompt for candidate selection.
pub const SELECTION_SYSTEM_PROMPT: &str = "You select the most appropriate FDA NDC product.";

/// Worked SIG examples appended to the SIG prompt.
pub const SIG_EXAMPLES: &[(&str, &str)] = &[
    (
        "ii tabs po q12h",
        r#"{"dose":2,"unit":"tablet","frequencyPerDay":2}"#,
    ),
    (
        "instill one drop in each eye at bedtime",
        r#"{"dose":2,"unit":"drop","frequencyPerDay":1}"#,
    ),
    (
        "5 mL by mouth three times a day",
        r#"{"dose":5,"unit":"ml","frequencyPerDay":3}"#,
    ),
];

/// User prompt for SIG parsing.
pub fn make_sig_prompt(sig: &str, include_examples: bool) -> String {
    let mut prompt = String::new();
    if include_examples {
        prompt.push_str("Examples:\n");
        for (input, output) in SIG_EXAMPLES {
            prompt.push_str(&format!("SIG: \"{}\"\nJSON: {}\n", input, output));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!("SIG: \"{}\"\nJSON:", sig));
    prompt
}

/// User prompt for prescription attribute extraction.
pub fn make_prescription_prompt(query: &MatchQuery) -> String {
    let days = query.days.map(|d| d.to_string()).unwrap_or_default();
    format!(
        r#"You are assisting with matching prescription free text to FDA NDC data.

Extract key attributes from the provided text and respond strictly in JSON with the schema:
{{
  "generic_name": string | null,
  "brand_name": string | null,
  "strength_tokens": string[],
  "dosage_form": string | null,
  "route": string | null,
  "additional_keywords": string[]
}}

Use lower-case tokens. Return arrays even if empty.

Prescription text:
Drug field: "{}"
SIG: "{}"
Days supply: "{}""#,
        query.drug,
        query.sig.as_deref().unwrap_or(""),
        days
    )
}

/// User prompt asking for one product among ranked candidates.
pub fn make_selection_prompt(
    attributes: &PrescriptionAttributes,
    candidates: &[CandidateSummary],
) -> ExtractionResult<String> {
    let summary = serde_json::to_string_pretty(attributes)?;
    let payload = serde_json::to_string_pretty(candidates)?;

    Ok(format!(
        r#"You are selecting the best FDA NDC product based on prescription details.

Prescription summary:
{}

Candidate products:
{}

Return JSON matching:
{{
  "product_ndc": string | null,
  "confidence": number | null,
  "rationale": string
}}

If none are suitable, set product_ndc to null and explain."#,
        summary, payload
    ))
}

/// Single-string chat prompt for backends without message roles.
pub fn build_full_prompt(system: &str, user: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("<|system|>\n");
    prompt.push_str(system);
    prompt.push_str("\n<|end|>\n");

    prompt.push_str("<|user|>\n");
    prompt.push_str(user);
    prompt.push_str("\n<|end|>\n");
    prompt.push_str("<|assistant|>\n");

    prompt
}
