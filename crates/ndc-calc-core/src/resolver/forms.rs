//! Dosage form and route canonicalization.
//!
//! Registry and free-text forms/routes are mapped onto closed
//! vocabularies by ordered substring rules. Text that matches no rule
//! falls back to its first comma-delimited segment, lowercased.

use std::sync::LazyLock;

use regex::Regex;

/// Ordered (substrings, canonical form) rules. First hit wins.
const DOSAGE_FORM_RULES: Rules = &[
    (&["tablet"], "tablet"),
    (&["capsule", "caplet"], "capsule"),
    (&["solution"], "solution"),
    (&["suspension"], "suspension"),
    (&["inhaler", "aerosol", "inhalant"], "inhaler"),
    (&["injection", "injectable"], "injection"),
    (&["patch"], "patch"),
    (&["cream"], "cream"),
    (&["ointment"], "ointment"),
    (&["gel"], "gel"),
    (&["spray"], "spray"),
    (&["powder"], "powder"),
    (&["granule"], "granule"),
    (&["pen"], "pen"),
    (&["kit"], "kit"),
];

/// Abbreviations matched as whole words.
const DOSAGE_FORM_ABBREVIATIONS: &[(&str, &str)] = &[
    ("tab", "tablet"),
    ("tabs", "tablet"),
    ("cap", "capsule"),
    ("caps", "capsule"),
];

/// Words recognized as a dosage form in free text.
const FORM_WORDS: &[&str] = &[
    "tablet", "tab", "tablets", "capsule", "cap", "capsules", "solution", "suspension", "inhaler",
    "aerosol", "patch", "cream", "ointment", "gel", "spray", "injection", "syringe", "pen",
    "lozenge", "powder", "granules",
];

const ROUTE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("po", "oral"),
    ("iv", "intravenous"),
    ("im", "injection"),
    ("sc", "subcutaneous"),
    ("sq", "subcutaneous"),
];

const ROUTE_RULES: Rules = &[
    (&["oral"], "oral"),
    (&["intravenous"], "intravenous"),
    (&["injection", "intramuscular"], "injection"),
    (&["subcutaneous"], "subcutaneous"),
    (&["topical"], "topical"),
    (&["transdermal"], "transdermal"),
    (&["ophthalmic"], "ophthalmic"),
    (&["otic"], "otic"),
    (&["nasal"], "nasal"),
    (&["inhalation"], "inhalation"),
];

/// SIG phrases implying a route, tested in order.
static SIG_ROUTES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\b(?:po|by mouth|orally|oral)\b", "oral"),
        (r"\b(?:intravenous|iv)\b", "intravenous"),
        (r"\b(?:intramuscular|im)\b", "injection"),
        (r"\b(?:subcutaneous|sc|sq)\b", "subcutaneous"),
        (r"\b(?:topical|apply)\b", "topical"),
        (r"\b(?:inhale|inhalation)\b", "inhalation"),
        (r"\b(?:ophthalmic|eye)\b", "ophthalmic"),
        (r"\b(?:otic|ear)\b", "otic"),
        (r"\bnasal\b", "nasal"),
    ]
    .into_iter()
    .map(|(pattern, route)| {
        (
            Regex::new(pattern).expect("Route pattern should be valid"),
            route,
        )
    })
    .collect()
});

fn first_segment(normalized: &str) -> Option<String> {
    normalized
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

type Rules = &'static [(&'static [&'static str], &'static str)];

fn apply_rules(normalized: &str, rules: Rules) -> Option<&'static str> {
    rules
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| normalized.contains(n)))
        .map(|(_, canonical)| *canonical)
}

/// Canonical dosage form for registry or free text.
pub fn canonical_dosage_form(form: &str) -> Option<String> {
    let normalized = form.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(canonical) = apply_rules(&normalized, DOSAGE_FORM_RULES) {
        return Some(canonical.to_string());
    }

    let abbreviation = normalized
        .split(|c: char| c == ',' || c.is_whitespace())
        .find_map(|word| {
            DOSAGE_FORM_ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == word)
                .map(|(_, canonical)| *canonical)
        });
    if let Some(canonical) = abbreviation {
        return Some(canonical.to_string());
    }

    first_segment(&normalized)
}

/// Canonical route for registry or free text.
pub fn canonical_route(route: &str) -> Option<String> {
    let normalized = route.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some((_, canonical)) = ROUTE_ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == normalized) {
        return Some(canonical.to_string());
    }

    if let Some(canonical) = apply_rules(&normalized, ROUTE_RULES) {
        return Some(canonical.to_string());
    }

    first_segment(&normalized)
}

/// Route implied by a SIG, if any.
pub fn derive_route(sig: &str) -> Option<&'static str> {
    let text = sig.to_lowercase();
    SIG_ROUTES
        .iter()
        .find(|(re, _)| re.is_match(&text))
        .map(|(_, route)| *route)
}

/// First token that names a dosage form.
pub fn guess_dosage_form<S: AsRef<str>>(tokens: &[S]) -> Option<String> {
    tokens
        .iter()
        .map(AsRef::as_ref)
        .find(|token| FORM_WORDS.contains(token))
        .map(str::to_string)
}
