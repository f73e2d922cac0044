//! SIG (dosing instruction) parser.
//!
//! Pattern rules run first. When they cannot find both a dose and a
//! frequency, the instruction is handed to the text-extraction
//! collaborator if one is configured.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assist::{Assistance, SigExtraction};
use crate::models::{CanonicalUnit, InstructionSource, ParsedInstruction};

pub const PRN_WARNING: &str = "PRN prescriptions may receive partial fills.";
pub const UNPARSEABLE_WARNING: &str =
    "Unable to parse SIG automatically. Please refine input or provide structured fields.";
pub const ASSIST_FAILED_WARNING: &str =
    "Assisted parsing could not interpret the SIG. Please refine input or provide structured fields.";

static PRN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bprn\b").expect("PRN pattern should be valid"));

static DOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(?:(tablets?|tabs?|capsules?|caps?|ml|milliliters?|drops?|puffs?|units?)\b)?",
    )
    .expect("Dose pattern should be valid")
});

/// Named frequencies, tested in order.
static FREQUENCIES: LazyLock<Vec<(Regex, f64)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(?:twice daily|twice a day|two times daily|two times a day|bid|b\.i\.d)\b", 2.0),
        (r"(?i)\b(?:three times daily|three times a day|tid|t\.i\.d)\b", 3.0),
        (r"(?i)\b(?:four times daily|four times a day|qid|q\.i\.d)\b", 4.0),
        (r"(?i)\b(?:every other day|qod)\b", 0.5),
        (r"(?i)\b(?:once daily|once a day|every day|daily|qd|q\.d)\b", 1.0),
    ]
    .into_iter()
    .map(|(pattern, per_day)| {
        (
            Regex::new(pattern).expect("Frequency pattern should be valid"),
            per_day,
        )
    })
    .collect()
});

static EVERY_HOURS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:every\s+(\d+)\s*(?:hours?|hrs?|h)|q\s*(\d+)\s*h(?:ours?|rs?)?)\b")
        .expect("Interval pattern should be valid")
});

static TIMES_PER_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:times?|x)\s+(?:per|a)\s+day")
        .expect("Times-per-day pattern should be valid")
});

/// Parse outcome with accumulated warnings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigParse {
    /// `None` when no automatic parse was possible
    pub parsed: Option<ParsedInstruction>,
    pub warnings: Vec<String>,
}

/// Parse a SIG using the given strategy.
pub fn parse_sig(sig: &str, assistance: Assistance<'_>) -> SigParse {
    let mut warnings = Vec::new();
    let cleaned = sig.trim();

    if cleaned.is_empty() {
        warnings.push(UNPARSEABLE_WARNING.to_string());
        return SigParse {
            parsed: None,
            warnings,
        };
    }

    let prn = PRN.is_match(cleaned);
    if prn {
        warnings.push(PRN_WARNING.to_string());
    }

    if let Some(parsed) = pattern_parse(cleaned, prn) {
        return SigParse {
            parsed: Some(parsed),
            warnings,
        };
    }

    let parsed = match assistance {
        Assistance::PatternOnly => {
            warnings.push(UNPARSEABLE_WARNING.to_string());
            None
        }
        Assistance::Assisted(assistant) => {
            debug!(sig = cleaned, "pattern parse failed, asking collaborator");
            let parsed = assistant
                .extract_sig(cleaned)
                .and_then(|extraction| from_extraction(&extraction, prn));
            if parsed.is_none() {
                warnings.push(ASSIST_FAILED_WARNING.to_string());
            }
            parsed
        }
    };

    SigParse { parsed, warnings }
}

/// Deterministic pass: both a dose and a frequency must be found.
fn pattern_parse(sig: &str, prn: bool) -> Option<ParsedInstruction> {
    let caps = DOSE.captures(sig)?;
    let dose: f64 = caps[1].parse().ok()?;
    if dose <= 0.0 {
        return None;
    }
    let unit = caps
        .get(2)
        .and_then(|m| CanonicalUnit::from_dose_token(m.as_str()))
        .unwrap_or(CanonicalUnit::Unit);

    let frequency_per_day = detect_frequency(sig)?;

    Some(ParsedInstruction {
        dose,
        unit,
        frequency_per_day,
        prn,
        source: InstructionSource::Pattern,
    })
}

/// Administrations per day, or `None` if no rule applies.
pub fn detect_frequency(sig: &str) -> Option<f64> {
    if let Some((_, per_day)) = FREQUENCIES.iter().find(|(re, _)| re.is_match(sig)) {
        return Some(*per_day);
    }

    if let Some(caps) = EVERY_HOURS.captures(sig) {
        let hours: f64 = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok())?;
        if hours > 0.0 {
            return Some(round2(24.0 / hours));
        }
    }

    if let Some(caps) = TIMES_PER_DAY.captures(sig) {
        let times: f64 = caps[1].parse().ok()?;
        if times > 0.0 {
            return Some(times);
        }
    }

    None
}

/// Validate collaborator output into an instruction.
fn from_extraction(extraction: &SigExtraction, prn: bool) -> Option<ParsedInstruction> {
    let dose = extraction.dose.filter(|d| d.is_finite() && *d > 0.0)?;
    let frequency_per_day = extraction
        .frequency_per_day
        .filter(|f| f.is_finite() && *f > 0.0)?;
    let unit = extraction
        .unit
        .as_deref()
        .and_then(CanonicalUnit::from_dose_token)
        .unwrap_or(CanonicalUnit::Unit);

    Some(ParsedInstruction {
        dose,
        unit,
        frequency_per_day,
        prn,
        source: InstructionSource::Assisted,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
