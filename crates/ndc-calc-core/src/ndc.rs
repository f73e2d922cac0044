//! NDC normalization and formatting.
//!
//! Package NDCs are published as 10-digit codes in one of three segment
//! layouts (4-4-2, 5-3-2, 5-4-1). Billing systems use an 11-digit 5-4-2
//! form, obtained by zero-padding whichever segment is short.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static SEGMENTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,5})[-\s]?(\d{1,4})[-\s]?(\d{1,2})$").expect("NDC segment pattern should be valid")
});

/// NDC errors. All of these are caller input errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NdcError {
    #[error("NDC input is empty")]
    Empty,

    #[error("NDC must contain digits")]
    NoDigits,

    #[error("NDC must be 10 or 11 digits, got {0}")]
    InvalidLength(usize),

    #[error("Unable to normalize NDC format: {0}")]
    InvalidFormat(String),
}

pub type NdcResult<T> = Result<T, NdcError>;

/// A canonical 11-digit NDC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ndc(String);

impl Ndc {
    /// Normalize any accepted layout into canonical form.
    pub fn parse(input: &str) -> NdcResult<Self> {
        normalize_ndc(input).map(Ndc)
    }

    /// The 11 plain digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 5-4-2 hyphenated display form.
    pub fn formatted(&self) -> String {
        format!("{}-{}-{}", &self.0[..5], &self.0[5..9], &self.0[9..])
    }
}

impl fmt::Display for Ndc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl TryFrom<String> for Ndc {
    type Error = NdcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ndc::parse(&value)
    }
}

impl From<Ndc> for String {
    fn from(ndc: Ndc) -> Self {
        ndc.0
    }
}

/// Normalize an NDC to its 11-digit plain form.
///
/// 11 digits pass through. 10 digits are split into segments (by the
/// delimiters present, else 4-4-2) and the short segment is padded.
pub fn normalize_ndc(input: &str) -> NdcResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(NdcError::Empty);
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(NdcError::NoDigits);
    }

    match digits.len() {
        11 => return Ok(digits),
        10 => {}
        n => return Err(NdcError::InvalidLength(n)),
    }

    let has_delimiters = trimmed.chars().any(|c| c == '-' || c.is_whitespace());
    let captures = if has_delimiters {
        SEGMENTED.captures(trimmed)
    } else {
        None
    };

    let (labeler, product, package) = match captures {
        Some(caps) => (
            caps[1].to_string(),
            caps[2].to_string(),
            caps[3].to_string(),
        ),
        None => (
            digits[..4].to_string(),
            digits[4..8].to_string(),
            digits[8..].to_string(),
        ),
    };

    match (labeler.len(), product.len(), package.len()) {
        (4, 4, 2) => Ok(format!("0{}{}{}", labeler, product, package)),
        (5, 3, 2) => Ok(format!("{}0{}{}", labeler, product, package)),
        (5, 4, 1) => Ok(format!("{}{}0{}", labeler, product, package)),
        // Unrecognized layout: assume the labeler is the short segment
        (4, _, _) => Ok(format!("0{}{}{}", labeler, product, package)),
        (l, p, k) => Err(NdcError::InvalidFormat(format!("{}-{}-{} segments", l, p, k))),
    }
}

/// Format an 11-digit NDC as 5-4-2.
pub fn format_ndc11(ndc11: &str) -> NdcResult<String> {
    let plain: String = ndc11.chars().filter(|c| c.is_ascii_digit()).collect();
    if plain.len() != 11 {
        return Err(NdcError::InvalidLength(plain.len()));
    }
    Ok(format!("{}-{}-{}", &plain[..5], &plain[5..9], &plain[9..]))
}

/// Heuristic: does free text look like an NDC rather than a drug name?
pub fn looks_like_ndc(value: &str) -> bool {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    (10..=14).contains(&len)
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c == ' ')
}
