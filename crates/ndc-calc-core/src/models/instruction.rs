//! Parsed dosing instruction (SIG) models.

use serde::{Deserialize, Serialize};

use super::CanonicalUnit;

/// How an instruction was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionSource {
    /// Deterministic pattern rules
    Pattern,
    /// Text-extraction collaborator
    Assisted,
}

/// Dose and frequency extracted from a SIG.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    /// Units per administration (> 0)
    pub dose: f64,
    pub unit: CanonicalUnit,
    /// Administrations per day (> 0, may be fractional)
    pub frequency_per_day: f64,
    /// "As needed" marker present
    pub prn: bool,
    pub source: InstructionSource,
}

impl ParsedInstruction {
    /// Units consumed per day.
    pub fn daily_quantity(&self) -> f64 {
        self.dose * self.frequency_per_day
    }
}
