//! Quantity calculation result models.

use serde::{Deserialize, Serialize};

use super::SelectedPackage;

/// Outcome of package selection for one prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalcResult {
    /// Best packages first (at most the policy's selection cap)
    pub selections: Vec<SelectedPackage>,
    /// dose * frequency * days, rounded to 2 decimals
    pub total_qty: f64,
    /// Dispensed quantity of the first selection (0 if none)
    pub primary_dispensed_qty: f64,
    /// Overfill fraction of the first selection, rounded to 4 decimals
    pub primary_overfill_pct: f64,
    pub warnings: Vec<String>,
}

impl CalcResult {
    /// The recommended package, if any.
    pub fn primary(&self) -> Option<&SelectedPackage> {
        self.selections.first()
    }

    /// True when no package could be selected.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}
