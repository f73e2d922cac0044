//! Canonical dispensing units.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of units a package size or dose can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalUnit {
    Tablet,
    Capsule,
    Ml,
    Vial,
    Patch,
    Unit,
    Each,
    Dose,
    Syringe,
    Kit,
    Puff,
    Inhalation,
    Inhaler,
    G,
    Mg,
    Mcg,
    Liter,
    Drop,
}

impl CanonicalUnit {
    /// Lowercase wire name (e.g. "tablet", "ml").
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalUnit::Tablet => "tablet",
            CanonicalUnit::Capsule => "capsule",
            CanonicalUnit::Ml => "ml",
            CanonicalUnit::Vial => "vial",
            CanonicalUnit::Patch => "patch",
            CanonicalUnit::Unit => "unit",
            CanonicalUnit::Each => "each",
            CanonicalUnit::Dose => "dose",
            CanonicalUnit::Syringe => "syringe",
            CanonicalUnit::Kit => "kit",
            CanonicalUnit::Puff => "puff",
            CanonicalUnit::Inhalation => "inhalation",
            CanonicalUnit::Inhaler => "inhaler",
            CanonicalUnit::G => "g",
            CanonicalUnit::Mg => "mg",
            CanonicalUnit::Mcg => "mcg",
            CanonicalUnit::Liter => "liter",
            CanonicalUnit::Drop => "drop",
        }
    }

    /// Look up a package-description unit token (case-insensitive).
    ///
    /// Returns `None` for tokens outside the alias table; callers report
    /// those packages as unsupported rather than coercing them.
    pub fn from_package_token(token: &str) -> Option<Self> {
        let unit = match token.to_lowercase().as_str() {
            "tablet" | "tablets" | "tab" | "tabs" => CanonicalUnit::Tablet,
            "capsule" | "capsules" | "cap" | "caps" => CanonicalUnit::Capsule,
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" | "cc" => {
                CanonicalUnit::Ml
            }
            "vial" | "vials" => CanonicalUnit::Vial,
            "patch" | "patches" => CanonicalUnit::Patch,
            "unit" | "units" => CanonicalUnit::Unit,
            "each" => CanonicalUnit::Each,
            "dose" | "doses" => CanonicalUnit::Dose,
            "syringe" | "syringes" => CanonicalUnit::Syringe,
            "kit" | "kits" => CanonicalUnit::Kit,
            "puff" | "puffs" | "actuation" | "actuations" | "spray" | "sprays" | "aerosol"
            | "aerosols" | "metered" => CanonicalUnit::Puff,
            "inhalation" | "inhalations" => CanonicalUnit::Inhalation,
            "inhaler" | "inhalers" => CanonicalUnit::Inhaler,
            "g" | "gram" | "grams" => CanonicalUnit::G,
            "mg" | "milligram" | "milligrams" => CanonicalUnit::Mg,
            "mcg" | "microgram" | "micrograms" => CanonicalUnit::Mcg,
            "l" | "liter" | "liters" | "litre" | "litres" => CanonicalUnit::Liter,
            _ => return None,
        };
        Some(unit)
    }

    /// Look up a dose unit token from a SIG (case-insensitive).
    pub fn from_dose_token(token: &str) -> Option<Self> {
        let unit = match token.to_lowercase().as_str() {
            "tablet" | "tablets" | "tab" | "tabs" => CanonicalUnit::Tablet,
            "capsule" | "capsules" | "cap" | "caps" => CanonicalUnit::Capsule,
            "ml" | "milliliter" | "milliliters" => CanonicalUnit::Ml,
            "drop" | "drops" => CanonicalUnit::Drop,
            "puff" | "puffs" => CanonicalUnit::Puff,
            "unit" | "units" => CanonicalUnit::Unit,
            _ => return None,
        };
        Some(unit)
    }
}

impl fmt::Display for CanonicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
