//! NDC Calc Core Library
//!
//! Resolves a prescription (drug name or NDC, SIG, days supply) to
//! dispensable NDC packages and quantities.
//!
//! # Architecture
//!
//! ```text
//!  drug text ──► looks like NDC? ──yes──► normalize ──► catalog packages
//!                     │ no                                    │
//!                     ▼                                       │
//!           supplied packages? ──no──► Resolver ──► suggested product packages
//!                     │                                       │
//!                     └───────────────────┬───────────────────┘
//!                                         ▼
//!                   SIG parser ──► total quantity ──► package selection
//!                                                            │
//!                                                            ▼
//!                                                CalcResponse / ResultExport
//! ```
//!
//! # Modules
//!
//! - [`ndc`]: NDC normalization and formatting
//! - [`parser`]: Package description and SIG parsing
//! - [`resolver`]: Catalog candidate matching and suggestion
//! - [`quantity`]: Quantity arithmetic and package selection
//! - [`catalog`]: In-memory catalog with code lookups
//! - [`calculator`]: End-to-end calculation service
//! - [`db`]: SQLite catalog store with FTS5 search
//! - [`export`]: Result export
//! - [`assist`]: Text-extraction collaborator seam

pub mod assist;
pub mod calculator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod export;
pub mod models;
pub mod ndc;
pub mod parser;
pub mod quantity;
pub mod resolver;

// Re-export commonly used types
pub use assist::{Assistance, MatchQuery, TextAssistant};
pub use calculator::{CalcRequest, CalcResponse, Calculator, ServiceError, ServiceResult};
pub use catalog::Catalog;
pub use config::CalcConfig;
pub use db::Database;
pub use export::ResultExport;
pub use models::{
    ActiveIngredient, CalcResult, CanonicalUnit, CatalogPackage, CatalogProduct, PackageRecord,
    ParsedInstruction, SelectedPackage,
};
pub use ndc::{format_ndc11, normalize_ndc, Ndc, NdcError};
pub use resolver::{RankingCache, Resolver, Suggestion};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum NdcCalcError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for NdcCalcError {
    fn from(e: db::DbError) -> Self {
        NdcCalcError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for NdcCalcError {
    fn from(e: serde_json::Error) -> Self {
        NdcCalcError::SerializationError(e.to_string())
    }
}

impl From<config::ConfigError> for NdcCalcError {
    fn from(e: config::ConfigError) -> Self {
        NdcCalcError::InvalidInput(e.to_string())
    }
}

impl From<NdcError> for NdcCalcError {
    fn from(e: NdcError) -> Self {
        NdcCalcError::InvalidFormat(e.to_string())
    }
}

impl From<ServiceError> for NdcCalcError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidInput(msg) => NdcCalcError::InvalidInput(msg),
            ServiceError::InvalidFormat(e) => e.into(),
            ServiceError::InvalidQuantity(e) => NdcCalcError::InvalidQuantity(e.to_string()),
            ServiceError::Database(e) => e.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for NdcCalcError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        NdcCalcError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a catalog store at the given path.
#[uniffi::export]
pub fn open_catalog(path: String) -> Result<Arc<NdcCalcCore>, NdcCalcError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(NdcCalcCore::new(db, CalcConfig::default())))
}

/// Open a catalog store with a JSON calculator configuration.
#[uniffi::export]
pub fn open_catalog_with_config(
    path: String,
    config_json: String,
) -> Result<Arc<NdcCalcCore>, NdcCalcError> {
    let config = CalcConfig::from_json_str(&config_json)?;
    let db = Database::open(&path)?;
    Ok(Arc::new(NdcCalcCore::new(db, config)))
}

/// Create an in-memory catalog store (for testing).
#[uniffi::export]
pub fn open_catalog_in_memory() -> Result<Arc<NdcCalcCore>, NdcCalcError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(NdcCalcCore::new(db, CalcConfig::default())))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe catalog store and calculator for FFI.
///
/// Runs pattern-only: no text-extraction collaborator crosses the FFI.
#[derive(uniffi::Object)]
pub struct NdcCalcCore {
    db: Arc<Mutex<Database>>,
    config: CalcConfig,
    /// Loaded lazily, dropped on every catalog write
    catalog: Mutex<Option<Arc<Catalog>>>,
    cache: RankingCache,
}

impl NdcCalcCore {
    fn new(db: Database, config: CalcConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config,
            catalog: Mutex::new(None),
            cache: RankingCache::new(),
        }
    }

    /// Current catalog, loading it from the store if needed.
    fn catalog(&self, db: &Database) -> Result<Arc<Catalog>, NdcCalcError> {
        let mut slot = self.catalog.lock()?;
        if let Some(catalog) = slot.as_ref() {
            return Ok(Arc::clone(catalog));
        }
        let loaded = Arc::new(db.load_catalog()?);
        *slot = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    fn invalidate(&self) -> Result<(), NdcCalcError> {
        *self.catalog.lock()? = None;
        // Cached rankings refer to positions in the old catalog
        self.cache.clear();
        Ok(())
    }

    fn run(&self, drug: String, sig: String, days: f64) -> Result<(CalcRequest, CalcResponse), NdcCalcError> {
        let db = self.db.lock()?;
        let catalog = self.catalog(&db)?;
        let request = CalcRequest::new(drug, sig, days);
        let response = Calculator::new(&catalog, &self.config)
            .with_cache(&self.cache)
            .calculate(&request)?;
        Ok((request, response))
    }
}

#[uniffi::export]
impl NdcCalcCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add or update a product and its packages.
    pub fn upsert_product(&self, product: FfiProduct) -> Result<(), NdcCalcError> {
        let db = self.db.lock()?;
        db.upsert_product(&product.into())?;
        self.invalidate()
    }

    /// Import a raw catalog index document. Returns the number of products stored.
    pub fn import_index_json(&self, json: String) -> Result<u32, NdcCalcError> {
        let parsed = Catalog::from_index_json(&json)?;
        let db = self.db.lock()?;
        let count = db.upsert_products(parsed.products())?;
        self.invalidate()?;
        Ok(count as u32)
    }

    /// Get a product by hyphenated or plain product code.
    pub fn get_product(&self, product_ndc: String) -> Result<Option<FfiProduct>, NdcCalcError> {
        let db = self.db.lock()?;
        let product = db.get_product(&product_ndc)?;
        Ok(product.map(|p| p.into()))
    }

    /// Delete a product and its packages.
    pub fn delete_product(&self, product_ndc: String) -> Result<bool, NdcCalcError> {
        let db = self.db.lock()?;
        let deleted = db.delete_product(&product_ndc)?;
        if deleted {
            self.invalidate()?;
        }
        Ok(deleted)
    }

    /// Search products by generic, brand or labeler name.
    pub fn search_products(&self, query: String, limit: u32) -> Result<Vec<FfiProduct>, NdcCalcError> {
        let db = self.db.lock()?;
        let products = db.search_products(&query, limit as usize)?;
        Ok(products.into_iter().map(|p| p.into()).collect())
    }

    // =========================================================================
    // Calculation Operations
    // =========================================================================

    /// Calculate the dispense quantity and package selection.
    pub fn calculate(
        &self,
        drug: String,
        sig: String,
        days: f64,
    ) -> Result<FfiCalcResponse, NdcCalcError> {
        let (_, response) = self.run(drug, sig, days)?;
        Ok(response.into())
    }

    /// Calculate and export the result as JSON.
    pub fn export_calculation_json(
        &self,
        drug: String,
        sig: String,
        days: f64,
    ) -> Result<String, NdcCalcError> {
        let (request, response) = self.run(drug, sig, days)?;
        Ok(ResultExport::from_response(&request, &response).to_json()?)
    }

    // =========================================================================
    // NDC Utilities
    // =========================================================================

    /// Normalize an NDC to 11 plain digits.
    pub fn normalize_ndc(&self, ndc: String) -> Result<String, NdcCalcError> {
        Ok(normalize_ndc(&ndc)?)
    }

    /// Format an 11-digit NDC as 5-4-2.
    pub fn format_ndc(&self, ndc11: String) -> Result<String, NdcCalcError> {
        Ok(format_ndc11(&ndc11)?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe active ingredient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIngredient {
    pub name: Option<String>,
    pub strength: Option<String>,
}

/// FFI-safe catalog package.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPackage {
    pub ndc: String,
    pub description: Option<String>,
    pub marketing_end_date: Option<String>,
    pub sample: Option<bool>,
    pub count: Option<f64>,
}

/// FFI-safe catalog product.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProduct {
    pub product_ndc: String,
    pub labeler_name: Option<String>,
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    pub dosage_form: Option<String>,
    pub routes: Vec<String>,
    pub marketing_end_date: Option<String>,
    pub active_ingredients: Vec<FfiIngredient>,
    pub packages: Vec<FfiPackage>,
}

impl From<CatalogProduct> for FfiProduct {
    fn from(product: CatalogProduct) -> Self {
        Self {
            product_ndc: product.product_ndc,
            labeler_name: product.labeler_name,
            generic_name: product.generic_name,
            brand_name: product.brand_name,
            dosage_form: product.dosage_form,
            routes: product.routes,
            marketing_end_date: product.marketing_end_date,
            active_ingredients: product
                .active_ingredients
                .into_iter()
                .map(|i| FfiIngredient {
                    name: i.name,
                    strength: i.strength,
                })
                .collect(),
            packages: product
                .packages
                .into_iter()
                .map(|p| FfiPackage {
                    ndc: p.ndc,
                    description: p.description,
                    marketing_end_date: p.marketing_end_date,
                    sample: p.sample,
                    count: p.count,
                })
                .collect(),
        }
    }
}

impl From<FfiProduct> for CatalogProduct {
    fn from(product: FfiProduct) -> Self {
        let mut converted = CatalogProduct::new(product.product_ndc);
        converted.labeler_name = product.labeler_name;
        converted.generic_name = product.generic_name;
        converted.brand_name = product.brand_name;
        converted.dosage_form = product.dosage_form;
        converted.routes = product.routes;
        converted.marketing_end_date = product.marketing_end_date;
        converted.active_ingredients = product
            .active_ingredients
            .into_iter()
            .map(|i| ActiveIngredient {
                name: i.name,
                strength: i.strength,
            })
            .collect();
        converted.packages = product
            .packages
            .into_iter()
            .map(|p| CatalogPackage {
                ndc: p.ndc,
                description: p.description,
                marketing_end_date: p.marketing_end_date,
                sample: p.sample,
                count: p.count,
            })
            .collect();
        converted.refresh_search_tokens();
        converted
    }
}

/// FFI-safe package selection.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSelection {
    pub ndc: String,
    pub formatted_ndc: String,
    pub package_size: f64,
    pub unit: String,
    pub packs: u32,
    pub dispensed_qty: f64,
    pub overfill_pct: f64,
    pub inactive: bool,
    pub description: String,
}

impl From<SelectedPackage> for FfiSelection {
    fn from(selection: SelectedPackage) -> Self {
        Self {
            ndc: selection.package.ndc,
            formatted_ndc: selection.package.formatted_ndc,
            package_size: selection.package.size,
            unit: selection.package.unit.to_string(),
            packs: selection.packs,
            dispensed_qty: selection.dispensed_qty,
            overfill_pct: selection.overfill_pct,
            inactive: selection.package.inactive,
            description: selection.package.description,
        }
    }
}

/// FFI-safe calculation response.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCalcResponse {
    pub drug_name: String,
    /// "ndc", "supplied" or "matched"
    pub lookup: String,
    /// None when the SIG could not be parsed
    pub total_qty: Option<f64>,
    pub primary_dispensed_qty: Option<f64>,
    pub primary_overfill_pct: Option<f64>,
    pub selections: Vec<FfiSelection>,
    pub unparsed_ndcs: Vec<String>,
    pub inactive_ndcs: Vec<String>,
    pub suggested_product_ndc: Option<String>,
    pub suggestion_rationale: Option<String>,
    pub dosage_form: Option<String>,
    pub route: Option<String>,
    pub warnings: Vec<String>,
}

impl From<CalcResponse> for FfiCalcResponse {
    fn from(response: CalcResponse) -> Self {
        let lookup = match response.lookup {
            calculator::LookupKind::Ndc => "ndc",
            calculator::LookupKind::Supplied => "supplied",
            calculator::LookupKind::Matched => "matched",
        };
        let (total_qty, primary_dispensed_qty, primary_overfill_pct, selections) =
            match response.calc {
                Some(calc) => (
                    Some(calc.total_qty),
                    Some(calc.primary_dispensed_qty),
                    Some(calc.primary_overfill_pct),
                    calc.selections.into_iter().map(|s| s.into()).collect(),
                ),
                None => (None, None, None, Vec::new()),
            };

        Self {
            drug_name: response.drug_name,
            lookup: lookup.to_string(),
            total_qty,
            primary_dispensed_qty,
            primary_overfill_pct,
            selections,
            unparsed_ndcs: response.unparsed_packages.into_iter().map(|p| p.ndc).collect(),
            inactive_ndcs: response.inactive_ndcs.into_iter().map(|p| p.ndc).collect(),
            suggested_product_ndc: response.suggestion.as_ref().map(|s| s.product_ndc.clone()),
            suggestion_rationale: response.suggestion.map(|s| s.rationale),
            dosage_form: response.dosage_form,
            route: response.route,
            warnings: response.warnings,
        }
    }
}
