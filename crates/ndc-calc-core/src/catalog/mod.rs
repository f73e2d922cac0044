//! In-memory drug product catalog.
//!
//! Loaded once and shared read-only. Products are indexed by their
//! published and plain product codes; packages by published, plain and
//! canonical 11-digit codes.

mod convert;
mod index;

pub use convert::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::models::{CatalogPackage, CatalogProduct};
use crate::ndc::normalize_ndc;

use index::{RawIndex, RawItem};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Read-only catalog with code lookups.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    generation: u64,
    generated_at: Option<String>,
    products: Vec<CatalogProduct>,
    product_index: HashMap<String, usize>,
    package_index: HashMap<String, (usize, usize)>,
}

impl Catalog {
    /// Build a catalog, computing search tokens and lookup indices.
    pub fn from_products(products: Vec<CatalogProduct>) -> Self {
        let mut catalog = Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            ..Self::default()
        };

        for mut product in products {
            product.refresh_search_tokens();
            let idx = catalog.products.len();

            catalog.product_index.insert(product.product_ndc.clone(), idx);
            catalog.product_index.insert(product.product_ndc_plain(), idx);

            for (pkg_idx, pkg) in product.packages.iter().enumerate() {
                for key in package_keys(&pkg.ndc) {
                    catalog.package_index.entry(key).or_insert((idx, pkg_idx));
                }
            }

            catalog.products.push(product);
        }

        info!(
            products = catalog.products.len(),
            packages = catalog.package_count(),
            "catalog loaded"
        );

        catalog
    }

    /// Load the raw registry index document.
    pub fn from_index_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawIndex = serde_json::from_str(json)?;
        let products = raw.items.into_iter().filter_map(RawItem::into_product).collect();

        let mut catalog = Self::from_products(products);
        catalog.generated_at = raw.generated_at;
        Ok(catalog)
    }

    /// Process-unique id of this build. Clones share it; an empty default
    /// catalog is generation 0.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Build timestamp of the source index, if known.
    pub fn generated_at(&self) -> Option<&str> {
        self.generated_at.as_deref()
    }

    /// All products in load order.
    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Total raw package entries across all products.
    pub fn package_count(&self) -> usize {
        self.products.iter().map(|p| p.packages.len()).sum()
    }

    /// Look up a product by its published or plain product code.
    pub fn find_product(&self, code: &str) -> Option<&CatalogProduct> {
        let trimmed = code.trim();
        self.product_index
            .get(trimmed)
            .or_else(|| self.product_index.get(&digits(trimmed)))
            .map(|&idx| &self.products[idx])
    }

    /// Look up a package (and its owning product) by any accepted code layout.
    pub fn find_package(&self, code: &str) -> Option<(&CatalogProduct, &CatalogPackage)> {
        let trimmed = code.trim();
        let (product_idx, pkg_idx) = self
            .package_index
            .get(trimmed)
            .or_else(|| self.package_index.get(&digits(trimmed)))
            .or_else(|| {
                normalize_ndc(trimmed)
                    .ok()
                    .and_then(|canonical| self.package_index.get(&canonical))
            })?;

        let product = &self.products[*product_idx];
        Some((product, &product.packages[*pkg_idx]))
    }

    /// The product owning a product or package code.
    pub fn product_for_code(&self, code: &str) -> Option<&CatalogProduct> {
        self.find_product(code)
            .or_else(|| self.find_package(code).map(|(product, _)| product))
    }
}

fn digits(code: &str) -> String {
    code.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn package_keys(code: &str) -> Vec<String> {
    let mut keys = vec![code.to_string(), digits(code)];
    if let Ok(canonical) = normalize_ndc(code) {
        keys.push(canonical);
    }
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActiveIngredient;

    fn sample_catalog() -> Catalog {
        let mut lisinopril = CatalogProduct::new("0093-7180");
        lisinopril.generic_name = Some("Lisinopril".into());
        lisinopril.dosage_form = Some("TABLET".into());
        lisinopril.active_ingredients = vec![ActiveIngredient {
            name: Some("LISINOPRIL".into()),
            strength: Some("10 mg/1".into()),
        }];
        lisinopril.packages = vec![
            CatalogPackage::new("0093-7180-56", "30 TABLET in 1 BOTTLE"),
            CatalogPackage::new("0093-7180-01", "100 TABLET in 1 BOTTLE"),
        ];

        let mut albuterol = CatalogProduct::new("80425-0266");
        albuterol.generic_name = Some("Albuterol Sulfate".into());
        albuterol.packages = vec![CatalogPackage::new(
            "80425-0266-1",
            "1 CANISTER in 1 CARTON / 200 AEROSOL, METERED in 1 CANISTER",
        )];

        Catalog::from_products(vec![lisinopril, albuterol])
    }

    #[test]
    fn test_indices() {
        let catalog = sample_catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.package_count(), 3);
        assert!(catalog.products()[0].search_tokens.contains("lisinopril"));

        assert_eq!(catalog.find_product("0093-7180").unwrap().display_name(), "Lisinopril");
        assert_eq!(catalog.find_product("00937180").unwrap().display_name(), "Lisinopril");
        assert!(catalog.find_product("9999-9999").is_none());
    }

    #[test]
    fn test_package_lookup_layouts() {
        let catalog = sample_catalog();

        for code in ["0093-7180-56", "0093718056", "00093718056", "00093-7180-56"] {
            let (product, pkg) = catalog.find_package(code).unwrap();
            assert_eq!(product.product_ndc, "0093-7180");
            assert_eq!(pkg.ndc, "0093-7180-56");
        }

        // 5-3-2 and 5-4-1 layouts of the same package
        let (product, _) = catalog.find_package("80425-266-01").unwrap();
        assert_eq!(product.display_name(), "Albuterol Sulfate");
        assert!(catalog.find_package("12345-6789-01").is_none());
    }

    #[test]
    fn test_product_for_code() {
        let catalog = sample_catalog();
        assert_eq!(catalog.product_for_code("0093-7180").unwrap().product_ndc, "0093-7180");
        assert_eq!(catalog.product_for_code("00093-7180-01").unwrap().product_ndc, "0093-7180");
    }

    #[test]
    fn test_from_index_json() {
        let catalog = Catalog::from_index_json(
            r#"{"generatedAt": "2024-05-01", "items": [
                {"productNdc": "0093-7180", "genericName": "Lisinopril",
                 "packages": [{"ndc": "0093-7180-56", "description": "30 TABLET in 1 BOTTLE"}]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(catalog.generated_at(), Some("2024-05-01"));
        assert!(catalog.find_package("00093718056").is_some());
        assert!(Catalog::from_index_json("not json").is_err());
    }
}
