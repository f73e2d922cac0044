//! Raw registry index document.
//!
//! The bulk index is a single JSON document with nullable fields
//! throughout. Entries without a product code are dropped, as are
//! packages without a package code.

use serde::Deserialize;

use crate::models::{ActiveIngredient, CatalogPackage, CatalogProduct};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawIndex {
    pub generated_at: Option<String>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawItem {
    product_ndc: Option<String>,
    labeler_name: Option<String>,
    generic_name: Option<String>,
    brand_name: Option<String>,
    dosage_form: Option<String>,
    route: Option<Vec<String>>,
    marketing_end_date: Option<String>,
    active_ingredients: Option<Vec<RawIngredient>>,
    packages: Option<Vec<RawPackage>>,
}

#[derive(Debug, Deserialize)]
struct RawIngredient {
    name: Option<String>,
    strength: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackage {
    ndc: Option<String>,
    description: Option<String>,
    marketing_end_date: Option<String>,
    sample: Option<bool>,
    count: Option<f64>,
}

impl RawItem {
    /// Convert into a catalog product, or `None` if the entry has no usable code.
    pub fn into_product(self) -> Option<CatalogProduct> {
        let product_ndc = self.product_ndc.filter(|code| code.chars().any(|c| c.is_ascii_digit()))?;

        let mut product = CatalogProduct::new(product_ndc);
        product.labeler_name = self.labeler_name;
        product.generic_name = self.generic_name;
        product.brand_name = self.brand_name;
        product.dosage_form = self.dosage_form;
        product.routes = self.route.unwrap_or_default();
        product.marketing_end_date = self.marketing_end_date;
        product.active_ingredients = self
            .active_ingredients
            .unwrap_or_default()
            .into_iter()
            .map(|i| ActiveIngredient {
                name: i.name,
                strength: i.strength,
            })
            .collect();
        product.packages = self
            .packages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|pkg| {
                let ndc = pkg.ndc.filter(|code| code.chars().any(|c| c.is_ascii_digit()))?;
                Some(CatalogPackage {
                    ndc,
                    description: pkg.description,
                    marketing_end_date: pkg.marketing_end_date,
                    sample: pkg.sample,
                    count: pkg.count,
                })
            })
            .collect();

        Some(product)
    }
}
