//! Catalog database operations.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{Database, DbError, DbResult};
use crate::catalog::Catalog;
use crate::models::{CatalogPackage, CatalogProduct};

const PRODUCT_COLUMNS: &str = r#"
    product_ndc, labeler_name, generic_name, brand_name, dosage_form,
    routes, marketing_end_date, active_ingredients
"#;

impl Database {
    /// Insert or update a product and replace its packages.
    pub fn upsert_product(&self, product: &CatalogProduct) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        write_product(&tx, product)?;
        tx.commit()?;
        Ok(())
    }

    /// Insert or update many products in one transaction.
    pub fn upsert_products(&self, products: &[CatalogProduct]) -> DbResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for product in products {
            write_product(&tx, product)?;
        }
        tx.commit()?;
        debug!(count = products.len(), "upserted products");
        Ok(products.len())
    }

    /// Get a product by hyphenated or plain product code.
    pub fn get_product(&self, code: &str) -> DbResult<Option<CatalogProduct>> {
        let code = code.trim();
        let plain: String = code.chars().filter(|c| c.is_ascii_digit()).collect();

        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM products WHERE product_ndc = ?1 OR product_ndc_plain = ?2 ORDER BY product_ndc = ?1 DESC LIMIT 1",
                    PRODUCT_COLUMNS
                ),
                params![code, plain],
                ProductRow::from_row,
            )
            .optional()?;

        row.map(|row| self.hydrate(row)).transpose()
    }

    /// All products in insertion order.
    pub fn list_products(&self) -> DbResult<Vec<CatalogProduct>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM products ORDER BY rowid",
            PRODUCT_COLUMNS
        ))?;
        let rows = stmt.query_map([], ProductRow::from_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(self.hydrate(row?)?);
        }
        Ok(products)
    }

    /// Search product names using FTS5 (BM25 ranking).
    pub fn search_products(&self, query: &str, limit: usize) -> DbResult<Vec<CatalogProduct>> {
        let escaped_query = escape_fts_query(query);
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.product_ndc, p.labeler_name, p.generic_name, p.brand_name, p.dosage_form,
                   p.routes, p.marketing_end_date, p.active_ingredients,
                   bm25(products_fts) as rank
            FROM products p
            JOIN products_fts fts ON p.rowid = fts.rowid
            WHERE products_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![escaped_query, limit as i64], ProductRow::from_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(self.hydrate(row?)?);
        }
        Ok(products)
    }

    /// Delete a product and its packages.
    pub fn delete_product(&self, product_ndc: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM products WHERE product_ndc = ?", [product_ndc])?;
        Ok(rows_affected > 0)
    }

    /// Number of stored products.
    pub fn product_count(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Build an in-memory catalog from every stored product.
    pub fn load_catalog(&self) -> DbResult<Catalog> {
        Ok(Catalog::from_products(self.list_products()?))
    }

    fn packages_for(&self, product_ndc: &str) -> DbResult<Vec<CatalogPackage>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ndc, description, marketing_end_date, sample, count
            FROM packages
            WHERE product_ndc = ?
            ORDER BY position
            "#,
        )?;
        let rows = stmt.query_map([product_ndc], |row| {
            Ok(CatalogPackage {
                ndc: row.get(0)?,
                description: row.get(1)?,
                marketing_end_date: row.get(2)?,
                sample: row.get(3)?,
                count: row.get(4)?,
            })
        })?;

        let mut packages = Vec::new();
        for row in rows {
            packages.push(row?);
        }
        Ok(packages)
    }

    fn hydrate(&self, row: ProductRow) -> DbResult<CatalogProduct> {
        let packages = self.packages_for(&row.product_ndc)?;
        let mut product: CatalogProduct = row.try_into()?;
        product.packages = packages;
        product.refresh_search_tokens();
        Ok(product)
    }
}

fn write_product(conn: &Connection, product: &CatalogProduct) -> DbResult<()> {
    let product_ndc = product.product_ndc.trim();
    if product_ndc.is_empty() {
        return Err(DbError::Constraint("product code is empty".into()));
    }
    let routes_json = serde_json::to_string(&product.routes)?;
    let ingredients_json = serde_json::to_string(&product.active_ingredients)?;

    conn.execute(
        r#"
        INSERT INTO products (
            product_ndc, product_ndc_plain, labeler_name, generic_name, brand_name,
            dosage_form, routes, marketing_end_date, active_ingredients, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, datetime('now'))
        ON CONFLICT(product_ndc) DO UPDATE SET
            product_ndc_plain = excluded.product_ndc_plain,
            labeler_name = excluded.labeler_name,
            generic_name = excluded.generic_name,
            brand_name = excluded.brand_name,
            dosage_form = excluded.dosage_form,
            routes = excluded.routes,
            marketing_end_date = excluded.marketing_end_date,
            active_ingredients = excluded.active_ingredients,
            updated_at = datetime('now')
        "#,
        params![
            product_ndc,
            product.product_ndc_plain(),
            product.labeler_name,
            product.generic_name,
            product.brand_name,
            product.dosage_form,
            routes_json,
            product.marketing_end_date,
            ingredients_json,
        ],
    )?;

    conn.execute("DELETE FROM packages WHERE product_ndc = ?", [product_ndc])?;
    for (position, package) in product.packages.iter().enumerate() {
        if package.ndc.trim().is_empty() {
            return Err(DbError::Constraint(format!(
                "package code is empty for product {}",
                product_ndc
            )));
        }
        conn.execute(
            r#"
            INSERT INTO packages (
                product_ndc, ndc, position, description, marketing_end_date, sample, count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(product_ndc, ndc) DO NOTHING
            "#,
            params![
                product_ndc,
                package.ndc.trim(),
                position as i64,
                package.description,
                package.marketing_end_date,
                package.sample,
                package.count,
            ],
        )?;
    }
    Ok(())
}

/// Intermediate row struct for database mapping.
struct ProductRow {
    product_ndc: String,
    labeler_name: Option<String>,
    generic_name: Option<String>,
    brand_name: Option<String>,
    dosage_form: Option<String>,
    routes: String,
    marketing_end_date: Option<String>,
    active_ingredients: String,
}

impl ProductRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            product_ndc: row.get(0)?,
            labeler_name: row.get(1)?,
            generic_name: row.get(2)?,
            brand_name: row.get(3)?,
            dosage_form: row.get(4)?,
            routes: row.get(5)?,
            marketing_end_date: row.get(6)?,
            active_ingredients: row.get(7)?,
        })
    }
}

impl TryFrom<ProductRow> for CatalogProduct {
    type Error = DbError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let mut product = CatalogProduct::new(row.product_ndc);
        product.labeler_name = row.labeler_name;
        product.generic_name = row.generic_name;
        product.brand_name = row.brand_name;
        product.dosage_form = row.dosage_form;
        product.routes = serde_json::from_str(&row.routes)?;
        product.marketing_end_date = row.marketing_end_date;
        product.active_ingredients = serde_json::from_str(&row.active_ingredients)?;
        Ok(product)
    }
}

/// Escape special FTS5 characters and prepare query for prefix matching.
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}
