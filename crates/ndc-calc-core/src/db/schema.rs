//! SQLite schema definition.

/// Stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete database schema for the catalog store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Products
-- ============================================================================

CREATE TABLE IF NOT EXISTS products (
    product_ndc TEXT PRIMARY KEY,                 -- as published, hyphenated
    product_ndc_plain TEXT NOT NULL,              -- digits only
    labeler_name TEXT,
    generic_name TEXT,
    brand_name TEXT,
    dosage_form TEXT,
    routes TEXT NOT NULL DEFAULT '[]',            -- JSON array of strings
    marketing_end_date TEXT,
    active_ingredients TEXT NOT NULL DEFAULT '[]', -- JSON array of {name, strength}
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_products_plain ON products(product_ndc_plain);

-- FTS5 virtual table for name search
CREATE VIRTUAL TABLE IF NOT EXISTS products_fts USING fts5(
    product_ndc,
    generic_name,
    brand_name,
    labeler_name,
    content='products',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS products_ai AFTER INSERT ON products BEGIN
    INSERT INTO products_fts(rowid, product_ndc, generic_name, brand_name, labeler_name)
    VALUES (new.rowid, new.product_ndc, new.generic_name, new.brand_name, new.labeler_name);
END;

CREATE TRIGGER IF NOT EXISTS products_ad AFTER DELETE ON products BEGIN
    INSERT INTO products_fts(products_fts, rowid, product_ndc, generic_name, brand_name, labeler_name)
    VALUES ('delete', old.rowid, old.product_ndc, old.generic_name, old.brand_name, old.labeler_name);
END;

CREATE TRIGGER IF NOT EXISTS products_au AFTER UPDATE ON products BEGIN
    INSERT INTO products_fts(products_fts, rowid, product_ndc, generic_name, brand_name, labeler_name)
    VALUES ('delete', old.rowid, old.product_ndc, old.generic_name, old.brand_name, old.labeler_name);
    INSERT INTO products_fts(rowid, product_ndc, generic_name, brand_name, labeler_name)
    VALUES (new.rowid, new.product_ndc, new.generic_name, new.brand_name, new.labeler_name);
END;

-- ============================================================================
-- Packages
-- ============================================================================

CREATE TABLE IF NOT EXISTS packages (
    product_ndc TEXT NOT NULL REFERENCES products(product_ndc) ON DELETE CASCADE,
    ndc TEXT NOT NULL,                            -- as published
    position INTEGER NOT NULL,                    -- order within the product
    description TEXT,
    marketing_end_date TEXT,
    sample INTEGER,
    count REAL,                                   -- out-of-band unit count
    PRIMARY KEY (product_ndc, ndc)
);

CREATE INDEX IF NOT EXISTS idx_packages_ndc ON packages(ndc);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
    }
}
