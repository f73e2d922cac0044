//! SQLite store for the product catalog.
//!
//! The store is the durable copy; calculations run against the in-memory
//! [`Catalog`](crate::catalog::Catalog) built by `load_catalog`.

mod catalog;
mod schema;

pub use schema::*;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

/// Catalog store errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Catalog store has schema version {found}, this build supports {supported}")]
    UnsupportedSchema { found: i32, supported: i32 },
}

pub type DbResult<T> = Result<T, DbError>;

/// Connection to a catalog store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a store file.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        // Several processes may read one shared catalog file
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> DbResult<Self> {
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Create tables on a fresh store and stamp its version.
    fn migrate(&self) -> DbResult<()> {
        let found = self.schema_version()?;
        if found > SCHEMA_VERSION {
            return Err(DbError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        self.conn.execute_batch(SCHEMA)?;
        if found < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
            debug!(from = found, to = SCHEMA_VERSION, "catalog store schema stamped");
        }
        Ok(())
    }

    /// Schema version recorded in the store (0 for a new file).
    pub fn schema_version(&self) -> DbResult<i32> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Raw connection, for ad hoc queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
