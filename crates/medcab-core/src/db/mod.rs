//! SQLite persistence for the inventory core.
//!
//! One [`Database`] owns one connection. Reads and single-row writes go
//! through `&self` methods; anything that must land atomically (checkout
//! commits, batch check-in) borrows the database mutably and runs its
//! statements inside [`Database::transaction`].

mod schema;
mod drugs;
mod lots;
pub(crate) mod units;
pub(crate) mod transactions;
mod reports;

pub use schema::*;
#[allow(unused_imports)]
pub use drugs::*;
#[allow(unused_imports)]
pub use lots::*;
pub use units::*;
pub use transactions::*;
pub use reports::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Owns the SQLite connection and applies the schema on open.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database file at `path`, creating and migrating as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Fresh in-memory database. Every test starts from one of these.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Raw connection, for one-off queries the typed methods don't cover.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a SQLite transaction. Dropping it without committing rolls back.
    pub fn transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}
