//! Where the parcel table lives: connection setup and schema upkeep.
//!
//! Repositories borrow a connection produced here and assume the `parcel`
//! table is already at `migrations::latest_version()`. The version number
//! is kept in `PRAGMA user_version`, so an older binary refuses a tracker
//! file written by a newer one instead of misreading its rows.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening, migrating or querying the tracker database.
#[derive(Debug)]
pub enum DbError {
    /// Any error reported by SQLite, passed through unchanged.
    Storage(rusqlite::Error),
    /// The tracker file was migrated by a newer build.
    SchemaTooNew { found: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "parcel storage failed: {err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "tracker database is at schema version {found}, this build reads up to {supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value)
    }
}
