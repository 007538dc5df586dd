//! Parcel repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `parcel` table keyed by storage-assigned numbers.
//! - Gate address changes and deletion on `ParcelStatus::is_mutable`.
//!
//! # Invariants
//! - `add` never reports success without the assigned number.
//! - `set_status` is unconditional; any status may follow any other.
//! - Rows decode by ordinal: number, client, status, address, created_at.
//!
//! # Known limitation
//! With `GateMode::CheckThenAct` the gate read and the write are separate
//! statements, so a concurrent status change between them is not observed.
//! `GateMode::Transactional` runs both under one `BEGIN IMMEDIATE`, or under a
//! savepoint when the caller already has a transaction open.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::parcel::{
    ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError,
};
use log::{debug, warn};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PARCEL_TABLE: &str = "parcel";
const GATE_SAVEPOINT: &str = "parcel_gate";
const PARCEL_COLUMNS: [&str; 5] = ["number", "client", "status", "address", "created_at"];

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

pub type RepoResult<T> = Result<T, RepoError>;

/// Operation guarded by the registered-status gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedOperation {
    ChangeAddress,
    Delete,
}

impl GatedOperation {
    fn as_str(self) -> &'static str {
        match self {
            Self::ChangeAddress => "change_address",
            Self::Delete => "delete",
        }
    }
}

impl Display for GatedOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How gated operations combine their status check with the write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GateMode {
    /// Read, check, then write as separate statements.
    #[default]
    CheckThenAct,
    /// Check and write inside one immediate transaction.
    ///
    /// When the borrowed connection is already inside a caller transaction,
    /// the pair runs under a `SAVEPOINT` instead, and locking follows the
    /// caller's transaction (a deferred outer transaction takes the write
    /// lock only at the first write).
    Transactional,
}

/// Error returned by parcel repository operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ParcelValidationError),
    Db(DbError),
    NotFound(ParcelNumber),
    InvalidStateTransition {
        number: ParcelNumber,
        operation: GatedOperation,
        status: ParcelStatus,
    },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(number) => write!(f, "parcel not found: {number}"),
            Self::InvalidStateTransition {
                number,
                operation,
                status,
            } => write!(
                f,
                "parcel {number}: {operation} is only allowed while status is registered, current status is `{status}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted parcel data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it through db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParcelValidationError> for RepoError {
    fn from(value: ParcelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Storage(value))
    }
}

/// Repository interface for parcel persistence.
pub trait ParcelRepository {
    /// Inserts a new parcel and returns its storage-assigned number.
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber>;
    /// Loads one parcel, or `NotFound`.
    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel>;
    /// Loads every parcel of `client` in insertion order.
    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>>;
    /// Overwrites the status regardless of the current one.
    fn set_status(&self, number: ParcelNumber, status: &ParcelStatus) -> RepoResult<()>;
    /// Replaces the address of a `registered` parcel.
    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()>;
    /// Removes a `registered` parcel.
    fn delete(&self, number: ParcelNumber) -> RepoResult<()>;
}

/// SQLite-backed parcel repository borrowing a migrated connection.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
    gate_mode: GateMode,
}

impl<'conn> SqliteParcelRepository<'conn> {
    /// Wraps `conn` after checking it carries the current parcel schema.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   does not have the shape this repository decodes.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            gate_mode: GateMode::default(),
        })
    }

    /// Switches how gated operations are executed.
    pub fn with_gate_mode(mut self, gate_mode: GateMode) -> Self {
        self.gate_mode = gate_mode;
        self
    }

    pub fn gate_mode(&self) -> GateMode {
        self.gate_mode
    }

    fn run_gated(
        &self,
        number: ParcelNumber,
        operation: GatedOperation,
        write: impl FnOnce(&Connection) -> RepoResult<()>,
    ) -> RepoResult<()> {
        match self.gate_mode {
            GateMode::CheckThenAct => {
                check_gate(self.conn, number, operation)?;
                write(self.conn)
            }
            GateMode::Transactional if !self.conn.is_autocommit() => {
                self.conn.execute_batch(&format!("SAVEPOINT {GATE_SAVEPOINT};"))?;
                match check_gate(self.conn, number, operation).and_then(|()| write(self.conn)) {
                    Ok(()) => {
                        self.conn.execute_batch(&format!("RELEASE {GATE_SAVEPOINT};"))?;
                        Ok(())
                    }
                    Err(err) => {
                        if let Err(rollback_err) = self.conn.execute_batch(&format!(
                            "ROLLBACK TO {GATE_SAVEPOINT}; RELEASE {GATE_SAVEPOINT};"
                        )) {
                            warn!(
                                "event=parcel_gate_rollback module=repo status=error number={number} error={rollback_err}"
                            );
                        }
                        Err(err)
                    }
                }
            }
            GateMode::Transactional => {
                // Dropping `tx` on any early return rolls the check back.
                let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
                let conn: &Connection = &tx;
                check_gate(conn, number, operation)?;
                write(conn)?;
                tx.commit()?;
                Ok(())
            }
        }
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        parcel.validate_new()?;

        let number: ParcelNumber = self.conn.query_row(
            "INSERT INTO parcel (client, status, address, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING number;",
            params![
                parcel.client,
                parcel.status.as_str(),
                parcel.address.as_str(),
                parcel.created_at.as_str(),
            ],
            |row| row.get(0),
        )?;

        if number <= 0 {
            return Err(RepoError::InvalidData(format!(
                "storage assigned non-positive parcel number {number}"
            )));
        }

        debug!(
            "event=parcel_add module=repo status=ok number={number} client={}",
            parcel.client
        );
        Ok(number)
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        load_parcel(self.conn, number)
    }

    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARCEL_SELECT_SQL}
             WHERE client = ?1
             ORDER BY number ASC;"
        ))?;
        let mut rows = stmt.query([client])?;
        let mut parcels = Vec::new();

        while let Some(row) = rows.next()? {
            parcels.push(parse_parcel_row(row)?);
        }

        Ok(parcels)
    }

    fn set_status(&self, number: ParcelNumber, status: &ParcelStatus) -> RepoResult<()> {
        if status.as_str().trim().is_empty() {
            return Err(ParcelValidationError::EmptyStatus.into());
        }

        let changed = self.conn.execute(
            "UPDATE parcel SET status = ?1 WHERE number = ?2;",
            params![status.as_str(), number],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(number));
        }

        debug!("event=parcel_set_status module=repo status=ok number={number} new_status={status}");
        Ok(())
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        self.run_gated(number, GatedOperation::ChangeAddress, |conn| {
            let changed = conn.execute(
                "UPDATE parcel SET address = ?1 WHERE number = ?2;",
                params![address, number],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(number));
            }
            Ok(())
        })
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        self.run_gated(number, GatedOperation::Delete, |conn| {
            let changed = conn.execute("DELETE FROM parcel WHERE number = ?1;", [number])?;
            if changed == 0 {
                return Err(RepoError::NotFound(number));
            }
            debug!("event=parcel_delete module=repo status=ok number={number}");
            Ok(())
        })
    }
}

fn check_gate(
    conn: &Connection,
    number: ParcelNumber,
    operation: GatedOperation,
) -> RepoResult<()> {
    let parcel = load_parcel(conn, number)?;
    if parcel.is_mutable() {
        return Ok(());
    }

    warn!(
        "event=parcel_gate_denied module=repo status=denied number={number} operation={operation} current_status={}",
        parcel.status
    );
    Err(RepoError::InvalidStateTransition {
        number,
        operation,
        status: parcel.status,
    })
}

fn load_parcel(conn: &Connection, number: ParcelNumber) -> RepoResult<Parcel> {
    let mut stmt = conn.prepare(&format!("{PARCEL_SELECT_SQL} WHERE number = ?1;"))?;
    let mut rows = stmt.query([number])?;

    match rows.next()? {
        Some(row) => parse_parcel_row(row),
        None => Err(RepoError::NotFound(number)),
    }
}

fn parse_parcel_row(row: &Row<'_>) -> RepoResult<Parcel> {
    let parcel = Parcel {
        number: column(row, 0)?,
        client: column(row, 1)?,
        status: ParcelStatus::from(column::<String>(row, 2)?),
        address: column(row, 3)?,
        created_at: column(row, 4)?,
    };

    parcel
        .validate()
        .map_err(|err| decode_failed(format!("parcel {}: {err}", parcel.number)))?;
    Ok(parcel)
}

fn column<T: rusqlite::types::FromSql>(row: &Row<'_>, index: usize) -> RepoResult<T> {
    row.get(index).map_err(|err| {
        decode_failed(format!(
            "cannot decode column `{}`: {err}",
            PARCEL_COLUMNS[index]
        ))
    })
}

fn decode_failed(message: String) -> RepoError {
    warn!("event=parcel_decode_failed module=repo status=error error={message}");
    RepoError::InvalidData(message)
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [PARCEL_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Err(RepoError::MissingRequiredTable(PARCEL_TABLE));
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let present = stmt
        .query_map([PARCEL_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(missing) = PARCEL_COLUMNS
        .into_iter()
        .find(|required| !present.iter().any(|name| name.as_str() == *required))
    {
        return Err(RepoError::MissingRequiredColumn {
            table: PARCEL_TABLE,
            column: missing,
        });
    }

    Ok(())
}
