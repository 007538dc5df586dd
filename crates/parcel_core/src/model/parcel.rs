//! Parcel record and lifecycle status.
//!
//! # Responsibility
//! - Define the single persisted entity of the tracker.
//! - Own the gate predicate that decides whether a parcel is still mutable.
//!
//! # Invariants
//! - `number == 0` means "not yet persisted".
//! - `created_at` is an ISO-8601 date-time (RFC3339 when written by this
//!   crate) and never changes after insert.
//! - Status strings are free-form; only `registered` opens the gate.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned parcel identifier.
pub type ParcelNumber = i64;

/// Identifier of the client that owns a parcel.
pub type ClientId = i64;

/// Value of `number` before storage has assigned one.
pub const UNASSIGNED_NUMBER: ParcelNumber = 0;

/// ISO-8601 date-time layouts accepted besides strict RFC3339.
/// `%.f` also matches a missing fractional part.
const OFFSET_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];
const LOCAL_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Lifecycle status of a parcel.
///
/// Storage keeps the status as plain text, so statuses written by other
/// tools survive a round-trip as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParcelStatus {
    /// Accepted but not yet handed to the carrier. The only mutable state.
    Registered,
    /// In transit.
    Sent,
    /// Handed to the recipient.
    Delivered,
    /// Any status text this build does not recognize.
    Other(String),
}

impl ParcelStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Registered => "registered",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Returns whether address changes and deletion are allowed.
    pub fn is_mutable(&self) -> bool {
        matches!(self, Self::Registered)
    }

    /// Next status in the regular delivery flow, if there is one.
    pub fn next(&self) -> Option<ParcelStatus> {
        match self {
            Self::Registered => Some(Self::Sent),
            Self::Sent => Some(Self::Delivered),
            Self::Delivered | Self::Other(_) => None,
        }
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ParcelStatus {
    fn from(value: &str) -> Self {
        match value {
            "registered" => Self::Registered,
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ParcelStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "registered" | "sent" | "delivered" => Self::from(value.as_str()),
            _ => Self::Other(value),
        }
    }
}

impl From<ParcelStatus> for String {
    fn from(value: ParcelStatus) -> Self {
        match value {
            ParcelStatus::Other(text) => text,
            known => known.as_str().to_string(),
        }
    }
}

/// A tracked shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// Storage-assigned identifier, `0` until inserted.
    pub number: ParcelNumber,
    pub client: ClientId,
    pub status: ParcelStatus,
    pub address: String,
    /// ISO-8601 creation timestamp, with or without an offset.
    pub created_at: String,
}

/// Reasons a parcel is rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParcelValidationError {
    EmptyStatus,
    InvalidCreatedAt(String),
    NumberAlreadyAssigned(ParcelNumber),
}

impl Display for ParcelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStatus => write!(f, "parcel status cannot be empty"),
            Self::InvalidCreatedAt(value) => {
                write!(f, "created_at `{value}` is not an ISO-8601 date-time")
            }
            Self::NumberAlreadyAssigned(number) => {
                write!(f, "parcel already carries number {number}; storage assigns numbers")
            }
        }
    }
}

impl Error for ParcelValidationError {}

impl Parcel {
    /// Creates a `registered` parcel stamped with the current UTC time.
    pub fn new(client: ClientId, address: impl Into<String>) -> Self {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Self::with_created_at(client, address, created_at)
    }

    /// Creates a `registered` parcel with a caller-provided timestamp.
    ///
    /// Used by imports and fixtures; the timestamp is checked by `validate`.
    pub fn with_created_at(
        client: ClientId,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            number: UNASSIGNED_NUMBER,
            client,
            status: ParcelStatus::Registered,
            address: address.into(),
            created_at: created_at.into(),
        }
    }

    /// Checks field-level invariants shared by reads and writes.
    pub fn validate(&self) -> Result<(), ParcelValidationError> {
        if self.status.as_str().trim().is_empty() {
            return Err(ParcelValidationError::EmptyStatus);
        }
        if !is_iso8601_date_time(&self.created_at) {
            return Err(ParcelValidationError::InvalidCreatedAt(
                self.created_at.clone(),
            ));
        }
        Ok(())
    }

    /// Checks that this parcel can be inserted as a new row.
    pub fn validate_new(&self) -> Result<(), ParcelValidationError> {
        if self.number != UNASSIGNED_NUMBER {
            return Err(ParcelValidationError::NumberAlreadyAssigned(self.number));
        }
        self.validate()
    }

    pub fn is_mutable(&self) -> bool {
        self.status.is_mutable()
    }

    pub fn is_persisted(&self) -> bool {
        self.number != UNASSIGNED_NUMBER
    }
}

/// Accepts RFC3339 plus the ISO-8601 variants SQLite and other writers use:
/// `T` or space separator, optional offset, optional fractional seconds.
pub fn is_iso8601_date_time(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || OFFSET_LAYOUTS
            .iter()
            .any(|layout| DateTime::parse_from_str(value, layout).is_ok())
        || LOCAL_LAYOUTS
            .iter()
            .any(|layout| NaiveDateTime::parse_from_str(value, layout).is_ok())
}
