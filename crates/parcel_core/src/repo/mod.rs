//! Repository layer over the `parcel` table.
//!
//! # Responsibility
//! - Translate parcel use-cases into parameterized SQLite statements.
//! - Enforce the status gate on address changes and deletion.
//!
//! # Invariants
//! - Writes validate the parcel before any SQL runs.
//! - Missing rows surface as `RepoError::NotFound`, never as empty values.
//! - Undecodable rows abort the enclosing read with `RepoError::InvalidData`.

pub mod parcel_repo;
