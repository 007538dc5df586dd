//! Parcel tracking use-cases.
//!
//! # Responsibility
//! - Register parcels and walk them through the delivery flow.
//! - Delegate persistence and gating to a `ParcelRepository`.
//!
//! # Invariants
//! - Gate decisions stay in the repository; this layer only forwards them.
//! - `advance_status` never moves a parcel past `delivered`.

use crate::model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus};
use crate::repo::parcel_repo::{ParcelRepository, RepoResult};
use log::info;

/// Parcel workflow service over any repository implementation.
pub struct ParcelService<R: ParcelRepository> {
    repo: R,
}

impl<R: ParcelRepository> ParcelService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new parcel for `client` and returns the stored record.
    pub fn register(&self, client: ClientId, address: impl Into<String>) -> RepoResult<Parcel> {
        let mut parcel = Parcel::new(client, address);
        parcel.number = self.repo.add(&parcel)?;

        info!(
            "event=parcel_register module=service status=ok number={} client={client}",
            parcel.number
        );
        Ok(parcel)
    }

    pub fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        self.repo.get(number)
    }

    pub fn parcels_for_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        self.repo.get_by_client(client)
    }

    /// Moves a parcel one step along registered -> sent -> delivered.
    ///
    /// Returns the status the parcel ends up with. A parcel without a
    /// successor status is left untouched.
    pub fn advance_status(&self, number: ParcelNumber) -> RepoResult<ParcelStatus> {
        let parcel = self.repo.get(number)?;
        let Some(next) = parcel.status.next() else {
            return Ok(parcel.status);
        };

        self.repo.set_status(number, &next)?;
        info!(
            "event=parcel_advance module=service status=ok number={number} from={} to={next}",
            parcel.status
        );
        Ok(next)
    }

    /// Changes the delivery address; only allowed while `registered`.
    pub fn change_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        self.repo.set_address(number, address)
    }

    /// Cancels (deletes) a parcel; only allowed while `registered`.
    pub fn cancel(&self, number: ParcelNumber) -> RepoResult<()> {
        self.repo.delete(number)?;
        info!("event=parcel_cancel module=service status=ok number={number}");
        Ok(())
    }
}
