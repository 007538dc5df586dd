//! Domain model for tracked parcels.
//!
//! # Invariants
//! - A parcel is identified by its storage-assigned `ParcelNumber`.
//! - Address and existence may only change while the parcel is `registered`.

pub mod parcel;
