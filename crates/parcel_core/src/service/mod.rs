//! Use-case services layered over repositories.
//!
//! # Invariants
//! - Services never touch SQL directly.

pub mod parcel_service;
