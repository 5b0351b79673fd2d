//! Debrid storage services.
//!
//! This module provides the `StorageBackend` trait implemented per provider,
//! the StremThru backend every provider is reached through, the registry
//! that builds a backend from a user profile and the availability resolver
//! that folds cache checks into candidate lists.

mod availability;
mod registry;
mod stremthru;
mod transfer;
mod types;

pub use availability::{
    AvailabilityRequest, AvailabilityResolver, EXPIRED_KEY_MESSAGE, PASSKEY_REQUIRED_MESSAGE,
};
pub use registry::{BackendFactory, DebridRegistry};
pub use stremthru::{store_short_name, StremThruBackend, StremThruOptions, STREMTHRU_ID};
pub use transfer::wait_for_files;
pub use types::*;
