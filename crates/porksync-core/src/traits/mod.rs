//! Core traits for porksync
//!
//! This module defines the abstract interfaces the reconciler drives.
//!
//! - [`Registrar`]: Registrar API (own address, records, edits, certificates)
//! - [`HostLookup`]: Forward DNS lookups for catalogue hostnames
//! - [`ExpiryCheck`]: Local certificate expiry inspection

pub mod expiry_check;
pub mod host_lookup;
pub mod registrar;

pub use expiry_check::{CertificateStatus, ExpiryCheck};
pub use host_lookup::HostLookup;
pub use registrar::{
    CertificateBundle, EditResult, Record, RecordEdit, Registrar, RemoteRecordSet, split_apex,
};
