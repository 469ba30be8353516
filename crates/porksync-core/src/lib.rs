// # porksync-core
//
// Core library for porksync, the A record reconciler.
//
// ## Architecture Overview
//
// - **Catalogue**: Declarative desired state, loaded from YAML
// - **AddressResolver**: Turns catalogue addresses into IPv4 targets
// - **Registrar**: Trait for the registrar holding the authoritative records
// - **Reconciler**: Compares remote A records with their targets and corrects them
// - **CertificateRefresher**: Replaces certificate material near expiry
//
// ## Design Principles
//
// 1. **Core-first**: Decisions live here; providers only talk HTTP
// 2. **Fresh every run**: Nothing is cached between runs
// 3. **Scoped failures**: Only run-fatal errors abort the whole pass

pub mod certs;
pub mod config;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod traits;

// Re-export core types for convenience
pub use certs::{CertificateRefresher, RefreshOutcome, X509ExpiryCheck};
pub use config::{AddressSpec, Catalogue, CredentialDefaults, Credentials, Entry, load_catalogues};
pub use engine::{Mismatch, Reconciler, RunReport, find_mismatches};
pub use error::{Error, Result};
pub use resolver::{AddressResolver, SystemLookup, parse_ipv4};
pub use traits::{ExpiryCheck, HostLookup, Registrar};
