// # Registrar Trait
//
// Defines the interface to the registrar that holds the authoritative
// record set.
//
// ## Implementations
//
// - Porkbun: `porksync-provider-porkbun` crate
//
// ## Usage
//
// ```rust,ignore
// use porksync_core::Registrar;
//
// #[tokio::main]
// async fn main() -> porksync_core::Result<()> {
//     let registrar = /* Registrar implementation */;
//
//     let own_ip = registrar.discover_own_ip(&credentials).await?;
//     let remote = registrar.retrieve_records("example.com", &credentials).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

use crate::config::Credentials;
use crate::error::{Error, Result};

/// Record type this system manages
pub const RECORD_TYPE_A: &str = "A";

/// A DNS record as the registrar reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Registrar-assigned record ID
    pub id: String,
    /// Fully-qualified record name (e.g. "www.example.com")
    pub name: String,
    /// Record type ("A", "AAAA", "MX", ...)
    pub record_type: String,
    /// Record content, a dotted quad for A records
    pub content: String,
    pub ttl: Option<String>,
    pub priority: Option<String>,
    pub notes: Option<String>,
}

impl Record {
    /// Create an A record (mostly useful for tests and fixtures)
    pub fn a(id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            record_type: RECORD_TYPE_A.to_string(),
            content: content.into(),
            ttl: None,
            priority: None,
            notes: None,
        }
    }

    /// Whether this is an A record
    pub fn is_a(&self) -> bool {
        self.record_type == RECORD_TYPE_A
    }
}

/// The registrar's current record set for one domain
///
/// Only returned for a successful retrieval; a non-success status from the
/// registrar surfaces as [`Error::Provider`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRecordSet {
    /// Records in the order the registrar returned them
    pub records: Vec<Record>,
}

impl RemoteRecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// A records whose name equals `fqdn` exactly
    pub fn a_records_named<'a>(&'a self, fqdn: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .iter()
            .filter(move |record| record.is_a() && record.name == fqdn)
    }
}

/// Split a fully-qualified name into `(apex, name)`
///
/// The apex is the last two labels; the name is everything before it,
/// joined with dots, and empty for the apex itself.
///
/// Returns `None` for names with fewer than two labels.
pub fn split_apex(fqdn: &str) -> Option<(String, String)> {
    let labels: Vec<&str> = fqdn.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return None;
    }

    let split = labels.len() - 2;
    Some((labels[split..].join("."), labels[..split].join(".")))
}

/// A corrective edit of one existing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEdit {
    /// Apex domain the edit is addressed to
    pub apex: String,
    /// Record name relative to the apex ("" for the apex itself)
    pub name: String,
    /// Registrar record ID
    pub record_id: String,
    /// Record type, carried over from the original record
    pub record_type: String,
    /// New content
    pub content: Ipv4Addr,
}

impl RecordEdit {
    /// Build the edit that points `record` at `content`
    pub fn for_record(record: &Record, content: Ipv4Addr) -> Result<Self> {
        let (apex, name) = split_apex(&record.name).ok_or_else(|| {
            Error::Other(format!(
                "Record {} has no apex domain: {:?}",
                record.id, record.name
            ))
        })?;

        Ok(Self {
            apex,
            name,
            record_id: record.id.clone(),
            record_type: record.record_type.clone(),
            content,
        })
    }
}

/// Result of an edit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditResult {
    /// The registrar accepted the edit
    Applied,
    /// Dry mode: the edit was logged but not sent
    DryRun,
}

/// Certificate material for one domain
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    /// Full certificate chain
    pub certificate_chain: String,
    /// Intermediate certificate
    pub intermediate_certificate: String,
    /// Private key
    pub private_key: String,
    /// Public key
    pub public_key: String,
}

// Keeps the private key out of logs
impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("certificate_chain_len", &self.certificate_chain.len())
            .field("intermediate_certificate_len", &self.intermediate_certificate.len())
            .field("private_key", &"<REDACTED>")
            .field("public_key_len", &self.public_key.len())
            .finish()
    }
}

/// Trait for registrar client implementations
///
/// Implementations perform exactly one API call per method invocation and
/// hold no state between calls. They do not decide whether an edit is
/// needed or how a failure is scoped; both belong to the
/// [`Reconciler`](crate::engine::Reconciler).
///
/// A `status` other than success in a registrar response is reported as
/// [`Error::Provider`].
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Discover this machine's public IPv4 address as seen by the registrar
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The own address
    /// - `Err(Error::Parse)`: The registrar returned a malformed address
    /// - `Err(Error::Provider)`: Network failure or non-success status
    async fn discover_own_ip(&self, credentials: &Credentials) -> Result<Ipv4Addr>;

    /// Retrieve every record the registrar holds for `domain`
    async fn retrieve_records(
        &self,
        domain: &str,
        credentials: &Credentials,
    ) -> Result<RemoteRecordSet>;

    /// Point an existing record at new content
    ///
    /// In dry mode the intended payload is logged and
    /// [`EditResult::DryRun`] is returned without any network call.
    async fn edit_record(&self, edit: &RecordEdit, credentials: &Credentials)
    -> Result<EditResult>;

    /// Retrieve fresh certificate material for `domain`
    async fn retrieve_certificates(
        &self,
        domain: &str,
        credentials: &Credentials,
    ) -> Result<CertificateBundle>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Whether mutating calls are suppressed
    fn is_dry_run(&self) -> bool {
        false
    }
}
