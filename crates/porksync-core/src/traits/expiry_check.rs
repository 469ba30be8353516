// # Expiry Check Trait
//
// Decides whether a local certificate stays valid for a look-ahead window.
//
// ## Implementations
//
// - X.509 PEM parsing: [`X509ExpiryCheck`](crate::certs::X509ExpiryCheck)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

/// Outcome of inspecting a certificate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    /// Still valid once the window has passed
    Valid {
        /// Expiry of the certificate
        not_after: DateTime<Utc>,
    },
    /// Expires within the window (or already has)
    Expiring {
        /// Expiry of the certificate
        not_after: DateTime<Utc>,
    },
    /// Missing or unparsable; treated as expiring
    Unreadable {
        /// What went wrong
        reason: String,
    },
}

impl CertificateStatus {
    /// Whether fresh material should be fetched
    pub fn needs_renewal(&self) -> bool {
        !matches!(self, CertificateStatus::Valid { .. })
    }
}

/// Trait for certificate expiry checks
#[async_trait]
pub trait ExpiryCheck: Send + Sync {
    /// Inspect the certificate at `cert_path`
    ///
    /// This never fails: a certificate that cannot be read or parsed is
    /// reported as [`CertificateStatus::Unreadable`].
    async fn check(&self, cert_path: &Path, window: Duration) -> CertificateStatus;
}
