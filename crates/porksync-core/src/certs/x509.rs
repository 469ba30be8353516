// # X.509 Expiry Check
//
// Reads the first certificate of a PEM file and compares its notAfter
// with now + window, the same question `openssl x509 -checkend` answers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::traits::{CertificateStatus, ExpiryCheck};

/// Expiry check that parses the certificate in-process
#[derive(Debug, Clone, Default)]
pub struct X509ExpiryCheck;

impl X509ExpiryCheck {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExpiryCheck for X509ExpiryCheck {
    async fn check(&self, cert_path: &Path, window: Duration) -> CertificateStatus {
        match tokio::fs::read(cert_path).await {
            Ok(pem) => inspect_pem(&pem, window, Utc::now()),
            Err(e) => CertificateStatus::Unreadable {
                reason: format!("cannot read {}: {}", cert_path.display(), e),
            },
        }
    }
}

/// Classify the first certificate in `pem` against `now + window`
pub fn inspect_pem(pem: &[u8], window: Duration, now: DateTime<Utc>) -> CertificateStatus {
    let (_, pem) = match x509_parser::pem::parse_x509_pem(pem) {
        Ok(parsed) => parsed,
        Err(e) => {
            return CertificateStatus::Unreadable {
                reason: format!("not a PEM certificate: {}", e),
            };
        }
    };

    let cert = match pem.parse_x509() {
        Ok(cert) => cert,
        Err(e) => {
            return CertificateStatus::Unreadable {
                reason: format!("invalid X.509 certificate: {}", e),
            };
        }
    };

    let Some(not_after) = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
    else {
        return CertificateStatus::Unreadable {
            reason: "certificate expiry out of range".to_string(),
        };
    };

    let deadline = chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_add_signed(window));

    match deadline {
        Some(deadline) if not_after > deadline => CertificateStatus::Valid { not_after },
        _ => CertificateStatus::Expiring { not_after },
    }
}
