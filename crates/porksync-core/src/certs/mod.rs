// # Certificate Refresher
//
// Keeps the PEM files of a domain carrying `__ssl` fresh.
//
// ## Files
//
// ```text
// <__ssl>/
//   ├── domain.cert.pem        # certificate chain, inspected for expiry
//   ├── intermediate.cert.pem
//   ├── private.key.pem
//   └── public.key.pem
// ```
//
// ## Writes
//
// All four files are written to `<name>.tmp` and synced first; only then is
// each renamed over the old one. A failed write leaves the old set in place.

pub mod x509;

pub use x509::X509ExpiryCheck;

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::traits::{CertificateBundle, ExpiryCheck, Registrar};

/// Certificate chain file, also the one checked for expiry
pub const CERTIFICATE_FILE: &str = "domain.cert.pem";

/// Intermediate certificate file
pub const INTERMEDIATE_FILE: &str = "intermediate.cert.pem";

/// Private key file
pub const PRIVATE_KEY_FILE: &str = "private.key.pem";

/// Public key file
pub const PUBLIC_KEY_FILE: &str = "public.key.pem";

/// Renew when the certificate expires within this window
pub const DEFAULT_RENEWAL_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of one refresh attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Valid beyond the window; nothing fetched or written
    StillValid,
    /// Fresh material written
    Replaced,
    /// The registrar did not hand out certificates; nothing written
    Declined {
        /// Registrar-side reason
        reason: String,
    },
    /// Dry mode: renewal needed but files left untouched
    DryRun,
}

/// Checks and replaces certificate material for `__ssl` domains
pub struct CertificateRefresher {
    check: Box<dyn ExpiryCheck>,
    window: Duration,
    dry_run: bool,
}

impl CertificateRefresher {
    /// Create a refresher
    ///
    /// # Parameters
    ///
    /// - `check`: Expiry check implementation
    /// - `window`: Renew when expiry falls within this window
    /// - `dry_run`: If true, report renewals without writing files
    pub fn new(check: Box<dyn ExpiryCheck>, window: Duration, dry_run: bool) -> Self {
        Self {
            check,
            window,
            dry_run,
        }
    }

    /// Create a refresher with the X.509 check and the 24 hour window
    pub fn x509(dry_run: bool) -> Self {
        Self::new(Box::new(X509ExpiryCheck::new()), DEFAULT_RENEWAL_WINDOW, dry_run)
    }

    /// Refresh the certificate material of `domain` in `dir` if needed
    ///
    /// # Returns
    ///
    /// - `Ok(RefreshOutcome)`: What happened; registrar refusals are
    ///   [`RefreshOutcome::Declined`], not errors
    /// - `Err(Error::Filesystem)`: Writing the new material failed
    pub async fn refresh(
        &self,
        registrar: &dyn Registrar,
        domain: &str,
        dir: &Path,
        credentials: &Credentials,
    ) -> Result<RefreshOutcome> {
        let cert_path = dir.join(CERTIFICATE_FILE);
        let status = self.check.check(&cert_path, self.window).await;

        if !status.needs_renewal() {
            debug!("Certificate for {} still valid: {:?}", domain, status);
            return Ok(RefreshOutcome::StillValid);
        }

        info!("Certificate for {} needs renewal: {:?}", domain, status);

        let bundle = match registrar.retrieve_certificates(domain, credentials).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Failed getting certificates for {}: {}", domain, e);
                return Ok(RefreshOutcome::Declined {
                    reason: e.to_string(),
                });
            }
        };

        if self.dry_run {
            info!(
                "[DRY-RUN] Would replace certificate material for {} in {}",
                domain,
                dir.display()
            );
            return Ok(RefreshOutcome::DryRun);
        }

        write_bundle(dir, &bundle).await?;
        info!("Updated certificates for {}", domain);

        Ok(RefreshOutcome::Replaced)
    }
}

/// Write all four PEM files of `bundle` into `dir`
///
/// Every file is staged and synced before the first rename. A failure while
/// staging removes the staged files and leaves the old material untouched.
pub async fn write_bundle(dir: &Path, bundle: &CertificateBundle) -> Result<()> {
    let files = [
        (CERTIFICATE_FILE, &bundle.certificate_chain),
        (INTERMEDIATE_FILE, &bundle.intermediate_certificate),
        (PRIVATE_KEY_FILE, &bundle.private_key),
        (PUBLIC_KEY_FILE, &bundle.public_key),
    ];

    let mut staged: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = dir.join(name);
        if let Err(e) = stage(&path, contents.as_bytes()).await {
            discard(&staged).await;
            return Err(e);
        }
        staged.push(path);
    }

    for (i, path) in staged.iter().enumerate() {
        if let Err(e) = tokio::fs::rename(tmp_path(path), path).await {
            discard(&staged[i..]).await;
            return Err(Error::filesystem(path, e.to_string()));
        }
    }

    Ok(())
}

/// Write `contents` to the temp file next to `path` and sync it
async fn stage(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = tmp_path(path);
    let fs_error = |e: std::io::Error| Error::filesystem(path, e.to_string());

    let mut file = tokio::fs::File::create(&tmp_path).await.map_err(fs_error)?;
    let written = async {
        file.write_all(contents).await?;
        file.sync_all().await
    }
    .await;
    drop(file);

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fs_error(e));
    }

    Ok(())
}

async fn discard(paths: &[PathBuf]) {
    for path in paths {
        let _ = tokio::fs::remove_file(tmp_path(path)).await;
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
