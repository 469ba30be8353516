//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Discovering this machine's address once per run
//! - Fetching each domain's record set from the registrar
//! - Comparing every A record against its resolved target
//! - Correcting mismatches immediately via the registrar
//! - Refreshing certificate material for domains carrying `__ssl`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐
//! │ Catalogue(s)│────▶│    Reconciler    │
//! └─────────────┘     └──────────────────┘
//!                              │
//!         ┌────────────────────┼─────────────────────┐
//!         │                    │                     │
//!         ▼                    ▼                     ▼
//! ┌───────────────┐   ┌─────────────────┐   ┌─────────────────────┐
//! │AddressResolver│   │    Registrar    │   │CertificateRefresher │
//! │ (targets)     │   │ (read/correct)  │   │ (__ssl domains)     │
//! └───────────────┘   └─────────────────┘   └─────────────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Discover own address (fatal on failure)
//! 2. For each domain: retrieve remote records (domain skipped on failure)
//! 3. For each target: resolve, compare, edit on mismatch
//! 4. Refresh certificates if the domain has `__ssl`
//!
//! ## Failure Scoping
//!
//! | Failure                         | Scope        |
//! |---------------------------------|--------------|
//! | own address discovery           | run aborted  |
//! | malformed A record content      | run aborted  |
//! | record retrieval                | domain       |
//! | resolution, rejected entry      | entry        |
//! | edit                            | record       |
//! | certificate refresh             | that refresh |

use std::fmt;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

use crate::certs::{CertificateRefresher, RefreshOutcome};
use crate::config::{Catalogue, Credentials, Entry};
use crate::error::Result;
use crate::resolver::{AddressResolver, parse_ipv4};
use crate::traits::{EditResult, Record, RecordEdit, Registrar, RemoteRecordSet};

/// A remote A record whose content differs from its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// The record as the registrar reported it
    pub record: Record,
    /// Address the registrar currently holds
    pub current: Ipv4Addr,
    /// Address the record should carry
    pub target: Ipv4Addr,
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Stale A records found
    pub mismatches: usize,
    /// Edits the registrar accepted
    pub updates_applied: usize,
    /// Edits logged but not sent (dry mode)
    pub updates_suppressed: usize,
    /// Edits that failed
    pub updates_failed: usize,
    /// Rejected or unresolvable entries
    pub entries_skipped: usize,
    /// Domains whose records could not be retrieved
    pub domains_skipped: usize,
    /// Certificate bundles written
    pub certificates_refreshed: usize,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mismatches, {} applied, {} suppressed, {} failed, \
            {} entries skipped, {} domains skipped, {} certificates refreshed",
            self.mismatches,
            self.updates_applied,
            self.updates_suppressed,
            self.updates_failed,
            self.entries_skipped,
            self.domains_skipped,
            self.certificates_refreshed
        )
    }
}

/// Compare the A records named `fqdn` against `target`
///
/// # Returns
///
/// - `Ok(Vec<Mismatch>)`: One entry per stale record, in registrar order;
///   empty if no record carries this name
/// - `Err(Error::Parse)`: A matching record's content is not a dotted quad
pub fn find_mismatches(
    remote: &RemoteRecordSet,
    fqdn: &str,
    target: Ipv4Addr,
) -> Result<Vec<Mismatch>> {
    let mut mismatches = Vec::new();

    for record in remote.a_records_named(fqdn) {
        let current = parse_ipv4(&record.content)?;
        if current != target {
            mismatches.push(Mismatch {
                record: record.clone(),
                current,
                target,
            });
        }
    }

    Ok(mismatches)
}

/// Core reconciliation engine
///
/// One [`Reconciler::run()`] is one pass over the catalogues. Everything
/// happens sequentially in catalogue order; nothing is cached between runs.
pub struct Reconciler {
    /// Registrar holding the authoritative records
    registrar: Box<dyn Registrar>,

    /// Turns catalogue addresses into IPv4 targets
    resolver: AddressResolver,

    /// Certificate refresher, `None` disables certificate handling
    refresher: Option<CertificateRefresher>,
}

impl Reconciler {
    /// Create a reconciler without certificate handling
    ///
    /// # Parameters
    ///
    /// - `registrar`: Registrar implementation
    /// - `resolver`: Address resolver
    pub fn new(registrar: Box<dyn Registrar>, resolver: AddressResolver) -> Self {
        Self {
            registrar,
            resolver,
            refresher: None,
        }
    }

    /// Enable certificate refresh for `__ssl` domains
    pub fn with_certificates(mut self, refresher: CertificateRefresher) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The pass completed; skipped domains and entries
    ///   are counted in the report
    /// - `Err(Error)`: A run-fatal failure (own address discovery or a
    ///   malformed remote A record)
    pub async fn run(&self, catalogues: &[Catalogue]) -> Result<RunReport> {
        let mut report = RunReport::default();

        let Some(first) = catalogues.first() else {
            info!("No catalogues loaded, nothing to do");
            return Ok(report);
        };

        if self.registrar.is_dry_run() {
            info!("Running in dry mode, no records will be changed");
        }

        let own_address = self.registrar.discover_own_ip(&first.credentials).await?;
        info!("Own address is {}", own_address);

        for catalogue in catalogues {
            debug!(
                "Catalogue {}: {} domains, {} targets",
                catalogue.source.display(),
                catalogue.domains.len(),
                catalogue.target_count()
            );

            for rejected in &catalogue.rejected {
                error!(
                    "Skipping invalid entry {} in {}: {}",
                    rejected.name,
                    catalogue.source.display(),
                    rejected.reason
                );
                report.entries_skipped += 1;
            }

            for (domain, entry) in &catalogue.domains {
                self.reconcile_domain(domain, entry, &catalogue.credentials, own_address, &mut report)
                    .await?;
            }
        }

        info!("Run finished: {}", report);

        Ok(report)
    }

    /// Reconcile every target of one domain, then refresh its certificate
    async fn reconcile_domain(
        &self,
        domain: &str,
        entry: &Entry,
        credentials: &Credentials,
        own_address: Ipv4Addr,
        report: &mut RunReport,
    ) -> Result<()> {
        info!("Starting routine check for {}", domain);

        let remote = match self.registrar.retrieve_records(domain, credentials).await {
            Ok(remote) => remote,
            Err(e) => {
                error!("Failed retrieving records for {}, skipping domain: {}", domain, e);
                report.domains_skipped += 1;
                return Ok(());
            }
        };
        debug!("Registrar holds {} records for {}", remote.records.len(), domain);

        for target in entry.targets(domain) {
            let resolved = match self.resolver.resolve(&target.address, own_address).await {
                Ok(ip) => ip,
                Err(e) => {
                    warn!("Skipping {}: {}", target.fqdn, e);
                    report.entries_skipped += 1;
                    continue;
                }
            };

            let mismatches = find_mismatches(&remote, &target.fqdn, resolved)?;
            if mismatches.is_empty() {
                debug!("{} is in sync ({})", target.fqdn, resolved);
            }

            for mismatch in mismatches {
                report.mismatches += 1;
                self.correct(&mismatch, credentials, report).await;
            }
        }

        if let (Some(refresher), Some(dir)) = (&self.refresher, entry.ssl_path()) {
            match refresher
                .refresh(self.registrar.as_ref(), domain, dir, credentials)
                .await
            {
                Ok(RefreshOutcome::Replaced) => report.certificates_refreshed += 1,
                Ok(outcome) => debug!("Certificate refresh for {}: {:?}", domain, outcome),
                Err(e) => error!("Certificate refresh for {} failed: {}", domain, e),
            }
        }

        Ok(())
    }

    /// Send the corrective edit for one mismatch
    async fn correct(&self, mismatch: &Mismatch, credentials: &Credentials, report: &mut RunReport) {
        let record = &mismatch.record;
        info!(
            "Mismatched IPs for {} (record {}): registrar has {}, should be {}",
            record.name, record.id, mismatch.current, mismatch.target
        );

        let edit = match RecordEdit::for_record(record, mismatch.target) {
            Ok(edit) => edit,
            Err(e) => {
                error!("Cannot update {}: {}", record.name, e);
                report.updates_failed += 1;
                return;
            }
        };

        match self.registrar.edit_record(&edit, credentials).await {
            Ok(EditResult::Applied) => {
                info!("Updated {} -> {}", record.name, mismatch.target);
                report.updates_applied += 1;
            }
            Ok(EditResult::DryRun) => {
                report.updates_suppressed += 1;
            }
            Err(e) => {
                error!("Failed updating {}: {}", record.name, e);
                report.updates_failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> RemoteRecordSet {
        RemoteRecordSet::new(vec![
            Record::a("1", "a.example.com", "1.1.1.1"),
            Record::a("2", "b.example.com", "2.2.2.2"),
        ])
    }

    #[test]
    fn test_matching_record_is_not_a_mismatch() {
        let found = find_mismatches(&remote(), "a.example.com", Ipv4Addr::new(1, 1, 1, 1)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_differing_record_is_a_mismatch() {
        let found = find_mismatches(&remote(), "b.example.com", Ipv4Addr::new(9, 9, 9, 9)).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record.id, "2");
        assert_eq!(found[0].current, Ipv4Addr::new(2, 2, 2, 2));
        assert_eq!(found[0].target, Ipv4Addr::new(9, 9, 9, 9));
    }

    #[test]
    fn test_unknown_name_is_silent() {
        let found = find_mismatches(&remote(), "c.example.com", Ipv4Addr::new(9, 9, 9, 9)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_malformed_content_is_parse_error() {
        let remote = RemoteRecordSet::new(vec![Record::a("1", "a.example.com", "1.2.3")]);
        let err = find_mismatches(&remote, "a.example.com", Ipv4Addr::new(1, 2, 3, 4)).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_non_a_records_are_ignored() {
        let mut txt = Record::a("1", "a.example.com", "v=spf1 -all");
        txt.record_type = "TXT".to_string();
        let remote = RemoteRecordSet::new(vec![txt]);

        let found = find_mismatches(&remote, "a.example.com", Ipv4Addr::new(1, 2, 3, 4)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_summary_names_every_counter() {
        let report = RunReport {
            mismatches: 3,
            updates_applied: 1,
            updates_suppressed: 2,
            updates_failed: 0,
            entries_skipped: 4,
            domains_skipped: 5,
            certificates_refreshed: 6,
        };

        assert_eq!(
            report.to_string(),
            "3 mismatches, 1 applied, 2 suppressed, 0 failed, \
            4 entries skipped, 5 domains skipped, 6 certificates refreshed"
        );
    }
}
