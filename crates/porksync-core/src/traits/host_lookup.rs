// # Host Lookup Trait
//
// Defines the interface for forward DNS lookups of catalogue hostnames.
//
// ## Implementations
//
// - System resolver: [`SystemLookup`](crate::resolver::SystemLookup)
// - Tests: static tables in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use porksync_core::HostLookup;
//
// let addrs = lookup.lookup("home.example.net").await?;
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for forward DNS lookup implementations
///
/// Implementations return every address the lookup produced, in answer
/// order. Picking the address to use is the
/// [`AddressResolver`](crate::resolver::AddressResolver)'s job.
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Look up the addresses for `host`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<IpAddr>)`: Addresses in answer order (possibly empty)
    /// - `Err(Error::Resolution)`: The lookup itself failed
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, crate::Error>;
}
