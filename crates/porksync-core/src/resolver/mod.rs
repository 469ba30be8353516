// # Address Resolution
//
// Turns a catalogue [`AddressSpec`] into the IPv4 address a record should
// carry, and parses registrar-supplied address literals.

pub mod system;

pub use system::SystemLookup;

use std::net::{IpAddr, Ipv4Addr};

use crate::config::AddressSpec;
use crate::error::{Error, Result};
use crate::traits::HostLookup;

/// Parse a dotted-quad IPv4 literal
///
/// Exactly four decimal octets in `0..=255` are accepted; anything else is
/// [`Error::Parse`].
pub fn parse_ipv4(literal: &str) -> Result<Ipv4Addr> {
    let octets: Vec<&str> = literal.trim().split('.').collect();
    if octets.len() != 4 {
        return Err(Error::parse(literal));
    }

    let mut parsed = [0u8; 4];
    for (slot, octet) in parsed.iter_mut().zip(&octets) {
        if octet.is_empty() || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::parse(literal));
        }
        *slot = octet.parse().map_err(|_| Error::parse(literal))?;
    }

    Ok(Ipv4Addr::from(parsed))
}

/// Resolves catalogue addresses to IPv4 targets
pub struct AddressResolver {
    lookup: Box<dyn HostLookup>,
}

impl AddressResolver {
    /// Create a resolver over a lookup implementation
    pub fn new(lookup: Box<dyn HostLookup>) -> Self {
        Self { lookup }
    }

    /// Create a resolver over the operating system's resolver
    pub fn system() -> Self {
        Self::new(Box::new(SystemLookup::new()))
    }

    /// Resolve `spec` to an IPv4 address
    ///
    /// # Parameters
    ///
    /// - `spec`: Catalogue address
    /// - `own_address`: This machine's address, discovered once per run
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: `own_address` for [`AddressSpec::OwnAddress`] (no
    ///   lookup), otherwise the first IPv4 address of the lookup
    /// - `Err(Error::Resolution)`: Lookup failed or produced no IPv4 address
    pub async fn resolve(&self, spec: &AddressSpec, own_address: Ipv4Addr) -> Result<Ipv4Addr> {
        let host = match spec {
            AddressSpec::OwnAddress => return Ok(own_address),
            AddressSpec::Host(host) => host,
        };

        let addrs = self.lookup.lookup(host).await?;
        tracing::debug!("Lookup {} -> {:?}", host, addrs);

        addrs
            .into_iter()
            .find_map(|addr| match addr {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| Error::resolution(host, "lookup returned no IPv4 address"))
    }
}
