// # System Lookup
//
// HostLookup backed by the operating system resolver (getaddrinfo via
// `tokio::net::lookup_host`).

use async_trait::async_trait;
use std::net::IpAddr;

use crate::Error;
use crate::traits::HostLookup;

/// Forward lookups through the system resolver
#[derive(Debug, Clone, Default)]
pub struct SystemLookup;

impl SystemLookup {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        // lookup_host wants a socket address; the port is ignored
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| Error::resolution(host, e.to_string()))?;

        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}
