// # Address Provider Trait
//
// Defines the interface for discovering the host's current public addresses.
//
// ## Implementations
//
// - Public lookup service (api.ipify.org): `ddns-ip-http` crate, key "default"
// - BT Smart Hub 2 router status page: `ddns-ip-http` crate, key "BTSmartHub2"
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressProvider;
//
// let provider = registry.create_address_provider(config.router.as_ref())?;
// let addresses = provider.public_addresses().await?;
// println!("{}", addresses);
// ```

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::config::RouterConfig;

/// The pair of public addresses observed in one cycle
///
/// Either half may be missing: a host without IPv6 connectivity reports
/// `ipv6: None`, a router that only exposes its WAN IPv4 likewise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PublicAddresses {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl PublicAddresses {
    /// Create a new address pair
    pub fn new(ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) -> Self {
        Self { ipv4, ipv6 }
    }

    /// IPv4 only
    pub fn v4(ipv4: Ipv4Addr) -> Self {
        Self::new(Some(ipv4), None)
    }

    /// Render the IPv4 half, `<none>` when absent
    pub fn ipv4_display(&self) -> String {
        self.ipv4
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    }

    /// Render the IPv6 half, `<none>` when absent
    pub fn ipv6_display(&self) -> String {
        self.ipv6
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    }
}

impl fmt::Display for PublicAddresses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipv4={} ipv6={}", self.ipv4_display(), self.ipv6_display())
    }
}

/// Trait for address provider implementations
///
/// Providers answer one question per call and keep no state between calls.
/// The orchestrator bounds every call with its own timeout, so an
/// implementation does not need to guard against hanging endpoints beyond
/// its HTTP client's request timeout.
///
/// # Errors
///
/// A failure to determine the IPv4 address must be returned as
/// [`Error::Provider`](crate::Error::Provider); the cycle is then aborted
/// before any backend is contacted. A missing IPv6 address is not an error.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    /// Query the current public addresses
    async fn public_addresses(&self) -> Result<PublicAddresses, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing address providers from configuration
pub trait AddressProviderFactory: Send + Sync {
    /// Create an AddressProvider instance
    ///
    /// `router` is `None` when the configuration has no router block.
    fn create(
        &self,
        router: Option<&RouterConfig>,
    ) -> Result<Box<dyn AddressProvider>, crate::Error>;
}
