//! Public lookup through ipify
//!
//! `https://api.ipify.org` answers with the caller's IPv4 address as plain
//! text, `https://api6.ipify.org` with its IPv6 address when the request
//! could be routed over IPv6 (and with the IPv4 address otherwise).

use async_trait::async_trait;
use ddns_core::config::RouterConfig;
use ddns_core::traits::{AddressProvider, AddressProviderFactory, PublicAddresses};
use ddns_core::{Error, Result};
use std::net::{Ipv4Addr, Ipv6Addr};

const IPIFY_V4: &str = "https://api.ipify.org";
const IPIFY_V6: &str = "https://api6.ipify.org";

/// Address provider backed by a public "what is my IP" service
#[derive(Debug, Clone)]
pub struct PublicLookupProvider {
    ipv4_url: String,
    ipv6_url: Option<String>,
    client: reqwest::Client,
}

impl PublicLookupProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ipv4_url: IPIFY_V4.to_string(),
            ipv6_url: Some(IPIFY_V6.to_string()),
            client: crate::client()?,
        })
    }

    /// Use different lookup endpoints; `None` disables the IPv6 lookup
    pub fn with_endpoints(mut self, ipv4_url: impl Into<String>, ipv6_url: Option<String>) -> Self {
        self.ipv4_url = ipv4_url.into();
        self.ipv6_url = ipv6_url;
        self
    }

    async fn ipv4(&self) -> Result<Ipv4Addr> {
        let text = crate::fetch_text(&self.client, &self.ipv4_url)
            .await
            .map_err(Error::provider)?;
        text.trim()
            .parse()
            .map_err(|_| Error::provider(format!("Invalid IPv4 address: '{}'", text.trim())))
    }

    async fn ipv6(&self) -> Option<Ipv6Addr> {
        let url = self.ipv6_url.as_deref()?;
        match crate::fetch_text(&self.client, url).await {
            Ok(text) => match text.trim().parse::<Ipv6Addr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    tracing::debug!(reply = %text.trim(), "IPv6 lookup returned no IPv6 address");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "IPv6 lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl AddressProvider for PublicLookupProvider {
    async fn public_addresses(&self) -> Result<PublicAddresses> {
        let (ipv4, ipv6) = tokio::join!(self.ipv4(), self.ipv6());
        let addresses = PublicAddresses::new(Some(ipv4?), ipv6);
        tracing::debug!(ipv4 = %addresses.ipv4_display(), ipv6 = %addresses.ipv6_display(), "Public lookup");
        Ok(addresses)
    }

    fn provider_name(&self) -> &'static str {
        "api.ipify.org"
    }
}

/// Factory for the default provider; the router block is not consulted
#[derive(Debug, Clone, Default)]
pub struct PublicLookupFactory {
    endpoints: Option<(String, Option<String>)>,
}

impl PublicLookupFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(ipv4_url: impl Into<String>, ipv6_url: Option<String>) -> Self {
        Self {
            endpoints: Some((ipv4_url.into(), ipv6_url)),
        }
    }
}

impl AddressProviderFactory for PublicLookupFactory {
    fn create(&self, _router: Option<&RouterConfig>) -> Result<Box<dyn AddressProvider>> {
        let provider = PublicLookupProvider::new()?;
        Ok(Box::new(match &self.endpoints {
            Some((v4, v6)) => provider.with_endpoints(v4.clone(), v6.clone()),
            None => provider,
        }))
    }
}
