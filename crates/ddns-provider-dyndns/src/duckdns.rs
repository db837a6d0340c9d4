// # DuckDNS
//
// `GET /update?domains={domain}&token={token}&ip={ipv4}[&ipv6={ipv6}]`
//
// The reply body is the bare text `OK` or `KO`.
//
// Docs: https://www.duckdns.org/spec.jsp

use async_trait::async_trait;
use ddns_core::config::ServiceConfig;
use ddns_core::traits::{PublicAddresses, UpdateBackend, UpdateBackendFactory};
use ddns_core::{Error, Result};

use crate::http;

pub const SERVICE_TYPE: &str = "DuckDNS";

const DUCKDNS_API_BASE: &str = "https://www.duckdns.org";

pub struct DuckDnsBackend {
    domain: String,
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DuckDnsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDnsBackend")
            .field("domain", &self.domain)
            .field("token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl DuckDnsBackend {
    pub fn from_service(service: &ServiceConfig) -> Result<Self> {
        http::require(service, "targetDomain", &service.target_domain)?;
        http::require(service, "token", &service.token)?;

        Ok(Self {
            domain: service.target_domain.clone(),
            token: service.token.clone(),
            api_base: DUCKDNS_API_BASE.to_string(),
            client: http::client()?,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = http::normalize_base(api_base);
        self
    }
}

#[async_trait]
impl UpdateBackend for DuckDnsBackend {
    async fn update(&self, addresses: &PublicAddresses) -> Result<()> {
        let mut query = vec![
            ("domains", self.domain.clone()),
            ("token", self.token.clone()),
        ];
        // Without `ip` DuckDNS uses the address the request came from
        if let Some(ipv4) = addresses.ipv4 {
            query.push(("ip", ipv4.to_string()));
        }
        if let Some(ipv6) = addresses.ipv6 {
            query.push(("ipv6", ipv6.to_string()));
        }

        let request = self
            .client
            .get(format!("{}/update", self.api_base))
            .query(&query);
        let (status, body) = http::send(SERVICE_TYPE, request).await?;

        if !status.is_success() || body.trim() != "OK" {
            return Err(Error::backend(
                SERVICE_TYPE,
                format!(
                    "Update of {} to {} failed: {} '{}'",
                    self.domain,
                    addresses,
                    status,
                    body.trim()
                ),
            ));
        }

        tracing::info!(service = SERVICE_TYPE, domain = %self.domain, "Update succeeded");
        Ok(())
    }

    fn service_type(&self) -> &'static str {
        SERVICE_TYPE
    }
}

#[derive(Debug, Clone, Default)]
pub struct DuckDnsFactory {
    api_base: Option<String>,
}

impl DuckDnsFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: Some(api_base.into()),
        }
    }
}

impl UpdateBackendFactory for DuckDnsFactory {
    fn create(&self, service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>> {
        let backend = DuckDnsBackend::from_service(service)?;
        Ok(Box::new(match &self.api_base {
            Some(base) => backend.with_api_base(base.clone()),
            None => backend,
        }))
    }
}
