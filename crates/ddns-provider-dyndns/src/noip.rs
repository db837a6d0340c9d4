// # No-IP
//
// `GET /nic/update?hostname={domain}&myip={ipv4[,ipv6]}` with basic auth.
//
// Successful replies start with `good` (changed) or `nochg` (already set).
// Anything else (`nohost`, `badauth`, `abuse`, `911`, ...) is a failure.
//
// Docs: https://www.noip.com/integrate/request

use async_trait::async_trait;
use ddns_core::config::ServiceConfig;
use ddns_core::traits::{PublicAddresses, UpdateBackend, UpdateBackendFactory};
use ddns_core::{Error, Result};

use crate::http;

pub const SERVICE_TYPE: &str = "NoIP";

const NOIP_API_BASE: &str = "https://dynupdate.no-ip.com";

pub struct NoIpBackend {
    domain: String,
    username: String,
    password: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for NoIpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoIpBackend")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl NoIpBackend {
    pub fn from_service(service: &ServiceConfig) -> Result<Self> {
        http::require(service, "targetDomain", &service.target_domain)?;
        http::require(service, "username", &service.username)?;
        http::require(service, "password", &service.password)?;

        Ok(Self {
            domain: service.target_domain.clone(),
            username: service.username.clone(),
            password: service.password.clone(),
            api_base: NOIP_API_BASE.to_string(),
            client: http::client()?,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = http::normalize_base(api_base);
        self
    }
}

/// `myip` value: the known addresses joined by a comma
fn my_ip(addresses: &PublicAddresses) -> Option<String> {
    let parts: Vec<String> = addresses
        .ipv4
        .map(|ip| ip.to_string())
        .into_iter()
        .chain(addresses.ipv6.map(|ip| ip.to_string()))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

fn is_success(body: &str) -> bool {
    let body = body.trim_start();
    body.starts_with("good") || body.starts_with("nochg")
}

#[async_trait]
impl UpdateBackend for NoIpBackend {
    async fn update(&self, addresses: &PublicAddresses) -> Result<()> {
        let mut query = vec![("hostname", self.domain.clone())];
        if let Some(ips) = my_ip(addresses) {
            query.push(("myip", ips));
        }

        let request = self
            .client
            .get(format!("{}/nic/update", self.api_base))
            .basic_auth(&self.username, Some(&self.password))
            .query(&query);
        let (status, body) = http::send(SERVICE_TYPE, request).await?;

        if !status.is_success() || !is_success(&body) {
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

        tracing::info!(
            service = SERVICE_TYPE,
            domain = %self.domain,
            reply = %body.trim(),
            "Update succeeded"
        );
        Ok(())
    }

    fn service_type(&self) -> &'static str {
        SERVICE_TYPE
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoIpFactory {
    api_base: Option<String>,
}

impl NoIpFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: Some(api_base.into()),
        }
    }
}

impl UpdateBackendFactory for NoIpFactory {
    fn create(&self, service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>> {
        let backend = NoIpBackend::from_service(service)?;
        Ok(Box::new(match &self.api_base {
            Some(base) => backend.with_api_base(base.clone()),
            None => backend,
        }))
    }
}
