// # GoDaddy
//
// Replaces the `A` (and, when an IPv6 address is known, `AAAA`) record set of
// one name through the Domains API:
//
// ```http
// PUT /v1/domains/{domain}/records/A/{recordname|@}
// Authorization: sso-key {apikey}:{apisecret}
//
// [{ "data": "203.0.113.9", "ttl": 600 }]
// ```
//
// Docs: https://developer.godaddy.com/doc/endpoint/domains

use async_trait::async_trait;
use ddns_core::config::ServiceConfig;
use ddns_core::traits::{PublicAddresses, UpdateBackend, UpdateBackendFactory};
use ddns_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::http;

pub const SERVICE_TYPE: &str = "GoDaddy";

const GODADDY_API_BASE: &str = "https://api.godaddy.com";

/// GoDaddy's minimum TTL
const DEFAULT_TTL: u32 = 600;

#[derive(Debug, Serialize)]
struct RecordData {
    data: String,
    ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
}

/// Error body, e.g. `{"code":"ACCESS_DENIED","message":"..."}`
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct GoDaddyBackend {
    domain: String,
    record_name: String,
    api_key: String,
    api_secret: String,
    ttl: u32,
    port: Option<u16>,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GoDaddyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoDaddyBackend")
            .field("domain", &self.domain)
            .field("record_name", &self.record_name)
            .field("api_key", &"<REDACTED>")
            .field("api_secret", &"<REDACTED>")
            .field("ttl", &self.ttl)
            .field("port", &self.port)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GoDaddyBackend {
    pub fn from_service(service: &ServiceConfig) -> Result<Self> {
        http::require(service, "targetDomain", &service.target_domain)?;
        http::require(service, "apikey", &service.api_key)?;
        http::require(service, "apisecret", &service.api_secret)?;

        Ok(Self {
            domain: service.target_domain.clone(),
            record_name: service.record_name_or_apex().to_string(),
            api_key: service.api_key.clone(),
            api_secret: service.api_secret.clone(),
            ttl: service.ttl.unwrap_or(DEFAULT_TTL),
            port: service.port,
            api_base: GODADDY_API_BASE.to_string(),
            client: http::client()?,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = http::normalize_base(api_base);
        self
    }

    async fn replace(&self, record_type: &str, data: String) -> Result<()> {
        let url = format!(
            "{}/v1/domains/{}/records/{}/{}",
            self.api_base, self.domain, record_type, self.record_name
        );
        let body = [RecordData {
            data,
            ttl: self.ttl,
            port: self.port,
        }];

        let request = self
            .client
            .put(url)
            .header("Accept", "application/json")
            .header(
                "Authorization",
                format!("sso-key {}:{}", self.api_key, self.api_secret),
            )
            .json(&body);
        let (status, reply) = http::send(SERVICE_TYPE, request).await?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<ApiError>(&reply) {
                Ok(e) if !e.code.is_empty() => format!("{}: {}", e.code, e.message),
                _ => reply.trim().to_string(),
            };
            return Err(Error::backend(
                SERVICE_TYPE,
                format!(
                    "Replacing {} record {}.{} failed: {} {}",
                    record_type, self.record_name, self.domain, status, reason
                ),
            ));
        }

        tracing::info!(
            service = SERVICE_TYPE,
            domain = %self.domain,
            record = %self.record_name,
            record_type,
            "Record replaced"
        );
        Ok(())
    }
}

#[async_trait]
impl UpdateBackend for GoDaddyBackend {
    async fn update(&self, addresses: &PublicAddresses) -> Result<()> {
        if let Some(ipv4) = addresses.ipv4 {
            self.replace("A", ipv4.to_string()).await?;
        }
        if let Some(ipv6) = addresses.ipv6 {
            self.replace("AAAA", ipv6.to_string()).await?;
        }
        Ok(())
    }

    fn service_type(&self) -> &'static str {
        SERVICE_TYPE
    }
}

#[derive(Debug, Clone, Default)]
pub struct GoDaddyFactory {
    api_base: Option<String>,
}

impl GoDaddyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: Some(api_base.into()),
        }
    }
}

impl UpdateBackendFactory for GoDaddyFactory {
    fn create(&self, service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>> {
        let backend = GoDaddyBackend::from_service(service)?;
        Ok(Box::new(match &self.api_base {
            Some(base) => backend.with_api_base(base.clone()),
            None => backend,
        }))
    }
}
