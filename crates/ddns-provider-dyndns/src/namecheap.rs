// # Namecheap
//
// `GET /update?host={recordname|@}&domain={domain}&password={password}&ip={ipv4}`
//
// Namecheap's dynamic DNS endpoint is IPv4 only. The reply is an XML
// `<interface-response>` whose `<ErrCount>` is `0` on success:
//
// ```xml
// <interface-response>
//     <ErrCount>1</ErrCount>
//     <errors><Err1>Passwords do not match</Err1></errors>
//     <ResponseCount>1</ResponseCount>
//     <Done>true</Done>
// </interface-response>
// ```

use async_trait::async_trait;
use ddns_core::config::ServiceConfig;
use ddns_core::traits::{PublicAddresses, UpdateBackend, UpdateBackendFactory};
use ddns_core::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

use crate::http;

pub const SERVICE_TYPE: &str = "Namecheap";

const NAMECHEAP_API_BASE: &str = "https://dynamicdns.park-your-domain.com";

static ERR_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<ErrCount>\s*(\d+)\s*</ErrCount>").expect("Invalid ErrCount regex")
});

static FIRST_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Err1>(.*?)</Err1>").expect("Invalid Err1 regex"));

pub struct NamecheapBackend {
    domain: String,
    host: String,
    password: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for NamecheapBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamecheapBackend")
            .field("domain", &self.domain)
            .field("host", &self.host)
            .field("password", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl NamecheapBackend {
    pub fn from_service(service: &ServiceConfig) -> Result<Self> {
        http::require(service, "targetDomain", &service.target_domain)?;
        http::require(service, "password", &service.password)?;

        Ok(Self {
            domain: service.target_domain.clone(),
            host: service.record_name_or_apex().to_string(),
            password: service.password.clone(),
            api_base: NAMECHEAP_API_BASE.to_string(),
            client: http::client()?,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = http::normalize_base(api_base);
        self
    }
}

/// Check an `<interface-response>` document
///
/// Returns the first reported error when `ErrCount` is not zero.
fn check_reply(body: &str) -> std::result::Result<(), String> {
    let count: u32 = ERR_COUNT
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| format!("Unexpected reply: '{}'", body.trim()))?;

    if count == 0 {
        return Ok(());
    }

    let first = FIRST_ERROR
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| "unspecified error".to_string());
    Err(first)
}

#[async_trait]
impl UpdateBackend for NamecheapBackend {
    async fn update(&self, addresses: &PublicAddresses) -> Result<()> {
        let mut query = vec![
            ("host", self.host.clone()),
            ("domain", self.domain.clone()),
            ("password", self.password.clone()),
        ];
        // Without `ip` Namecheap uses the address the request came from
        if let Some(ipv4) = addresses.ipv4 {
            query.push(("ip", ipv4.to_string()));
        }

        let request = self
            .client
            .get(format!("{}/update", self.api_base))
            .query(&query);
        let (status, body) = http::send(SERVICE_TYPE, request).await?;

        if !status.is_success() {
            return Err(Error::backend(
                SERVICE_TYPE,
                format!("Update of {} failed: {}", self.domain, status),
            ));
        }

        check_reply(&body).map_err(|reason| {
            Error::backend(
                SERVICE_TYPE,
                format!(
                    "Update of {}.{} to {} failed: {}",
                    self.host,
                    self.domain,
                    addresses.ipv4_display(),
                    reason
                ),
            )
        })?;

        tracing::info!(
            service = SERVICE_TYPE,
            domain = %self.domain,
            host = %self.host,
            "Update succeeded"
        );
        Ok(())
    }

    fn service_type(&self) -> &'static str {
        SERVICE_TYPE
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamecheapFactory {
    api_base: Option<String>,
}

impl NamecheapFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: Some(api_base.into()),
        }
    }
}

impl UpdateBackendFactory for NamecheapFactory {
    fn create(&self, service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>> {
        let backend = NamecheapBackend::from_service(service)?;
        Ok(Box::new(match &self.api_base {
            Some(base) => backend.with_api_base(base.clone()),
            None => backend,
        }))
    }
}
