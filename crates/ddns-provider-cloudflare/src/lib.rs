// # Cloudflare Update Backend
//
// Keeps the `A`/`AAAA` records of one domain in a Cloudflare zone pointed at
// the host's public addresses.
//
// ## Flow (per update)
//
// 1. `GET /zones?name={zone}` resolves the zone id
// 2. `GET /zones/{zone_id}/dns_records?name={domain}` lists the records
// 3. `PUT /zones/{zone_id}/dns_records/{record_id}` for every `A`/`AAAA`
//    record whose content differs from the observed address
//
// Records of a family without an observed address are left alone, so a
// host without IPv6 never clears its `AAAA` record.
//
// ## Authentication
//
// - `token`: API token, sent as `Authorization: Bearer`
// - otherwise `emailAddress` + `apikey`: legacy global key, sent as
//   `X-Auth-Email` / `X-Auth-Key`
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/

use async_trait::async_trait;
use ddns_core::config::ServiceConfig;
use ddns_core::registry::Registry;
use ddns_core::traits::{PublicAddresses, UpdateBackend, UpdateBackendFactory};
use ddns_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// `serviceType` handled by this crate
pub const SERVICE_TYPE: &str = "Cloudflare";

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Request timeout for API calls
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// TTL of 1 means "automatic" to Cloudflare
const DEFAULT_TTL: u32 = 1;

/// How requests are authenticated
#[derive(Clone, PartialEq, Eq)]
enum Credentials {
    Token(String),
    GlobalKey { email: String, key: String },
}

/// Cloudflare update backend
pub struct CloudflareBackend {
    domain: String,
    credentials: Credentials,
    ttl: u32,
    api_base: String,
    client: reqwest::Client,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.credentials {
            Credentials::Token(_) => "token <REDACTED>",
            Credentials::GlobalKey { .. } => "global key <REDACTED>",
        };
        f.debug_struct("CloudflareBackend")
            .field("domain", &self.domain)
            .field("credentials", &auth)
            .field("ttl", &self.ttl)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Envelope every Cloudflare v4 response is wrapped in
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
}

impl CloudflareBackend {
    /// Create a backend from a service descriptor
    ///
    /// Requires either `token` or both `emailAddress` and `apikey`.
    pub fn from_service(service: &ServiceConfig) -> Result<Self> {
        if service.target_domain.is_empty() {
            return Err(Error::config("Cloudflare: targetDomain is required"));
        }

        let credentials = if !service.token.is_empty() {
            Credentials::Token(service.token.clone())
        } else if !service.email_address.is_empty() && !service.api_key.is_empty() {
            Credentials::GlobalKey {
                email: service.email_address.clone(),
                key: service.api_key.clone(),
            }
        } else {
            return Err(Error::config(
                "Cloudflare: either token or emailAddress and apikey are required",
            ));
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            domain: service.target_domain.clone(),
            credentials,
            ttl: service.ttl.unwrap_or(DEFAULT_TTL),
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the backend at a different API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send a request and unwrap the v4 envelope
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| failure(format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                401 | 403 => failure(format!(
                    "{}: Authentication failed: invalid credentials or insufficient permissions. Status: {}",
                    context, status
                )),
                404 => failure(format!("{}: Not found. Status: {}", context, status)),
                429 => failure(format!(
                    "{}: Rate limit exceeded. Status: {}",
                    context, status
                )),
                500..=599 => failure(format!(
                    "{}: Cloudflare server error (transient): {} - {}",
                    context, status, error_text
                )),
                _ => failure(format!("{}: {} - {}", context, status, error_text)),
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| failure(format!("{}: Failed to parse response: {}", context, e)))?;

        if !envelope.success {
            let errors = envelope
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(failure(format!("{}: API reported failure: {}", context, errors)));
        }

        envelope
            .result
            .ok_or_else(|| failure(format!("{}: Response carries no result", context)))
    }

    async fn zone_id(&self) -> Result<String> {
        let zone_name = zone_name(&self.domain)?;
        tracing::debug!(zone = %zone_name, "Looking up Cloudflare zone");

        let request = self
            .client
            .get(format!("{}/zones", self.api_base))
            .query(&[("name", zone_name.as_str())]);
        let zones: Vec<Zone> = self.call(request, "zone lookup").await?;

        zones
            .into_iter()
            .next()
            .map(|zone| zone.id)
            .ok_or_else(|| failure(format!("Zone not found: {}", zone_name)))
    }

    async fn records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .query(&[("name", self.domain.as_str())]);
        let records: Vec<DnsRecord> = self.call(request, "record lookup").await?;

        Ok(records
            .into_iter()
            .filter(|r| r.name.eq_ignore_ascii_case(&self.domain))
            .filter(|r| r.record_type == "A" || r.record_type == "AAAA")
            .collect())
    }

    async fn put_record(&self, zone_id: &str, record: &DnsRecord, content: &str) -> Result<()> {
        let payload = serde_json::json!({
            "type": record.record_type,
            "name": record.name,
            "content": content,
            "ttl": self.ttl,
        });

        let request = self
            .client
            .put(format!(
                "{}/zones/{}/dns_records/{}",
                self.api_base, zone_id, record.id
            ))
            .json(&payload);
        let _: serde_json::Value = self.call(request, "record update").await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateBackend for CloudflareBackend {
    async fn update(&self, addresses: &PublicAddresses) -> Result<()> {
        let zone_id = self.zone_id().await?;
        let records = self.records(&zone_id).await?;

        if records.is_empty() {
            return Err(failure(format!("No A or AAAA records named {}", self.domain)));
        }

        for record in &records {
            let desired = match record.record_type.as_str() {
                "A" => addresses.ipv4.map(|ip| ip.to_string()),
                _ => addresses.ipv6.map(|ip| ip.to_string()),
            };
            let Some(desired) = desired else {
                continue;
            };

            if record.content == desired {
                tracing::debug!(
                    domain = %self.domain,
                    record_type = %record.record_type,
                    "Record already up to date"
                );
                continue;
            }

            tracing::info!(
                domain = %self.domain,
                record_type = %record.record_type,
                from = %record.content,
                to = %desired,
                "Updating Cloudflare record"
            );
            self.put_record(&zone_id, record, &desired).await?;
        }

        Ok(())
    }

    fn service_type(&self) -> &'static str {
        SERVICE_TYPE
    }
}

fn failure(message: String) -> Error {
    Error::backend(SERVICE_TYPE, message)
}

/// Guess the zone a domain lives in
///
/// `home.example.com` -> `example.com`, `home.example.co.uk` -> `example.co.uk`
fn zone_name(domain: &str) -> Result<String> {
    let parts: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(Error::config(format!("Invalid domain name: {}", domain)));
    }

    let n = parts.len();
    // Two-level public suffixes such as co.uk or com.au
    let keep = if n >= 3 && parts[n - 2].len() <= 3 && parts[n - 1].len() == 2 {
        3
    } else {
        2
    };
    Ok(parts[n - keep..].join("."))
}

/// Factory for creating Cloudflare backends
#[derive(Debug, Clone, Default)]
pub struct CloudflareFactory {
    api_base: Option<String>,
}

impl CloudflareFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create backends that talk to a different API root
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: Some(api_base.into()),
        }
    }
}

impl UpdateBackendFactory for CloudflareFactory {
    fn create(&self, service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>> {
        let backend = CloudflareBackend::from_service(service)?;
        let backend = match &self.api_base {
            Some(base) => backend.with_api_base(base.clone()),
            None => backend,
        };
        Ok(Box::new(backend))
    }
}

/// Register the Cloudflare backend with a registry
pub fn register(registry: &mut Registry) {
    registry.register_backend(SERVICE_TYPE, Box::new(CloudflareFactory::new()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ZONE: &str = "023e105f4ecef8ad9ca31a8372d0c353";

    fn service() -> ServiceConfig {
        ServiceConfig {
            token: "cf-token".to_string(),
            ..ServiceConfig::new(SERVICE_TYPE, "home.example.com")
        }
    }

    fn backend(server: &MockServer, service: &ServiceConfig) -> CloudflareBackend {
        CloudflareBackend::from_service(service)
            .unwrap()
            .with_api_base(server.uri())
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": result,
        }))
    }

    async fn mount_zone(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("name", "example.com"))
            .respond_with(ok(serde_json::json!([{ "id": ZONE, "name": "example.com" }])))
            .mount(server)
            .await;
    }

    async fn mount_records(server: &MockServer, records: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/zones/{}/dns_records", ZONE)))
            .and(query_param("name", "home.example.com"))
            .respond_with(ok(records))
            .mount(server)
            .await;
    }

    #[test]
    fn zone_name_guess() {
        assert_eq!(zone_name("home.example.com").unwrap(), "example.com");
        assert_eq!(zone_name("example.com").unwrap(), "example.com");
        assert_eq!(zone_name("a.b.example.co.uk").unwrap(), "example.co.uk");
        assert_eq!(zone_name("deep.nested.example.org.").unwrap(), "example.org");
        assert!(zone_name("localhost").is_err());
    }

    #[test]
    fn factory_requires_credentials() {
        let bare = ServiceConfig::new(SERVICE_TYPE, "home.example.com");
        let err = CloudflareFactory::new().create(&bare).err().unwrap();
        assert!(err.is_fatal());

        let email_only = ServiceConfig {
            email_address: "me@example.com".to_string(),
            ..bare.clone()
        };
        assert!(CloudflareFactory::new().create(&email_only).is_err());

        let global_key = ServiceConfig {
            api_key: "global".to_string(),
            ..email_only
        };
        assert!(CloudflareFactory::new().create(&global_key).is_ok());
    }

    #[test]
    fn debug_does_not_expose_token() {
        let backend = CloudflareBackend::from_service(&service()).unwrap();
        let debug = format!("{:?}", backend);
        assert!(!debug.contains("cf-token"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[tokio::test]
    async fn updates_only_stale_records() {
        let server = MockServer::start().await;
        mount_zone(&server).await;
        mount_records(
            &server,
            serde_json::json!([
                { "id": "rec-a", "type": "A", "name": "home.example.com", "content": "198.51.100.1" },
                { "id": "rec-aaaa", "type": "AAAA", "name": "home.example.com", "content": "2001:db8::1" },
                { "id": "rec-txt", "type": "TXT", "name": "home.example.com", "content": "hello" }
            ]),
        )
        .await;

        Mock::given(method("PUT"))
            .and(path(format!("/zones/{}/dns_records/rec-a", ZONE)))
            .and(header("authorization", "Bearer cf-token"))
            .and(body_json(serde_json::json!({
                "type": "A",
                "name": "home.example.com",
                "content": "203.0.113.9",
                "ttl": 1
            })))
            .respond_with(ok(serde_json::json!({ "id": "rec-a" })))
            .expect(1)
            .mount(&server)
            .await;

        // AAAA already matches
        Mock::given(method("PUT"))
            .and(path(format!("/zones/{}/dns_records/rec-aaaa", ZONE)))
            .respond_with(ok(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let addresses = PublicAddresses::new(
            Some(Ipv4Addr::new(203, 0, 113, 9)),
            Some("2001:db8::1".parse::<Ipv6Addr>().unwrap()),
        );
        backend(&server, &service()).update(&addresses).await.unwrap();
    }

    #[tokio::test]
    async fn missing_family_leaves_record_alone() {
        let server = MockServer::start().await;
        mount_zone(&server).await;
        mount_records(
            &server,
            serde_json::json!([
                { "id": "rec-aaaa", "type": "AAAA", "name": "home.example.com", "content": "2001:db8::1" }
            ]),
        )
        .await;

        Mock::given(method("PUT"))
            .respond_with(ok(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let addresses = PublicAddresses::v4(Ipv4Addr::new(203, 0, 113, 9));
        backend(&server, &service()).update(&addresses).await.unwrap();
    }

    #[tokio::test]
    async fn global_key_headers_and_custom_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(header("X-Auth-Email", "me@example.com"))
            .and(header("X-Auth-Key", "global"))
            .respond_with(ok(serde_json::json!([{ "id": ZONE }])))
            .mount(&server)
            .await;
        mount_records(
            &server,
            serde_json::json!([
                { "id": "rec-a", "type": "A", "name": "home.example.com", "content": "198.51.100.1" }
            ]),
        )
        .await;
        Mock::given(method("PUT"))
            .and(path(format!("/zones/{}/dns_records/rec-a", ZONE)))
            .and(header("X-Auth-Key", "global"))
            .and(body_json(serde_json::json!({
                "type": "A",
                "name": "home.example.com",
                "content": "203.0.113.9",
                "ttl": 300
            })))
            .respond_with(ok(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let service = ServiceConfig {
            email_address: "me@example.com".to_string(),
            api_key: "global".to_string(),
            ttl: Some(300),
            ..ServiceConfig::new(SERVICE_TYPE, "home.example.com")
        };
        let addresses = PublicAddresses::v4(Ipv4Addr::new(203, 0, 113, 9));
        backend(&server, &service).update(&addresses).await.unwrap();
    }

    #[tokio::test]
    async fn auth_failure_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let addresses = PublicAddresses::v4(Ipv4Addr::new(203, 0, 113, 9));
        let err = backend(&server, &service()).update(&addresses).await.unwrap_err();
        match err {
            Error::Backend { service, message } => {
                assert_eq!(service, SERVICE_TYPE);
                assert!(message.contains("Authentication failed"));
                assert!(!message.contains("cf-token"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "errors": [{ "code": 9109, "message": "Invalid access token" }],
                "result": null
            })))
            .mount(&server)
            .await;

        let addresses = PublicAddresses::v4(Ipv4Addr::new(203, 0, 113, 9));
        let err = backend(&server, &service()).update(&addresses).await.unwrap_err();
        assert!(err.to_string().contains("Invalid access token (9109)"));
    }

    #[tokio::test]
    async fn no_matching_records_is_an_error() {
        let server = MockServer::start().await;
        mount_zone(&server).await;
        mount_records(&server, serde_json::json!([])).await;

        let addresses = PublicAddresses::v4(Ipv4Addr::new(203, 0, 113, 9));
        let err = backend(&server, &service()).update(&addresses).await.unwrap_err();
        assert!(err.to_string().contains("No A or AAAA records"));
    }

    #[test]
    fn register_installs_factory() {
        let mut registry = Registry::new();
        register(&mut registry);
        assert!(registry.has_backend(SERVICE_TYPE));
    }
}
