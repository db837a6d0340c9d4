//! Configuration types for the DDNS system
//!
//! The whole configuration lives in one JSON file which doubles as the state
//! file: the last addresses pushed to every backend are written back into it.
//!
//! ```json
//! {
//!   "updateInterval": "5m",
//!   "lastPublicIpv4": "203.0.113.9",
//!   "router": { "routerType": "BTSmartHub2", "ipDetailsUrl": "http://192.168.1.254/nonAuth/wan_conn.xml" },
//!   "services": [ { "serviceType": "DuckDNS", "targetDomain": "home", "token": "..." } ],
//!   "notifications": { "sipgateSMS": { "enabled": false } }
//! }
//! ```

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use std::time::Duration;

/// Main DDNS configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Update interval, e.g. "5m", "1h 30m" or Go style "1.5h"
    pub update_interval: String,

    /// Last IPv4 successfully pushed to every backend
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_public_ipv4: Option<Ipv4Addr>,

    /// Last IPv6 successfully pushed to every backend
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_public_ipv6: Option<Ipv6Addr>,

    /// When the last-known addresses were written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Router-specific address source; absent means the default public lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<RouterConfig>,

    /// Backends, in dispatch order
    #[serde(default)]
    pub services: Vec<ServiceConfig>,

    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Keys this model does not know, written back unchanged on persist
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Configuration {
    /// Parse a configuration from JSON text and validate it
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Configuration = serde_json::from_str(text)
            .map_err(|e| Error::config(format!("Malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        parse_interval(&self.update_interval)?;
        Ok(())
    }

    /// The parsed update interval
    pub fn interval(&self) -> Result<Duration> {
        parse_interval(&self.update_interval)
    }

    /// Target domains of every configured backend, in order
    pub fn domains(&self) -> Vec<String> {
        self.services
            .iter()
            .map(|s| s.target_domain.clone())
            .collect()
    }

    /// Comma separated list of target domains
    pub fn domains_str(&self) -> String {
        self.domains().join(",")
    }
}

/// Parse an interval string into a positive duration
///
/// Accepts humantime syntax (`"90s"`, `"5m"`, `"1h 30m"`) and the Go
/// duration syntax older files were written with, including fractional
/// values such as `"1.5h"` or `"2m30.5s"`.
pub fn parse_interval(text: &str) -> Result<Duration> {
    let trimmed = text.trim();
    let duration = match humantime::parse_duration(trimmed) {
        Ok(duration) => duration,
        Err(e) => parse_go_duration(trimmed)
            .ok_or_else(|| Error::config(format!("Invalid updateInterval '{}': {}", text, e)))?,
    };
    if duration.is_zero() {
        return Err(Error::config(format!(
            "updateInterval must be positive, got '{}'",
            text
        )));
    }
    Ok(duration)
}

static GO_DURATION_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|ms|s|m|h)").expect("Invalid duration regex")
});

// Concatenated `<decimal><unit>` terms, e.g. "1h2.5m"
fn parse_go_duration(text: &str) -> Option<Duration> {
    let mut end = 0;
    let mut seconds = 0.0_f64;
    for term in GO_DURATION_TERM.captures_iter(text) {
        let whole = term.get(0)?;
        if whole.start() != end {
            return None;
        }
        end = whole.end();

        let value: f64 = term[1].parse().ok()?;
        let scale = match &term[2] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            _ => 3600.0,
        };
        seconds += value * scale;
    }

    if end == 0 || end != text.len() {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

/// Router (address source) configuration
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Router type, e.g. "BTSmartHub2"; empty means the default provider
    #[serde(default)]
    pub router_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub login_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_details_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("router_type", &self.router_type)
            .field("user_name", &self.user_name)
            .field("password", &redact(&self.password))
            .field("login_url", &self.login_url)
            .field("ip_details_url", &self.ip_details_url)
            .finish_non_exhaustive()
    }
}

/// One update backend descriptor
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Backend type, e.g. "DuckDNS", "Cloudflare"
    pub service_type: String,

    /// Domain whose records are kept up to date
    pub target_domain: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(rename = "apikey", default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(rename = "apisecret", default, skip_serializing_if = "String::is_empty")]
    pub api_secret: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email_address: String,
    #[serde(rename = "recordname", default, skip_serializing_if = "String::is_empty")]
    pub record_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceConfig {
    /// Create a descriptor with only the type and domain set
    pub fn new(service_type: impl Into<String>, target_domain: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            target_domain: target_domain.into(),
            ..Self::default()
        }
    }

    /// Record name, falling back to the zone apex
    pub fn record_name_or_apex(&self) -> &str {
        if self.record_name.is_empty() {
            "@"
        } else {
            &self.record_name
        }
    }
}

// Credentials never leave the process through Debug output
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("service_type", &self.service_type)
            .field("target_domain", &self.target_domain)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("token", &redact(&self.token))
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("email_address", &self.email_address)
            .field("record_name", &self.record_name)
            .field("port", &self.port)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Notification configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(rename = "sipgateSMS", default)]
    pub sipgate_sms: SipgateSmsConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotificationConfig {
    /// Names of the notification blocks that are switched on
    pub fn enabled_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.sipgate_sms.enabled {
            names.push(SIPGATE_SMS);
        }
        if self.email.enabled {
            names.push(EMAIL);
        }
        names
    }
}

/// Registry key of the sipgate SMS notifier
pub const SIPGATE_SMS: &str = "sipgateSMS";

/// Registry key of the email notifier
pub const EMAIL: &str = "email";

/// sipgate.io SMS notification settings
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SipgateSmsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sms_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recipient: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for SipgateSmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SipgateSmsConfig")
            .field("enabled", &self.enabled)
            .field("token_id", &self.token_id)
            .field("token", &redact(&self.token))
            .field("sms_id", &self.sms_id)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

/// Email notification settings
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Older files carry the untagged `From` key
    #[serde(alias = "From", default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EmailAddress>,
    /// Older files carry the untagged `Recipients` key
    #[serde(alias = "Recipients", default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub smtp_server: String,
    /// "SSL" (implicit TLS) or "TLS" (STARTTLS)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("from", &self.from)
            .field("recipients", &self.recipients)
            .field("smtp_server", &self.smtp_server)
            .field("security_type", &self.security_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(alias = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(alias = "Address", default)]
    pub address: String,
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<REDACTED>" }
}

// Older files carry "" for an address that was never recorded
fn empty_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
