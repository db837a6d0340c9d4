//! BT Smart Hub 2 router status page
//!
//! The hub publishes its WAN state without authentication at
//! `http://192.168.1.254/nonAuth/wan_conn.xml`. The interesting elements
//! carry a JS-like nested array of URL-encoded, `;` separated fields in
//! their `value` attribute, one entry per WAN connection:
//!
//! ```xml
//! <ip4_info_list type="array" value="[['81%2E2%2E3%2E4%3B255%2E255%2E255%2E255%3B...'],
//! ['0%2E0%2E0%2E0%3B...'],
//! null]" />
//! <ip6_gua_list type="array" value="[['2a00%3A23c5%3A%3A1%2F64%3B...'],
//! ['%3A%3A%2F0%3B%3A%3A'],
//! null]" />
//! ```
//!
//! The first field of the first entry is the public address.

use async_trait::async_trait;
use ddns_core::config::RouterConfig;
use ddns_core::traits::{AddressProvider, AddressProviderFactory, PublicAddresses};
use ddns_core::{Error, Result};
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

/// `routerType` handled by this provider
pub const BT_SMART_HUB_2: &str = "BTSmartHub2";

/// Address provider that reads the hub's WAN status page
#[derive(Debug, Clone)]
pub struct BtSmartHub2Provider {
    ip_details_url: String,
    client: reqwest::Client,
}

impl BtSmartHub2Provider {
    pub fn new(ip_details_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            ip_details_url: ip_details_url.into(),
            client: crate::client()?,
        })
    }
}

static IP4_INFO_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<ip4_info_list\b[^>]*?\bvalue="([^"]*)""#).expect("Invalid ip4_info_list regex")
});

static IP6_GUA_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<ip6_gua_list\b[^>]*?\bvalue="([^"]*)""#).expect("Invalid ip6_gua_list regex")
});

/// The `value` attribute of the first tag matched by `element`
fn element_value<'a>(xml: &'a str, element: &Regex) -> Option<&'a str> {
    element
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First field of the first entry of a nested array value, URL-decoded
fn first_field(value: &str) -> Option<String> {
    let entry = value.split(',').next()?;
    let entry = entry.trim_matches(|c: char| c == '[' || c == ']' || c == '\'' || c.is_whitespace());
    if entry.is_empty() || entry == "null" {
        return None;
    }
    let decoded = urlencoding::decode(entry).ok()?;
    decoded.split(';').next().map(|field| field.trim().to_string())
}

/// Extract the public addresses from a `wan_conn.xml` document
fn parse_wan_status(xml: &str) -> std::result::Result<PublicAddresses, String> {
    let ipv4_value =
        element_value(xml, &IP4_INFO_LIST).ok_or("No ip4_info_list element in router status")?;
    let ipv4_text = first_field(ipv4_value)
        .ok_or_else(|| format!("Unable to read ip4_info_list value '{}'", ipv4_value))?;
    let ipv4: Ipv4Addr = ipv4_text
        .parse()
        .map_err(|_| format!("Unable to determine public IPv4 from '{}'", ipv4_text))?;
    if ipv4.is_unspecified() {
        return Err("Router reports no public IPv4 (WAN down?)".to_string());
    }

    let ipv6 = element_value(xml, &IP6_GUA_LIST)
        .and_then(first_field)
        .and_then(|field| {
            let address = field.split('/').next().unwrap_or_default();
            address.parse::<Ipv6Addr>().ok()
        })
        .filter(|ip| !ip.is_unspecified());

    Ok(PublicAddresses::new(Some(ipv4), ipv6))
}

#[async_trait]
impl AddressProvider for BtSmartHub2Provider {
    async fn public_addresses(&self) -> Result<PublicAddresses> {
        let xml = crate::fetch_text(&self.client, &self.ip_details_url)
            .await
            .map_err(Error::provider)?;
        let addresses = parse_wan_status(&xml).map_err(Error::provider)?;
        tracing::debug!(
            ipv4 = %addresses.ipv4_display(),
            ipv6 = %addresses.ipv6_display(),
            "BT Smart Hub 2 reports"
        );
        Ok(addresses)
    }

    fn provider_name(&self) -> &'static str {
        BT_SMART_HUB_2
    }
}

/// Factory reading `ipDetailsUrl` from the router block
#[derive(Debug, Clone, Copy, Default)]
pub struct BtSmartHub2Factory;

impl AddressProviderFactory for BtSmartHub2Factory {
    fn create(&self, router: Option<&RouterConfig>) -> Result<Box<dyn AddressProvider>> {
        let url = router
            .map(|r| r.ip_details_url.trim())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::config("BTSmartHub2 router requires ipDetailsUrl"))?;
        Ok(Box::new(BtSmartHub2Provider::new(url)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WAN_CONN: &str = r#"<status>
    <!-- REAL -->
    <wan_conn_status_list type="array" value="[['connected%3B64%3Bpass'],
['disconnected%3B0%3Bpass'],
null]" />
    <sysuptime value="849301" />
    <wan_active_idx value="0" />
    <link_status value="disconnected%3Badsl%3B0" />
    <ip4_info_list type="array" value="[['81%2E2%2E3%2E4%3B255%2E255%2E255%2E255%3B172%2E16%2E13%2E79%3B81%2E139%2E56%2E100%3B81%2E139%2E57%2E100'],
['0%2E0%2E0%2E0%3B0%2E0%2E0%2E0%3B0%2E0%2E0%2E0%3B0%2E0%2E0%2E0%3B0%2E0%2E0%2E0'],
null]" />
    <ip6_lla_list type="array" value="[['fe80%3A%3Afe80%3Afe80%3Afe80%3Afe80%2F10'],
['%3A%3A%2F0'],
null]" />
    <ip6_gua_list type="array" value="[['2a00%3A23c5%3A1%3A2%3A%3A1%2F64%3B2a00%3A%3A221%3A5ff%3A2a00%3A2a00'],
['%3A%3A%2F0%3B%3A%3A'],
null]" />
    <ip6_rdns_list type="array" value="[[null],[null],[null]]" />
    <!-- END_REAL -->
</status>"#;

    #[test]
    fn parses_both_families() {
        let addresses = parse_wan_status(WAN_CONN).unwrap();
        assert_eq!(addresses.ipv4, Some(Ipv4Addr::new(81, 2, 3, 4)));
        assert_eq!(addresses.ipv6, Some("2a00:23c5:1:2::1".parse().unwrap()));
    }

    #[test]
    fn unspecified_ipv6_is_none() {
        let xml = WAN_CONN.replace(
            "2a00%3A23c5%3A1%3A2%3A%3A1%2F64%3B2a00%3A%3A221%3A5ff%3A2a00%3A2a00",
            "%3A%3A%2F0%3B%3A%3A",
        );
        let addresses = parse_wan_status(&xml).unwrap();
        assert!(addresses.ipv4.is_some());
        assert_eq!(addresses.ipv6, None);
    }

    #[test]
    fn wan_down_is_an_error() {
        let xml = WAN_CONN.replace("81%2E2%2E3%2E4", "0%2E0%2E0%2E0");
        assert!(parse_wan_status(&xml).is_err());
        assert!(parse_wan_status("<status></status>").is_err());
    }

    #[test]
    fn element_value_skips_other_attributes_and_tags() {
        let xml = r#"<ip4_gw type="array" value="[['10%2E0%2E0%2E1']]" />
<ip4_info_list type="array" value="[['81%2E2%2E3%2E4%3B']]" />"#;
        assert_eq!(element_value(xml, &IP4_INFO_LIST), Some("[['81%2E2%2E3%2E4%3B']]"));
        assert_eq!(element_value(xml, &IP6_GUA_LIST), None);
    }

    #[test]
    fn factory_requires_details_url() {
        let router = RouterConfig {
            router_type: BT_SMART_HUB_2.to_string(),
            ..RouterConfig::default()
        };
        let err = BtSmartHub2Factory.create(Some(&router)).err().unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn reads_status_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nonAuth/wan_conn.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WAN_CONN))
            .mount(&server)
            .await;

        let provider =
            BtSmartHub2Provider::new(format!("{}/nonAuth/wan_conn.xml", server.uri())).unwrap();
        let addresses = provider.public_addresses().await.unwrap();
        assert_eq!(addresses.ipv4, Some(Ipv4Addr::new(81, 2, 3, 4)));
    }
}
