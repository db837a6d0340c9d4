// # HTTP Address Providers
//
// This crate provides the address providers that discover the host's public
// addresses over HTTP.
//
// | routerType    | Source                                            |
// |---------------|---------------------------------------------------|
// | (absent)      | `api.ipify.org` / `api6.ipify.org` public lookup  |
// | `BTSmartHub2` | the router's `/nonAuth/wan_conn.xml` status page  |
//
// ## IPv6
//
// IPv6 is always optional. A host without an IPv6 route, or a router
// reporting no global address, yields `ipv6: None` rather than an error.

pub mod bt_smart_hub;
pub mod public_lookup;

pub use bt_smart_hub::{BT_SMART_HUB_2, BtSmartHub2Factory, BtSmartHub2Provider};
pub use public_lookup::{PublicLookupFactory, PublicLookupProvider};

use ddns_core::registry::{DEFAULT_ADDRESS_PROVIDER, Registry};
use ddns_core::{Error, Result};
use std::time::Duration;

/// Request timeout for every lookup
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// GET a URL and return its body text, failing on a non-2xx status
async fn fetch_text(client: &reqwest::Client, url: &str) -> std::result::Result<String, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Request to {} failed: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("{} returned {}", url, response.status()));
    }

    response
        .text()
        .await
        .map_err(|e| format!("Failed to read response from {}: {}", url, e))
}

/// Register the address providers of this crate
pub fn register(registry: &mut Registry) {
    registry.register_address_provider(DEFAULT_ADDRESS_PROVIDER, Box::new(PublicLookupFactory::new()));
    registry.register_address_provider(BT_SMART_HUB_2, Box::new(BtSmartHub2Factory));
}
