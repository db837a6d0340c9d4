// # Dynamic DNS Update Backends
//
// Backends for the services driven by a single authenticated HTTP request
// per update:
//
// | serviceType | Request                                   | Credentials            |
// |-------------|-------------------------------------------|------------------------|
// | `DuckDNS`   | `GET /update?domains=..&token=..`         | `token`                |
// | `NoIP`      | `GET /nic/update?hostname=..&myip=..`     | `username`, `password` |
// | `Namecheap` | `GET /update?host=..&domain=..&password=..` | `password`           |
// | `GoDaddy`   | `PUT /v1/domains/../records/{A,AAAA}/..`  | `apikey`, `apisecret`  |
//
// Every backend is stateless, makes no retries, and treats a reply that
// confirms the current addresses as success, so re-running an update after
// a partial failure is harmless.

pub mod duckdns;
pub mod godaddy;
mod http;
pub mod namecheap;
pub mod noip;

pub use duckdns::{DuckDnsBackend, DuckDnsFactory};
pub use godaddy::{GoDaddyBackend, GoDaddyFactory};
pub use namecheap::{NamecheapBackend, NamecheapFactory};
pub use noip::{NoIpBackend, NoIpFactory};

use ddns_core::registry::Registry;

/// Register every backend of this crate under its `serviceType`
pub fn register(registry: &mut Registry) {
    registry.register_backend(duckdns::SERVICE_TYPE, Box::new(DuckDnsFactory::new()));
    registry.register_backend(noip::SERVICE_TYPE, Box::new(NoIpFactory::new()));
    registry.register_backend(namecheap::SERVICE_TYPE, Box::new(NamecheapFactory::new()));
    registry.register_backend(godaddy::SERVICE_TYPE, Box::new(GoDaddyFactory::new()));
}
