// # Update Backend Trait
//
// Defines the interface for pushing addresses to one external DNS service.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
// - DuckDNS, NoIP, Namecheap, GoDaddy: `ddns-provider-dyndns` crate

use async_trait::async_trait;

use crate::config::ServiceConfig;
use crate::traits::PublicAddresses;

/// Trait for update backend implementations
///
/// One backend instance serves one entry of the `services` list.
///
/// # Idempotency
///
/// `update` is re-invoked with the same addresses after any partial failure
/// of a cycle. Calling it against a remote record that already holds the
/// addresses must succeed.
///
/// # Forbidden
///
/// - Retrying or sleeping: a failed call is retried on the next tick
/// - Touching the configuration store or other backends
#[async_trait]
pub trait UpdateBackend: Send + Sync {
    /// Push the address pair to the remote service
    ///
    /// Backends that only understand IPv4 ignore the IPv6 half.
    async fn update(&self, addresses: &PublicAddresses) -> Result<(), crate::Error>;

    /// The `serviceType` this backend was created for
    fn service_type(&self) -> &'static str;
}

/// Helper trait for constructing backends from a service descriptor
pub trait UpdateBackendFactory: Send + Sync {
    /// Create an UpdateBackend for one `services` entry
    ///
    /// Fails with a configuration error when the descriptor lacks a
    /// credential the service requires.
    fn create(&self, service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>, crate::Error>;
}
