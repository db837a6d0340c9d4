//! Plugin-based collaborator registry
//!
//! The registry maps the type strings found in the configuration file to
//! factories, avoiding hardcoded if-else chains in the orchestrator.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::Registry;
//!
//! let mut registry = Registry::new();
//! ddns_ip_http::register(&mut registry);
//! ddns_provider_dyndns::register(&mut registry);
//!
//! let provider = registry.create_address_provider(config.router.as_ref())?;
//! ```
//!
//! ## Lookup rules
//!
//! - Backends: an unregistered `serviceType` yields `None`; the entry is
//!   skipped so partially configured files keep working.
//! - Address providers: an unregistered `routerType` is a configuration
//!   error. An absent router block or empty `routerType` selects the
//!   provider registered under [`DEFAULT_ADDRESS_PROVIDER`].
//! - Notifiers: every registered factory is asked; disabled blocks yield
//!   nothing.

use crate::config::{NotificationConfig, RouterConfig, ServiceConfig};
use crate::error::{Error, Result};
use crate::traits::{AddressProvider, Notifier, UpdateBackend};
use crate::traits::{AddressProviderFactory, NotifierFactory, UpdateBackendFactory};
use std::collections::BTreeMap;

/// Registry key of the public-lookup address provider
pub const DEFAULT_ADDRESS_PROVIDER: &str = "default";

/// Registry of collaborator factories
///
/// Built once at start-up with `&mut` access, then shared immutably
/// (typically behind an `Arc`).
#[derive(Default)]
pub struct Registry {
    backends: BTreeMap<String, Box<dyn UpdateBackendFactory>>,
    address_providers: BTreeMap<String, Box<dyn AddressProviderFactory>>,
    notifiers: BTreeMap<String, Box<dyn NotifierFactory>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an update backend factory under a `serviceType`
    pub fn register_backend(
        &mut self,
        service_type: impl Into<String>,
        factory: Box<dyn UpdateBackendFactory>,
    ) {
        self.backends.insert(service_type.into(), factory);
    }

    /// Register an address provider factory under a `routerType`
    pub fn register_address_provider(
        &mut self,
        router_type: impl Into<String>,
        factory: Box<dyn AddressProviderFactory>,
    ) {
        self.address_providers.insert(router_type.into(), factory);
    }

    /// Register a notifier factory under its notification block name
    pub fn register_notifier(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn NotifierFactory>,
    ) {
        self.notifiers.insert(name.into(), factory);
    }

    /// Create the backend for one `services` entry
    ///
    /// # Returns
    ///
    /// - `Ok(Some(_))`: the backend
    /// - `Ok(None)`: the `serviceType` is not registered
    /// - `Err(Error)`: the factory rejected the descriptor
    pub fn create_backend(
        &self,
        service: &ServiceConfig,
    ) -> Result<Option<Box<dyn UpdateBackend>>> {
        match self.backends.get(&service.service_type) {
            Some(factory) => factory.create(service).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve the address provider for the configured router block
    pub fn create_address_provider(
        &self,
        router: Option<&RouterConfig>,
    ) -> Result<Box<dyn AddressProvider>> {
        let router = router.filter(|r| !r.router_type.is_empty());
        let key = router
            .map(|r| r.router_type.as_str())
            .unwrap_or(DEFAULT_ADDRESS_PROVIDER);

        let factory = self
            .address_providers
            .get(key)
            .ok_or_else(|| Error::config(format!("Unknown router type: {}", key)))?;

        factory.create(router)
    }

    /// Create every enabled notifier
    pub fn create_notifiers(
        &self,
        config: &NotificationConfig,
    ) -> Result<Vec<Box<dyn Notifier>>> {
        let mut notifiers = Vec::new();
        for factory in self.notifiers.values() {
            if let Some(notifier) = factory.create(config)? {
                notifiers.push(notifier);
            }
        }
        Ok(notifiers)
    }

    /// Enabled notification blocks with no registered notifier
    pub fn unsupported_notifiers(&self, config: &NotificationConfig) -> Vec<&'static str> {
        config
            .enabled_names()
            .into_iter()
            .filter(|name| !self.has_notifier(name))
            .collect()
    }

    /// List all registered backend types
    pub fn list_backends(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// List all registered router types
    pub fn list_address_providers(&self) -> Vec<String> {
        self.address_providers.keys().cloned().collect()
    }

    /// Check if a backend type is registered
    pub fn has_backend(&self, service_type: &str) -> bool {
        self.backends.contains_key(service_type)
    }

    /// Check if a notifier is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        self.notifiers.contains_key(name)
    }
}
