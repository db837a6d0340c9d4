//! One update cycle
//!
//! ## Algorithm
//!
//! 1. Snapshot the configuration under the store's guard
//! 2. No backends: nothing to maintain
//! 3. Resolve the address provider from the router block
//! 4. Query the current addresses
//! 5. Compare with the last persisted addresses ([`address_changed`])
//! 6. Dispatch to every backend in configured order; the first failure
//!    stops the iteration
//! 7. Persist only when every backend succeeded and neither the file nor
//!    the service list changed underneath the cycle
//! 8. Notify; a notifier failure does not undo the persist
//!
//! A failed cycle leaves the persisted addresses untouched, so the next
//! cycle sees the same change and retries the whole backend list. Backends
//! are idempotent, so those that already succeeded converge to a no-op.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::state::ConfigStore;
use crate::traits::{ChangeNotice, PublicAddresses};

/// Default bound on every collaborator call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CycleOutcome {
    /// The configuration lists no backends
    NoBackends,

    /// The observed addresses equal the persisted ones
    Unchanged { addresses: PublicAddresses },

    /// Every backend accepted the addresses and they were persisted
    Updated {
        addresses: PublicAddresses,
        /// Backends that were called
        attempted: usize,
        /// Service types with no registered backend
        skipped: Vec<String>,
    },
}

/// Change detection rule
///
/// True when either last-known half was never recorded, or a recorded half
/// differs from the current observation. A missing last-known address always
/// triggers, even when the current observation of that family is also
/// missing: a host without IPv6 therefore pushes on every cycle.
pub fn address_changed(current: &PublicAddresses, last_known: &PublicAddresses) -> bool {
    last_known.ipv4.is_none()
        || last_known.ipv6.is_none()
        || current.ipv4 != last_known.ipv4
        || current.ipv6 != last_known.ipv6
}

/// Runs update cycles against a shared store and registry
pub struct Orchestrator {
    store: Arc<ConfigStore>,
    registry: Arc<Registry>,
    hostname: String,
    call_timeout: Duration,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// # Parameters
    ///
    /// - `store`: Shared configuration store
    /// - `registry`: Factories for providers, backends and notifiers
    pub fn new(store: Arc<ConfigStore>, registry: Arc<Registry>) -> Self {
        Self {
            store,
            registry,
            hostname: String::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Host name reported in notices
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Bound on each provider, backend and notifier call
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// The shared configuration store
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Run one update cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleOutcome)`: nothing to do, nothing changed, or every backend
    ///   updated and the result persisted
    /// - `Err(Error)`: the first failure of the cycle; see the module docs
    pub async fn perform_update_cycle(&self) -> Result<CycleOutcome> {
        let config = self.store.snapshot().await;

        if config.services.is_empty() {
            debug!("No services configured, nothing to update");
            return Ok(CycleOutcome::NoBackends);
        }

        let provider = self
            .registry
            .create_address_provider(config.router.as_ref())?;

        let current = bounded(self.call_timeout, provider.public_addresses())
            .await
            .map_err(|e| match e {
                e @ Error::Provider(_) => e,
                other => Error::provider(format!("{}: {}", provider.provider_name(), other)),
            })?;

        let last_known = PublicAddresses::new(config.last_public_ipv4, config.last_public_ipv6);
        if !address_changed(&current, &last_known) {
            debug!(ipv4 = %current.ipv4_display(), ipv6 = %current.ipv6_display(), "Addresses unchanged");
            return Ok(CycleOutcome::Unchanged { addresses: current });
        }

        info!(
            ipv4 = %current.ipv4_display(),
            ipv6 = %current.ipv6_display(),
            previous_ipv4 = %last_known.ipv4_display(),
            previous_ipv6 = %last_known.ipv6_display(),
            "Address change detected"
        );

        let (attempted, skipped) = self.dispatch(&config, &current).await?;

        self.store
            .persist_dispatched(current, &config.services)
            .await?;
        info!(ipv4 = %current.ipv4_display(), ipv6 = %current.ipv6_display(), "Addresses persisted");

        self.notify(&config, &current).await?;

        Ok(CycleOutcome::Updated {
            addresses: current,
            attempted,
            skipped,
        })
    }

    /// Update every backend in order, stopping at the first failure
    async fn dispatch(
        &self,
        config: &Configuration,
        addresses: &PublicAddresses,
    ) -> Result<(usize, Vec<String>)> {
        let mut attempted = 0;
        let mut skipped = Vec::new();

        for service in &config.services {
            let backend = match self.registry.create_backend(service) {
                Ok(Some(backend)) => backend,
                Ok(None) => {
                    warn!(
                        service = %service.service_type,
                        domain = %service.target_domain,
                        "Unknown service type, skipping"
                    );
                    skipped.push(service.service_type.clone());
                    continue;
                }
                Err(e) => return Err(Error::backend(&service.service_type, e.to_string())),
            };

            attempted += 1;
            debug!(service = %service.service_type, domain = %service.target_domain, "Updating backend");

            match bounded(self.call_timeout, backend.update(addresses)).await {
                Ok(()) => {
                    info!(
                        service = %service.service_type,
                        domain = %service.target_domain,
                        "Backend updated"
                    );
                }
                Err(e @ Error::Backend { .. }) => return Err(e),
                Err(e) => return Err(Error::backend(&service.service_type, e.to_string())),
            }
        }

        Ok((attempted, skipped))
    }

    /// Send the change notice through every enabled notifier
    ///
    /// All notifiers are tried; the first failure is returned.
    async fn notify(&self, config: &Configuration, addresses: &PublicAddresses) -> Result<()> {
        for name in self.registry.unsupported_notifiers(&config.notifications) {
            warn!(notifier = name, "Notifier enabled but not available in this build, skipping");
        }

        let notifiers = self
            .registry
            .create_notifiers(&config.notifications)
            .map_err(|e| Error::notify(e.to_string()))?;
        if notifiers.is_empty() {
            return Ok(());
        }

        let notice = ChangeNotice {
            domains: config.domains(),
            hostname: self.hostname.clone(),
            addresses: *addresses,
        };

        let mut first_error = None;
        for notifier in &notifiers {
            match bounded(self.call_timeout, notifier.send(&notice)).await {
                Ok(()) => debug!(notifier = notifier.notifier_name(), "Notice sent"),
                Err(e) => {
                    warn!(notifier = notifier.notifier_name(), error = %e, "Notification failed");
                    let e = match e {
                        e @ Error::Notify(_) => e,
                        other => Error::notify(format!("{}: {}", notifier.notifier_name(), other)),
                    };
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn bounded<T, F>(after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(after, call)
        .await
        .map_err(|_| Error::timeout("call", after))?
}
