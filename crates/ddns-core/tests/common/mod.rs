//! Test doubles and common utilities for contract tests
//!
//! Every double shares its counters through `Arc`s so a test can keep a
//! handle after the factory moved into the registry.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{NotificationConfig, RouterConfig, ServiceConfig};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{
    AddressProvider, AddressProviderFactory, ChangeNotice, Notifier, NotifierFactory,
    PublicAddresses, UpdateBackend, UpdateBackendFactory,
};
use ddns_core::{ConfigStore, DEFAULT_ADDRESS_PROVIDER, Orchestrator, Registry};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const IP_A: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 9);
pub const IP_B: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 10);
pub const IP6_A: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
pub const IP6_B: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2);

/// An address provider whose answer the test controls
#[derive(Clone)]
pub struct ControlledAddressProvider {
    addresses: Arc<Mutex<PublicAddresses>>,
    failing: Arc<AtomicBool>,
    call_count: Arc<AtomicUsize>,
}

impl ControlledAddressProvider {
    pub fn new(addresses: PublicAddresses) -> Self {
        Self {
            addresses: Arc::new(Mutex::new(addresses)),
            failing: Arc::new(AtomicBool::new(false)),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change the addresses returned by the next call
    pub fn set(&self, addresses: PublicAddresses) {
        *self.addresses.lock().unwrap() = addresses;
    }

    /// Make subsequent calls fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get the number of times public_addresses() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressProvider for ControlledAddressProvider {
    async fn public_addresses(&self) -> Result<PublicAddresses> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::provider("lookup service unreachable"));
        }
        Ok(*self.addresses.lock().unwrap())
    }

    fn provider_name(&self) -> &'static str {
        "controlled"
    }
}

impl AddressProviderFactory for ControlledAddressProvider {
    fn create(&self, _router: Option<&RouterConfig>) -> Result<Box<dyn AddressProvider>> {
        Ok(Box::new(self.clone()))
    }
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub backend: &'static str,
    pub domain: String,
    pub addresses: PublicAddresses,
}

/// Ordered log of backend calls, shared by every recording backend
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<BackendCall>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: BackendCall) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Number of calls made to backends of one service type
    pub fn count_for(&self, backend: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.backend == backend)
            .count()
    }

    /// Service types in call order
    pub fn order(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().iter().map(|c| c.backend).collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// A backend that records its calls and can be switched to fail
pub struct RecordingBackend {
    name: &'static str,
    domain: String,
    log: CallLog,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl UpdateBackend for RecordingBackend {
    async fn update(&self, addresses: &PublicAddresses) -> Result<()> {
        self.log.push(BackendCall {
            backend: self.name,
            domain: self.domain.clone(),
            addresses: *addresses,
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::backend(self.name, "update rejected"));
        }
        Ok(())
    }

    fn service_type(&self) -> &'static str {
        self.name
    }
}

/// Factory for [`RecordingBackend`]s of one service type
#[derive(Clone)]
pub struct RecordingBackendFactory {
    name: &'static str,
    log: CallLog,
    failing: Arc<AtomicBool>,
}

impl RecordingBackendFactory {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: log.clone(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A factory whose backends fail every update
    pub fn failing(name: &'static str, log: &CallLog) -> Self {
        let factory = Self::new(name, log);
        factory.set_failing(true);
        factory
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl UpdateBackendFactory for RecordingBackendFactory {
    fn create(&self, service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>> {
        Ok(Box::new(RecordingBackend {
            name: self.name,
            domain: service.target_domain.clone(),
            log: self.log.clone(),
            failing: Arc::clone(&self.failing),
        }))
    }
}

/// A factory that rejects every descriptor, like a backend missing its token
pub struct RejectingBackendFactory;

impl UpdateBackendFactory for RejectingBackendFactory {
    fn create(&self, _service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>> {
        Err(Error::config("token is required"))
    }
}

/// A backend that blocks inside `update` until released
#[derive(Clone)]
pub struct BlockingBackendFactory {
    started: Arc<Notify>,
    release: Arc<Notify>,
    call_count: Arc<AtomicUsize>,
}

impl BlockingBackendFactory {
    pub fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait until a call is blocked inside `update`
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let the blocked call return
    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

struct BlockingBackend(BlockingBackendFactory);

#[async_trait]
impl UpdateBackend for BlockingBackend {
    async fn update(&self, _addresses: &PublicAddresses) -> Result<()> {
        self.0.call_count.fetch_add(1, Ordering::SeqCst);
        self.0.started.notify_one();
        self.0.release.notified().await;
        Ok(())
    }

    fn service_type(&self) -> &'static str {
        "Blocking"
    }
}

impl UpdateBackendFactory for BlockingBackendFactory {
    fn create(&self, _service: &ServiceConfig) -> Result<Box<dyn UpdateBackend>> {
        Ok(Box::new(BlockingBackend(self.clone())))
    }
}

/// A notifier that records notices; enabled by the `sipgateSMS` block
#[derive(Clone)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<ChangeNotice>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            notices: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn notices(&self) -> Vec<ChangeNotice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notice: &ChangeNotice) -> Result<()> {
        self.notices.lock().unwrap().push(notice.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::notify("gateway refused message"));
        }
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

impl NotifierFactory for RecordingNotifier {
    fn create(&self, config: &NotificationConfig) -> Result<Option<Box<dyn Notifier>>> {
        if !config.sipgate_sms.enabled {
            return Ok(None);
        }
        Ok(Some(Box::new(self.clone())))
    }
}

/// Write a configuration file into `dir`
pub fn write_config(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("config.json");
    std::fs::write(&path, json).unwrap();
    path
}

/// Replace the file contents with write-then-rename
pub fn replace_config(path: &Path, json: &str) {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).unwrap();
    std::fs::rename(&tmp, path).unwrap();
}

/// Configuration JSON with the given interval and `(serviceType, domain)` entries
pub fn config_json(interval: &str, services: &[(&str, &str)]) -> String {
    let services: Vec<serde_json::Value> = services
        .iter()
        .map(|(service_type, domain)| {
            serde_json::json!({ "serviceType": service_type, "targetDomain": domain })
        })
        .collect();
    serde_json::json!({ "updateInterval": interval, "services": services }).to_string()
}

/// Registry with `provider` as the default address provider
pub fn registry_with(provider: &ControlledAddressProvider) -> Registry {
    let mut registry = Registry::new();
    registry.register_address_provider(DEFAULT_ADDRESS_PROVIDER, Box::new(provider.clone()));
    registry
}

/// Load the store and build an orchestrator over it
pub async fn orchestrator(path: &Path, registry: Registry) -> (Arc<ConfigStore>, Arc<Orchestrator>) {
    let store = Arc::new(ConfigStore::load(path).await.unwrap());
    let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::new(registry))
        .with_hostname("test-host")
        .with_call_timeout(Duration::from_secs(2));
    (store, Arc::new(orchestrator))
}

/// Read the persisted file back
pub fn read_persisted(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}
