// # ddns-core
//
// Core library for the configuration-driven DDNS update scheduler.
//
// ## Architecture Overview
//
// - **ConfigStore**: the one in-memory Configuration, guarded and backed by
//   the JSON file that also records the last pushed addresses
// - **FileWatcher**: polls the file and hands live reloads to the scheduler
// - **Scheduler**: repeating timer, re-armed when the interval changes
// - **Orchestrator**: one update cycle (detect, dispatch, persist, notify)
// - **AddressProvider / UpdateBackend / Notifier**: collaborator traits
//   implemented by the plug-in crates
// - **Registry**: maps configuration type strings to collaborator factories
//
// ## Design Principles
//
// 1. **Single owner**: the Configuration lives in one `ConfigStore`, passed by `Arc`
// 2. **Persist after full success**: a partially failed cycle is retried whole
// 3. **Plugin-Based**: collaborators are registered, never hard-coded
// 4. **Library-First**: the daemon only wires these pieces together

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod state;
pub mod status;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    Configuration, NotificationConfig, RouterConfig, ServiceConfig, parse_interval,
};
pub use engine::{CycleOutcome, Orchestrator, Scheduler, SchedulerEvent, address_changed};
pub use error::{Error, ErrorKind, Result};
pub use registry::{DEFAULT_ADDRESS_PROVIDER, Registry};
pub use state::{ConfigStore, FileIdentity, FileWatcher, ReloadEvent, reload_channel};
pub use status::StatusSnapshot;
pub use traits::{
    AddressProvider, AddressProviderFactory, ChangeNotice, Notifier, NotifierFactory,
    PublicAddresses, UpdateBackend, UpdateBackendFactory,
};
