//! Update engine
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  ReloadEvent   ┌─────────────┐   tick    ┌──────────────┐
//! │ FileWatcher │───(rendezvous)►│  Scheduler  │──────────►│ Orchestrator │
//! └─────────────┘                └─────────────┘           └──────────────┘
//!        │ reload                                                 │
//!        ▼                                                        │ snapshot / persist
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                    ConfigStore (Mutex<Configuration>)                    │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The orchestrator fans out to the address provider, backends and
//! notifiers resolved from the [`Registry`](crate::Registry).

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{CycleOutcome, DEFAULT_CALL_TIMEOUT, Orchestrator, address_changed};
pub use scheduler::{Scheduler, SchedulerEvent};
