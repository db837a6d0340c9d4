//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces of the external collaborators.
//!
//! - [`AddressProvider`]: Discover the current public addresses
//! - [`UpdateBackend`]: Push addresses to one DNS service
//! - [`Notifier`]: Announce a completed change

pub mod address_provider;
pub mod update_backend;
pub mod notifier;

pub use address_provider::{AddressProvider, AddressProviderFactory, PublicAddresses};
pub use update_backend::{UpdateBackend, UpdateBackendFactory};
pub use notifier::{ChangeNotice, Notifier, NotifierFactory};
