// # Shared State
//
// The configuration file doubles as the state file. `ConfigStore` owns it;
// `FileWatcher` keeps the in-memory copy in sync with administrator edits.

pub mod store;
pub mod watcher;

pub use store::{ConfigStore, FileIdentity};
pub use watcher::{DEFAULT_POLL_INTERVAL, FileWatcher, ReloadEvent, reload_channel};
