// # Configuration Store
//
// The single owner of the in-memory Configuration and its backing file.
//
// ## Guard Discipline
//
// Every operation takes the same `tokio::sync::Mutex`:
// - `snapshot`: consistent copy for one orchestration cycle
// - `reload`: replace wholesale from disk
// - `persist`: set the last-known addresses and write the file, unless the
//   file was edited since it was last parsed
//
// A reader therefore never observes a half-installed reload or a
// persisted address that is not also on disk.
//
// ## File Identity
//
// Size plus modification time of the file as last parsed or written.
// `reload` skips parsing when the identity is unchanged, so timestamp-stable
// filesystems never produce spurious reloads, and the store's own writes are
// not mistaken for administrator edits.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Configuration, ServiceConfig};
use crate::error::{Error, Result};
use crate::status::StatusSnapshot;
use crate::traits::PublicAddresses;

/// Size and modification time of the configuration file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileIdentity {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileIdentity {
    /// Stat `path`
    pub async fn of(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path).await?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct StoreInner {
    config: Configuration,
    identity: FileIdentity,
}

/// Hot-reloadable configuration store
///
/// Constructed once at start-up and shared as `Arc<ConfigStore>` between
/// the watcher, the scheduler and the status surface.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

impl ConfigStore {
    /// Load and validate the configuration file
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the file is unreadable or malformed, or its
    /// `updateInterval` does not parse to a positive duration.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (config, identity) = read_config(&path).await?;

        info!(
            path = %path.display(),
            interval = %config.update_interval,
            services = config.services.len(),
            "Configuration loaded"
        );

        Ok(Self {
            path,
            inner: Mutex::new(StoreInner { config, identity }),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current configuration
    pub async fn snapshot(&self) -> Configuration {
        self.inner.lock().await.config.clone()
    }

    /// Identity of the file as last parsed or written
    pub async fn identity(&self) -> FileIdentity {
        self.inner.lock().await.identity
    }

    /// Last persisted addresses plus the given hostname
    pub async fn status(&self, hostname: &str) -> StatusSnapshot {
        let inner = self.inner.lock().await;
        StatusSnapshot {
            ipv4: inner.config.last_public_ipv4,
            ipv6: inner.config.last_public_ipv6,
            hostname: hostname.to_string(),
            last_updated: inner.config.last_updated,
        }
    }

    /// Re-read the file if its identity changed
    ///
    /// # Returns
    ///
    /// The installed configuration and whether it was replaced. An unchanged
    /// identity returns the current value with `false` without parsing.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigStore::load`]. On error the previous configuration
    /// stays installed.
    pub async fn reload(&self) -> Result<(Configuration, bool)> {
        let mut inner = self.inner.lock().await;

        let current = FileIdentity::of(&self.path).await.map_err(|e| {
            Error::config(format!("Failed to stat {}: {}", self.path.display(), e))
        })?;
        if current == inner.identity {
            debug!(path = %self.path.display(), "Configuration file identity unchanged");
            return Ok((inner.config.clone(), false));
        }

        let (config, identity) = read_config(&self.path).await?;
        inner.config = config;
        inner.identity = identity;

        info!(
            path = %self.path.display(),
            interval = %inner.config.update_interval,
            services = inner.config.services.len(),
            "Configuration reloaded"
        );

        Ok((inner.config.clone(), true))
    }

    /// Record `addresses` as the last-known addresses and write the file
    ///
    /// The file is truncated and rewritten in place; a removed file is not
    /// re-created.
    ///
    /// # Errors
    ///
    /// [`Error::Persist`] when the file changed on disk since it was last
    /// parsed (the pending edit is left for the watcher to install), or on
    /// any serialization or I/O failure. The in-memory last-known addresses
    /// are then restored to their values before the call.
    pub async fn persist(&self, addresses: PublicAddresses) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.write_addresses(&mut inner, addresses).await
    }

    /// Like [`ConfigStore::persist`], but only while the installed backend
    /// list still equals `dispatched`
    ///
    /// A reload that changed the services during the cycle makes this fail
    /// with [`Error::Persist`], so the next cycle sees the change again and
    /// dispatches to the new list.
    pub async fn persist_dispatched(
        &self,
        addresses: PublicAddresses,
        dispatched: &[ServiceConfig],
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.config.services != dispatched {
            warn!(
                path = %self.path.display(),
                "Services were reloaded during the cycle, addresses not persisted"
            );
            return Err(Error::persist(
                "services changed during the update cycle; the next cycle re-dispatches",
            ));
        }
        self.write_addresses(&mut inner, addresses).await
    }

    async fn write_addresses(
        &self,
        inner: &mut StoreInner,
        addresses: PublicAddresses,
    ) -> Result<()> {
        // Never overwrite an administrator edit the watcher has not installed yet
        let on_disk = FileIdentity::of(&self.path).await.map_err(|e| {
            Error::persist(format!("Failed to stat {}: {}", self.path.display(), e))
        })?;
        if on_disk != inner.identity {
            warn!(
                path = %self.path.display(),
                "Configuration file changed on disk, addresses not persisted"
            );
            return Err(Error::persist(format!(
                "{} changed on disk since it was last loaded",
                self.path.display()
            )));
        }

        let (prev_ipv4, prev_ipv6, prev_updated) = (
            inner.config.last_public_ipv4,
            inner.config.last_public_ipv6,
            inner.config.last_updated,
        );

        inner.config.last_public_ipv4 = addresses.ipv4;
        inner.config.last_public_ipv6 = addresses.ipv6;
        inner.config.last_updated = Some(Utc::now());

        if let Err(e) = write_config(&self.path, &inner.config).await {
            inner.config.last_public_ipv4 = prev_ipv4;
            inner.config.last_public_ipv6 = prev_ipv6;
            inner.config.last_updated = prev_updated;
            return Err(e);
        }

        match FileIdentity::of(&self.path).await {
            Ok(identity) => inner.identity = identity,
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to stat configuration file after write"
            ),
        }

        debug!(
            path = %self.path.display(),
            ipv4 = %addresses.ipv4_display(),
            ipv6 = %addresses.ipv6_display(),
            "Last-known addresses persisted"
        );
        Ok(())
    }
}

async fn read_config(path: &Path) -> Result<(Configuration, FileIdentity)> {
    let identity = FileIdentity::of(path)
        .await
        .map_err(|e| Error::config(format!("Failed to stat {}: {}", path.display(), e)))?;

    let text = fs::read_to_string(path)
        .await
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;

    let config = Configuration::from_json(&text)?;
    Ok((config, identity))
}

async fn write_config(path: &Path, config: &Configuration) -> Result<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| Error::persist(format!("Failed to serialize configuration: {}", e)))?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| Error::persist(format!("Failed to open {}: {}", path.display(), e)))?;

    file.write_all(json.as_bytes())
        .await
        .map_err(|e| Error::persist(format!("Failed to write {}: {}", path.display(), e)))?;

    file.flush()
        .await
        .map_err(|e| Error::persist(format!("Failed to flush {}: {}", path.display(), e)))?;

    file.sync_all()
        .await
        .map_err(|e| Error::persist(format!("Failed to sync {}: {}", path.display(), e)))?;

    Ok(())
}
