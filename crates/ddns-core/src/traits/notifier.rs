// # Notifier Trait
//
// Delivers a human-readable notice after a change was pushed and persisted.

use async_trait::async_trait;

use crate::config::NotificationConfig;
use crate::traits::PublicAddresses;

/// What changed, rendered by every notifier the same way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    /// Target domains of every configured backend
    pub domains: Vec<String>,
    /// Host that performed the update
    pub hostname: String,
    /// The addresses now published
    pub addresses: PublicAddresses,
}

impl ChangeNotice {
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    pub fn domains_str(&self) -> String {
        self.domains.join(",")
    }

    /// Short subject line
    pub fn subject(&self) -> &'static str {
        "ddns ip address update"
    }

    /// Message body
    pub fn render(&self) -> String {
        let plural = if self.domain_count() > 1 { "s" } else { "" };
        format!(
            "The IP addresses for domain{} '{}' were updated to:\n{}\n{}\nby: {}",
            plural,
            self.domains_str(),
            self.addresses.ipv4_display(),
            self.addresses.ipv6_display(),
            self.hostname
        )
    }
}

/// Trait for notifier implementations
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one notice
    async fn send(&self, notice: &ChangeNotice) -> Result<(), crate::Error>;

    /// Get the notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create the notifier if its configuration block is enabled
    ///
    /// Returns `Ok(None)` for a disabled block.
    fn create(
        &self,
        config: &NotificationConfig,
    ) -> Result<Option<Box<dyn Notifier>>, crate::Error>;
}
