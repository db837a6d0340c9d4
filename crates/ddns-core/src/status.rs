//! Read-only status surface
//!
//! A snapshot of the last persisted addresses, served by the daemon's
//! optional HTTP endpoint. Reading it never triggers an update cycle.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Last persisted addresses and the reporting host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub hostname: String,
    pub last_updated: Option<DateTime<Utc>>,
}
