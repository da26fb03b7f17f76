//! Monitor configuration. Built once from the command line and passed by
//! value to the components that need it; there is no process-wide mutable
//! state.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::monitor::diff::MatchPolicy;

/// Per-probe timeout for the initial discovery sweep. Short, because the
/// population is unknown and latency dominates.
pub const DISCOVERY_TIMEOUT_MS: u64 = 350;

/// Per-probe timeout once monitoring is running. Longer, favoring accuracy
/// when the device set is expected to be mostly stable.
pub const MONITOR_TIMEOUT_MS: u64 = 1000;

/// Seconds between the completion of one monitoring cycle and the start of
/// the next.
pub const CYCLE_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Offer the rename menu after cycles that reported changes.
    pub rename_enabled: bool,
    /// Surrogate ids that get a prominent alert on connect/disconnect.
    pub watched_ids: HashSet<i64>,
    pub discovery_timeout_ms: u64,
    pub monitor_timeout_ms: u64,
    pub interval_secs: u64,
    pub match_policy: MatchPolicy,
    pub registry_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rename_enabled: false,
            watched_ids: HashSet::new(),
            discovery_timeout_ms: DISCOVERY_TIMEOUT_MS,
            monitor_timeout_ms: MONITOR_TIMEOUT_MS,
            interval_secs: CYCLE_INTERVAL_SECS,
            match_policy: MatchPolicy::HardwareAddress,
            registry_path: PathBuf::from("devices.db"),
        }
    }
}
