use std::path::PathBuf;

use clap::Parser;

use crate::config::{CYCLE_INTERVAL_SECS, MonitorConfig};
use crate::monitor::diff::MatchPolicy;

/// Watches the local network and alerts when devices connect or disconnect.
/// Device names persist in a SQLite file next to the program.
#[derive(Debug, Parser)]
#[command(name = "lansentry", version, about)]
pub struct Args {
    /// Print the current device list and exit
    #[arg(short, long)]
    pub connections: bool,

    /// Offer to rename devices whenever changes are reported
    #[arg(short, long)]
    pub rename: bool,

    /// Surrogate ids of devices to raise alerts for
    #[arg(short, long, value_name = "ID", num_args = 1..)]
    pub monitor: Vec<i64>,

    /// Match devices across sweeps by network address instead of hardware
    /// address; a DHCP lease change then reads as disconnect plus connect
    #[arg(long)]
    pub match_by_ip: bool,

    /// Path of the device registry database
    #[arg(long, default_value = "devices.db", value_name = "PATH")]
    pub db: PathBuf,

    /// Seconds between monitoring cycles
    #[arg(long, default_value_t = CYCLE_INTERVAL_SECS, value_name = "SECS")]
    pub interval: u64,
}

impl Args {
    pub fn to_config(&self) -> MonitorConfig {
        MonitorConfig {
            rename_enabled: self.rename,
            watched_ids: self.monitor.iter().copied().collect(),
            match_policy: if self.match_by_ip {
                MatchPolicy::NetworkAddress
            } else {
                MatchPolicy::HardwareAddress
            },
            registry_path: self.db.clone(),
            interval_secs: self.interval.max(1),
            ..MonitorConfig::default()
        }
    }
}
