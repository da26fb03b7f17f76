//! Pure diff between the previous live set and the current sweep result.
//! Both sides are immutable snapshots; the caller replaces its live set
//! atomically with the diff's output rather than editing it in place.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};

use crate::device::Device;

/// How live devices are matched against a sweep result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Match by transient address. A DHCP lease renewal is reported as a
    /// disconnect of the old address plus a connect of a "new" device.
    NetworkAddress,
    /// Match by the durable identity key, so a device surviving an address
    /// change stays connected. Falls back to address matching for devices
    /// whose MAC was never resolved.
    HardwareAddress,
}

/// Outcome of diffing one sweep.
#[derive(Debug, Default)]
pub struct SweepDiff {
    /// Previously live devices absent from the current sweep.
    pub disconnected: Vec<Device>,
    /// Previously live devices still reachable, addresses refreshed.
    pub surviving: Vec<Device>,
    /// Current addresses not consumed by any previous device: newcomers.
    pub fresh: Vec<Ipv4Addr>,
}

/// Diff the previous live set against the current reachable addresses.
/// Each current address is consumed by at most one previous device, so a
/// matched address cannot also surface as a newcomer. Emits exactly
/// |previous \ current| disconnects and |current \ previous| newcomers.
pub fn diff_sweep(
    previous: &[Device],
    current: &[Ipv4Addr],
    current_macs: &HashMap<Ipv4Addr, MacAddr>,
    policy: MatchPolicy,
) -> SweepDiff {
    let mut consumed: HashSet<Ipv4Addr> = HashSet::new();
    let mut diff = SweepDiff::default();

    for device in previous {
        let matched = match policy {
            MatchPolicy::NetworkAddress => current
                .iter()
                .copied()
                .find(|ip| *ip == device.ip && !consumed.contains(ip)),
            MatchPolicy::HardwareAddress => device
                .mac
                .and_then(|mac| {
                    current.iter().copied().find(|ip| {
                        !consumed.contains(ip) && current_macs.get(ip) == Some(&mac)
                    })
                })
                .or_else(|| {
                    // MAC never resolved, or not in this pass's cache
                    // snapshot; the address is the only key left.
                    current
                        .iter()
                        .copied()
                        .find(|ip| *ip == device.ip && !consumed.contains(ip))
                }),
        };

        match matched {
            Some(ip) => {
                consumed.insert(ip);
                let mut survivor = device.clone();
                survivor.ip = ip;
                diff.surviving.push(survivor);
            }
            None => diff.disconnected.push(device.clone()),
        }
    }

    diff.fresh = current
        .iter()
        .copied()
        .filter(|ip| !consumed.contains(ip))
        .collect();
    diff
}
