//! Local identity: this host's own IPv4 address and MAC, resolved once at
//! startup from the OS interface configuration. Used to anchor the sweep
//! range and to keep the host out of its own device list.

use std::net::{IpAddr, Ipv4Addr};

use pnet::datalink;
use pnet::util::MacAddr;

use crate::error::{LanError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// Pick the first interface that is up, not loopback, and carries both an
/// IPv4 address and a MAC. Failing that, the host has no usable identity
/// and monitoring cannot start.
pub fn resolve() -> Result<LocalIdentity> {
    datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .find_map(|iface| {
            let mac = iface.mac.filter(|m| *m != MacAddr::zero())?;
            let ip = iface.ips.iter().find_map(|ip| match ip.ip() {
                IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
                _ => None,
            })?;
            Some(LocalIdentity { ip, mac })
        })
        .ok_or(LanError::IdentityUnavailable)
}
