pub mod icmp;
pub mod neighbor;

use std::net::Ipv4Addr;
use std::time::Duration;

/// Classification of a single reachability probe. Timeouts, ICMP errors
/// and send failures are all equivalent misses, never process errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
}

/// Result of sweeping one /24 range. `reachable` is a set; ordering is not
/// significant because probes run concurrently.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub reachable: Vec<Ipv4Addr>,
    pub probes_sent: usize,
    pub elapsed: Duration,
}

/// Raw ICMP sockets need elevated privileges on most systems. Checked once
/// at startup so the operator gets a clear warning instead of an empty LAN.
pub fn can_probe() -> bool {
    use socket2::{Domain, Protocol, Socket, Type};
    Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).is_ok()
}
