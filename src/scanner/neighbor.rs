//! Neighbor cache snapshot. The echo probes already populated the OS ARP
//! table as a side effect; this module takes one read-only snapshot of it
//! per enrichment pass and answers MAC lookups from that. Entries expire,
//! so a miss is expected and never an error.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::process::Command;
use std::str::FromStr;

use log::debug;
use pnet::util::MacAddr;

const PROC_ARP: &str = "/proc/net/arp";

/// One snapshot of the OS neighbor/address-resolution cache.
#[derive(Debug, Clone)]
pub struct NeighborCache {
    entries: HashMap<Ipv4Addr, MacAddr>,
}

impl NeighborCache {
    /// Read the cache once, preferring procfs and falling back to the
    /// `ip neigh show` command where procfs is unavailable.
    pub fn snapshot() -> Self {
        let text = std::fs::read_to_string(PROC_ARP)
            .or_else(|_| {
                Command::new("ip")
                    .args(["neigh", "show"])
                    .output()
                    .map(|out| String::from_utf8_lossy(&out.stdout).into_owned())
            })
            .unwrap_or_else(|e| {
                debug!("neighbor cache unavailable: {}", e);
                String::new()
            });
        Self::parse(&text)
    }

    /// Line-oriented scan: any line carrying both an IPv4-shaped token and
    /// a six-octet MAC-shaped token is an entry. Incomplete entries show a
    /// zero MAC and are skipped.
    fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        for line in text.lines() {
            let mut ip = None;
            let mut mac = None;
            for token in line.split_whitespace() {
                if ip.is_none() && let Ok(v4) = Ipv4Addr::from_str(token) {
                    ip = Some(v4);
                } else if mac.is_none() && let Some(parsed) = parse_mac(token) {
                    mac = Some(parsed);
                }
            }
            if let (Some(ip), Some(mac)) = (ip, mac)
                && mac != MacAddr::zero()
            {
                entries.insert(ip, mac);
            }
        }
        Self { entries }
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.entries.get(&ip).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn from_entries(entries: HashMap<Ipv4Addr, MacAddr>) -> Self {
        Self { entries }
    }
}

/// Parse a MAC token in colon- or hyphen-delimited hex-octet form. The
/// canonical form everywhere downstream is the colon-delimited lowercase
/// rendering of [`MacAddr`].
pub fn parse_mac(token: &str) -> Option<MacAddr> {
    let canonical = token.replace('-', ":");
    MacAddr::from_str(&canonical).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_procfs_format() {
        let text = "IP address       HW type     Flags       HW address            Mask     Device\n\
                    192.168.1.1      0x1         0x2         a4:91:b1:07:33:10     *        wlan0\n\
                    192.168.1.20     0x1         0x2         00:1c:b3:09:85:15     *        wlan0\n";
        let cache = NeighborCache::parse(text);
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.lookup("192.168.1.1".parse().unwrap()),
            Some("a4:91:b1:07:33:10".parse().unwrap())
        );
    }

    #[test]
    fn parses_ip_neigh_format() {
        let text = "192.168.1.5 dev eth0 lladdr 5c:aa:fd:12:34:56 REACHABLE\n\
                    192.168.1.9 dev eth0  FAILED\n";
        let cache = NeighborCache::parse(text);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.lookup("192.168.1.5".parse().unwrap()),
            Some("5c:aa:fd:12:34:56".parse().unwrap())
        );
        assert_eq!(cache.lookup("192.168.1.9".parse().unwrap()), None);
    }

    #[test]
    fn skips_incomplete_entries() {
        let text = "192.168.1.77     0x1         0x0         00:00:00:00:00:00     *        wlan0\n";
        let cache = NeighborCache::parse(text);
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_miss_is_none() {
        let cache = NeighborCache::parse("");
        assert_eq!(cache.lookup("10.0.0.1".parse().unwrap()), None);
    }

    #[test]
    fn mac_token_accepts_both_delimiters() {
        let colon = parse_mac("AA:BB:CC:DD:EE:FF").unwrap();
        let hyphen = parse_mac("AA-BB-CC-DD-EE-FF").unwrap();
        assert_eq!(colon, hyphen);
        // Canonical rendering is lowercase colon form
        assert_eq!(colon.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn mac_token_rejects_garbage() {
        assert_eq!(parse_mac("wlan0"), None);
        assert_eq!(parse_mac("0x2"), None);
        assert_eq!(parse_mac("aa:bb:cc:dd:ee"), None);
    }
}
