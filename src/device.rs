//! The device record tracked by the monitor. Hardware address is the
//! durable identity key; the network address is whatever the most recent
//! sweep saw and may change under it.

use std::net::Ipv4Addr;

use pnet::util::MacAddr;

/// Sentinel stored in the registry for devices nobody has named yet.
/// In memory the unresolved states are `None`, not this string.
pub const UNNAMED: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Surrogate id from the registry, assigned once per MAC.
    pub id: Option<i64>,
    /// Current transient address from the latest sweep.
    pub ip: Ipv4Addr,
    /// Durable identity key; `None` until the neighbor cache resolves it.
    pub mac: Option<MacAddr>,
    /// User- or vendor-supplied display name; `None` while unresolved.
    pub name: Option<String>,
}

impl Device {
    /// A freshly sighted device: only its address is known.
    pub fn seen_at(ip: Ipv4Addr) -> Self {
        Self {
            id: None,
            ip,
            mac: None,
            name: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }

    pub fn mac_display(&self) -> String {
        match self.mac {
            Some(mac) => mac.to_string(),
            None => UNNAMED.to_string(),
        }
    }

    pub fn id_display(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => "?".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sighting_is_unresolved() {
        let device = Device::seen_at("192.168.1.5".parse().unwrap());
        assert_eq!(device.id, None);
        assert_eq!(device.mac, None);
        assert_eq!(device.name, None);
        assert_eq!(device.display_name(), UNNAMED);
        assert_eq!(device.mac_display(), UNNAMED);
        assert_eq!(device.id_display(), "?");
    }

    #[test]
    fn resolved_fields_display() {
        let mut device = Device::seen_at("192.168.1.5".parse().unwrap());
        device.id = Some(7);
        device.mac = Some("aa:bb:cc:dd:ee:ff".parse().unwrap());
        device.name = Some("Kitchen TV".to_string());
        assert_eq!(device.display_name(), "Kitchen TV");
        assert_eq!(device.mac_display(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(device.id_display(), "7");
    }
}
