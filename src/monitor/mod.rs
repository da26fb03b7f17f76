//! Change detection. Each cycle re-runs the sweep/resolve/enrich pipeline,
//! diffs the result against the previous live set, and emits typed events.
//! Cycles never overlap and the live set is replaced wholesale per cycle.

pub mod diff;

use std::collections::HashMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use pnet::util::MacAddr;

use crate::config::MonitorConfig;
use crate::device::Device;
use crate::error::Result;
use crate::identity::LocalIdentity;
use crate::registry::DeviceRegistry;
use crate::scanner::icmp::IcmpSweeper;
use crate::scanner::neighbor::NeighborCache;
use crate::vendor::VendorLookup;

use self::diff::diff_sweep;

/// A connect or disconnect observed between two cycles.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Connected {
        device: Device,
        at: DateTime<Local>,
    },
    Disconnected {
        device: Device,
        at: DateTime<Local>,
    },
}

impl DeviceEvent {
    pub fn device(&self) -> &Device {
        match self {
            DeviceEvent::Connected { device, .. } => device,
            DeviceEvent::Disconnected { device, .. } => device,
        }
    }
}

pub struct ChangeDetector<V> {
    config: MonitorConfig,
    identity: LocalIdentity,
    registry: DeviceRegistry,
    vendor: V,
    live: Vec<Device>,
}

impl<V: VendorLookup> ChangeDetector<V> {
    pub fn new(
        config: MonitorConfig,
        identity: LocalIdentity,
        registry: DeviceRegistry,
        vendor: V,
    ) -> Self {
        Self {
            config,
            identity,
            registry,
            vendor,
            live: Vec::new(),
        }
    }

    /// Devices believed currently connected.
    pub fn live(&self) -> &[Device] {
        &self.live
    }

    /// Initial discovery pass. The enriched snapshot becomes the baseline
    /// the first monitoring cycle diffs against.
    pub async fn discover(&mut self) -> Result<Vec<Device>> {
        let report = IcmpSweeper::new()
            .with_timeout(self.config.discovery_timeout_ms)
            .sweep(self.identity.ip)
            .await?;
        info!(
            "discovery: {} probes in {:.1?}, {} reachable",
            report.probes_sent,
            report.elapsed,
            report.reachable.len()
        );

        let cache = NeighborCache::snapshot();
        debug!("neighbor cache snapshot holds {} entries", cache.len());
        let mut devices = Vec::with_capacity(report.reachable.len());
        for ip in report.reachable {
            devices.push(self.enrich(Device::seen_at(ip), &cache).await);
        }

        self.live = devices.clone();
        Ok(devices)
    }

    /// One monitoring cycle: sweep, diff, enrich newcomers, emit events.
    /// Enrichment finishes before a newcomer's connect event is produced,
    /// so the event carries a resolved name when one exists.
    pub async fn run_cycle(&mut self) -> Result<Vec<DeviceEvent>> {
        let report = IcmpSweeper::new()
            .with_timeout(self.config.monitor_timeout_ms)
            .sweep(self.identity.ip)
            .await?;
        debug!(
            "cycle sweep: {} probes, {} reachable",
            report.probes_sent,
            report.reachable.len()
        );

        let cache = NeighborCache::snapshot();
        Ok(self.apply_sweep(report.reachable, &cache).await)
    }

    /// Diff one sweep result against the live set, enrich newcomers, emit
    /// events, and atomically replace the live snapshot. A cycle that
    /// brings newcomers also retries survivors the vendor service left
    /// unnamed on an earlier pass.
    async fn apply_sweep(
        &mut self,
        reachable: Vec<Ipv4Addr>,
        cache: &NeighborCache,
    ) -> Vec<DeviceEvent> {
        let current_macs: HashMap<Ipv4Addr, MacAddr> = reachable
            .iter()
            .filter_map(|&ip| cache.lookup(ip).map(|mac| (ip, mac)))
            .collect();

        let diff = diff_sweep(
            &self.live,
            &reachable,
            &current_macs,
            self.config.match_policy,
        );

        let mut events = Vec::new();
        for device in diff.disconnected {
            events.push(DeviceEvent::Disconnected {
                device,
                at: Local::now(),
            });
        }

        let had_newcomers = !diff.fresh.is_empty();
        let mut next_live = Vec::with_capacity(diff.surviving.len() + diff.fresh.len());
        for device in diff.surviving {
            let device = if had_newcomers && device.name.is_none() {
                self.enrich(device, cache).await
            } else {
                device
            };
            next_live.push(device);
        }

        for ip in diff.fresh {
            let device = self.enrich(Device::seen_at(ip), cache).await;
            events.push(DeviceEvent::Connected {
                device: device.clone(),
                at: Local::now(),
            });
            next_live.push(device);
        }

        self.live = next_live;
        events
    }

    /// Full enrichment for one sighting. Registration strictly precedes id
    /// assignment and name hydration, both of which read the row; the
    /// vendor service is consulted only when hydration left the device
    /// unnamed, so a user-stored name always wins.
    async fn enrich(&mut self, mut device: Device, cache: &NeighborCache) -> Device {
        device.mac = cache.lookup(device.ip);
        let Some(mac) = device.mac else {
            debug!(
                "no neighbor cache entry for {}; device stays unresolved",
                device.ip
            );
            return device;
        };

        if let Err(e) = self.registry.ensure_registered(mac) {
            warn!("could not register {}: {}", mac, e);
            return device;
        }
        self.registry.assign_id(&mut device);
        self.registry.hydrate_name(&mut device);

        if device.name.is_none()
            && let Some(name) = self.vendor.resolve(mac).await
        {
            if let Err(e) = self.registry.set_name(mac, &name) {
                warn!("could not store vendor name for {}: {}", mac, e);
            }
            device.name = Some(name);
        }

        device
    }

    /// Rename a live device by surrogate id, persisting the new name.
    /// Returns false when no live device carries that id.
    pub fn rename_device(&mut self, id: i64, name: &str) -> bool {
        let Some(device) = self.live.iter_mut().find(|d| d.id == Some(id)) else {
            return false;
        };
        let Some(mac) = device.mac else {
            warn!("device #{} has no resolved MAC; cannot persist a name", id);
            return false;
        };
        if let Err(e) = self.registry.set_name(mac, name) {
            warn!("could not store name for {}: {}", mac, e);
            return false;
        }
        device.name = Some(name.to_string());
        true
    }

    /// Replace a live device's name with a vendor-derived one, on request.
    pub async fn rename_from_vendor(&mut self, id: i64) -> Option<String> {
        let mac = self
            .live
            .iter()
            .find(|d| d.id == Some(id))
            .and_then(|d| d.mac)?;
        let name = self.vendor.resolve(mac).await?;
        self.rename_device(id, &name).then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    use crate::config::MonitorConfig;
    use crate::identity::LocalIdentity;
    use crate::registry::DeviceRegistry;

    /// Scripted vendor source that counts how often it is consulted.
    struct ScriptedVendor {
        answer: Option<String>,
        calls: usize,
    }

    impl ScriptedVendor {
        fn answering(answer: Option<&str>) -> Self {
            Self {
                answer: answer.map(str::to_string),
                calls: 0,
            }
        }
    }

    impl VendorLookup for ScriptedVendor {
        async fn resolve(&mut self, _mac: MacAddr) -> Option<String> {
            self.calls += 1;
            self.answer.clone()
        }
    }

    fn detector(vendor: ScriptedVendor) -> ChangeDetector<ScriptedVendor> {
        let identity = LocalIdentity {
            ip: "192.168.1.10".parse().unwrap(),
            mac: "00:11:22:33:44:55".parse().unwrap(),
        };
        ChangeDetector::new(
            MonitorConfig::default(),
            identity,
            DeviceRegistry::open_in_memory().unwrap(),
            vendor,
        )
    }

    fn cache_with(ip: &str, mac: &str) -> NeighborCache {
        NeighborCache::from_entries(Map::from([(
            ip.parse().unwrap(),
            mac.parse().unwrap(),
        )]))
    }

    #[tokio::test]
    async fn enrichment_assigns_identity_and_vendor_name() {
        let mut detector = detector(ScriptedVendor::answering(Some("Acme Industries")));
        let cache = cache_with("192.168.1.5", "aa:bb:cc:dd:ee:ff");

        let device = detector
            .enrich(Device::seen_at("192.168.1.5".parse().unwrap()), &cache)
            .await;

        assert!(device.id.is_some());
        assert_eq!(device.name.as_deref(), Some("Acme Industries"));
        assert_eq!(detector.vendor.calls, 1);

        // The vendor name was persisted, so the registry serves it back
        let rows = detector.registry.all_devices().unwrap();
        assert_eq!(rows[0].name, "Acme Industries");
    }

    #[tokio::test]
    async fn stored_name_suppresses_vendor_lookup() {
        let mut detector = detector(ScriptedVendor::answering(Some("Acme Industries")));
        let mac: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        detector.registry.ensure_registered(mac).unwrap();
        detector.registry.set_name(mac, "Kitchen TV").unwrap();

        let cache = cache_with("192.168.1.77", "aa:bb:cc:dd:ee:ff");
        let device = detector
            .enrich(Device::seen_at("192.168.1.77".parse().unwrap()), &cache)
            .await;

        assert_eq!(device.name.as_deref(), Some("Kitchen TV"));
        assert_eq!(detector.vendor.calls, 0);
    }

    #[tokio::test]
    async fn vendor_failure_leaves_the_sentinel_and_retries_next_pass() {
        let mut detector = detector(ScriptedVendor::answering(None));
        let cache = cache_with("192.168.1.5", "aa:bb:cc:dd:ee:ff");

        let device = detector
            .enrich(Device::seen_at("192.168.1.5".parse().unwrap()), &cache)
            .await;
        assert_eq!(device.name, None);
        assert_eq!(detector.vendor.calls, 1);

        // Stored row still carries the sentinel
        let rows = detector.registry.all_devices().unwrap();
        assert_eq!(rows[0].name, crate::device::UNNAMED);

        // Device still present and still unnamed on a later pass: retried
        let again = detector
            .enrich(Device::seen_at("192.168.1.5".parse().unwrap()), &cache)
            .await;
        assert_eq!(again.name, None);
        assert_eq!(detector.vendor.calls, 2);
    }

    #[tokio::test]
    async fn unresolved_mac_skips_registration_entirely() {
        let mut detector = detector(ScriptedVendor::answering(Some("Acme Industries")));
        let cache = NeighborCache::from_entries(Map::new());

        let device = detector
            .enrich(Device::seen_at("192.168.1.5".parse().unwrap()), &cache)
            .await;

        assert_eq!(device.mac, None);
        assert_eq!(device.id, None);
        assert_eq!(detector.vendor.calls, 0);
        assert!(detector.registry.all_devices().unwrap().is_empty());
    }

    #[tokio::test]
    async fn newcomer_cycle_retries_unnamed_survivors() {
        let mut detector = detector(ScriptedVendor::answering(Some("Acme Industries")));
        let cache = NeighborCache::from_entries(Map::from([
            ("192.168.1.5".parse().unwrap(), "aa:00:00:00:00:05".parse().unwrap()),
            ("192.168.1.20".parse().unwrap(), "aa:00:00:00:00:14".parse().unwrap()),
        ]));

        // Survivor whose vendor lookup failed when it first appeared
        let mut survivor = Device::seen_at("192.168.1.5".parse().unwrap());
        survivor.mac = Some("aa:00:00:00:00:05".parse().unwrap());
        detector.registry.ensure_registered(survivor.mac.unwrap()).unwrap();
        detector.live = vec![survivor];

        let events = detector
            .apply_sweep(
                vec!["192.168.1.5".parse().unwrap(), "192.168.1.20".parse().unwrap()],
                &cache,
            )
            .await;

        // One connect for the newcomer; the survivor got its name filled in
        assert_eq!(events.len(), 1);
        assert_eq!(detector.vendor.calls, 2);
        assert!(detector.live.iter().all(|d| d.name.is_some()));
    }

    #[tokio::test]
    async fn quiet_cycle_leaves_unnamed_survivors_alone() {
        let mut detector = detector(ScriptedVendor::answering(Some("Acme Industries")));
        let cache = cache_with("192.168.1.5", "aa:00:00:00:00:05");

        let mut survivor = Device::seen_at("192.168.1.5".parse().unwrap());
        survivor.mac = Some("aa:00:00:00:00:05".parse().unwrap());
        detector.live = vec![survivor];

        let events = detector
            .apply_sweep(vec!["192.168.1.5".parse().unwrap()], &cache)
            .await;

        assert!(events.is_empty());
        assert_eq!(detector.vendor.calls, 0);
        assert_eq!(detector.live[0].name, None);
    }

    #[tokio::test]
    async fn reconnect_at_a_new_address_rehydrates_the_stored_name() {
        let mut detector = detector(ScriptedVendor::answering(None));

        let cache = cache_with("192.168.1.30", "aa:bb:cc:dd:ee:ff");
        let events = detector
            .apply_sweep(vec!["192.168.1.30".parse().unwrap()], &cache)
            .await;
        assert_eq!(events.len(), 1);
        let id = detector.live[0].id.unwrap();
        assert!(detector.rename_device(id, "Kitchen TV"));

        // Gone for a cycle
        let events = detector.apply_sweep(Vec::new(), &cache).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DeviceEvent::Disconnected { .. }));
        assert!(detector.live.is_empty());

        // Back at a different address: same id, same name, no vendor call
        let cache = cache_with("192.168.1.77", "aa:bb:cc:dd:ee:ff");
        let events = detector
            .apply_sweep(vec!["192.168.1.77".parse().unwrap()], &cache)
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DeviceEvent::Connected { .. }));
        assert_eq!(events[0].device().id, Some(id));
        assert_eq!(events[0].device().name.as_deref(), Some("Kitchen TV"));
        assert_eq!(detector.vendor.calls, 1);
    }

    #[tokio::test]
    async fn rename_device_persists_and_updates_live_set() {
        let mut detector = detector(ScriptedVendor::answering(None));
        let cache = cache_with("192.168.1.5", "aa:bb:cc:dd:ee:ff");

        let device = detector
            .enrich(Device::seen_at("192.168.1.5".parse().unwrap()), &cache)
            .await;
        let id = device.id.unwrap();
        detector.live = vec![device];

        assert!(detector.rename_device(id, "Thermostat"));
        assert_eq!(detector.live[0].name.as_deref(), Some("Thermostat"));
        let rows = detector.registry.all_devices().unwrap();
        assert_eq!(rows[0].name, "Thermostat");

        assert!(!detector.rename_device(id + 99, "Nobody"));
    }
}
