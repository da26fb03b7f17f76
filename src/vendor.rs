//! Manufacturer name lookup against the macvendors.com API. Best-effort
//! and rate-limited: one call per still-unnamed device per enrichment
//! pass, with mandatory spacing between calls, and every failure leaves
//! the device on its sentinel name.

use std::time::Duration;

use log::{debug, warn};
use pnet::util::MacAddr;
use tokio::time::Instant;

const API_BASE: &str = "https://api.macvendors.com";

/// The free tier rejects more than one request per second.
const MIN_CALL_SPACING: Duration = Duration::from_secs(1);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort manufacturer name source. Implementations must treat every
/// failure as "unavailable", never as an error to propagate.
pub trait VendorLookup {
    async fn resolve(&mut self, mac: MacAddr) -> Option<String>;
}

/// HTTP client for the macvendors.com plain-text API.
pub struct MacVendorsClient {
    http: reqwest::Client,
    last_call: Option<Instant>,
}

impl MacVendorsClient {
    pub fn new() -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            last_call: None,
        })
    }

    /// Sleep out whatever remains of the minimum spacing window.
    async fn pace(&mut self) {
        if let Some(last) = self.last_call {
            let since = last.elapsed();
            if since < MIN_CALL_SPACING {
                tokio::time::sleep(MIN_CALL_SPACING - since).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}

impl VendorLookup for MacVendorsClient {
    async fn resolve(&mut self, mac: MacAddr) -> Option<String> {
        self.pace().await;

        let url = format!("{}/{}", API_BASE, mac);
        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    let name = body.trim();
                    if name.is_empty() {
                        None
                    } else {
                        debug!("vendor for {}: {}", mac, name);
                        Some(name.to_string())
                    }
                }
                Err(e) => {
                    warn!("vendor lookup for {} could not read body: {}", mac, e);
                    None
                }
            },
            Ok(response) => {
                // Unknown OUIs come back 404; either way, unavailable
                debug!("vendor lookup for {} returned {}", mac, response.status());
                None
            }
            Err(e) => {
                warn!("vendor lookup for {} failed: {}", mac, e);
                None
            }
        }
    }
}
