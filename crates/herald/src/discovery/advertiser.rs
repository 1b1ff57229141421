// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Keeps one discovery record in sync with an endpoint's bound address.

use crate::address::BoundAddress;
use crate::error::DiscoveryError;

use super::{Discovery, DiscoveryRecord, KEY_HOST, KEY_PORT};

/// Owns a discovery record and republishes it when the address changes.
///
/// Each [`announce`](Self::announce) withdraws the previous announcement,
/// writes `host` and `port`, then announces the record at that port with
/// the host as instance name. The record is withdrawn on drop.
pub struct Advertiser {
    discovery: Box<dyn Discovery>,
    announced: Option<BoundAddress>,
}

impl Advertiser {
    pub fn new(discovery: Box<dyn Discovery>) -> Self {
        Self {
            discovery,
            announced: None,
        }
    }

    /// Service name of the managed record.
    pub fn service(&self) -> &str {
        self.discovery.record().service()
    }

    pub fn record(&self) -> &DiscoveryRecord {
        self.discovery.record()
    }

    /// Address currently announced, if any.
    pub fn announced(&self) -> Option<&BoundAddress> {
        self.announced.as_ref()
    }

    pub fn is_announced(&self) -> bool {
        self.announced.is_some()
    }

    /// Withdraw, update and re-announce the record for `address`.
    ///
    /// On failure the record stays withdrawn.
    pub fn announce(&mut self, address: &BoundAddress) -> Result<(), DiscoveryError> {
        self.withdraw()?;

        self.discovery.set(KEY_HOST, &address.host);
        self.discovery.set(KEY_PORT, &address.port.to_string());
        self.discovery.announce(address.port, &address.host)?;

        log::info!("announced {} at {}", self.service(), address);
        self.announced = Some(address.clone());
        Ok(())
    }

    /// Retract the record. No-op if nothing is announced.
    pub fn withdraw(&mut self) -> Result<(), DiscoveryError> {
        if self.announced.take().is_none() && !self.discovery.is_announced() {
            return Ok(());
        }
        self.discovery.withdraw()?;
        log::debug!("withdrew {}", self.service());
        Ok(())
    }
}

impl Drop for Advertiser {
    fn drop(&mut self) {
        if let Err(e) = self.withdraw() {
            log::warn!("failed to withdraw {}: {}", self.service(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DiscoveryProvider, MemoryRegistry, RegistryEvent};

    fn bound(host: &str, port: u16) -> BoundAddress {
        BoundAddress {
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn test_announce_sets_host_and_port() {
        let registry = MemoryRegistry::new();
        let mut advertiser = Advertiser::new(registry.service("_app._tcp").unwrap());
        advertiser.announce(&bound("box", 4000)).unwrap();

        let live = registry.browse("_app._tcp");
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].instance, "box");
        assert_eq!(live[0].port, 4000);
        assert_eq!(live[0].properties.get("host").map(String::as_str), Some("box"));
        assert_eq!(live[0].properties.get("port").map(String::as_str), Some("4000"));
        assert_eq!(advertiser.announced(), Some(&bound("box", 4000)));
    }

    #[test]
    fn test_reannounce_withdraws_first() {
        let registry = MemoryRegistry::new();
        let mut advertiser = Advertiser::new(registry.service("_app._tcp").unwrap());
        advertiser.announce(&bound("box", 4000)).unwrap();
        advertiser.announce(&bound("box", 4001)).unwrap();

        let history = registry.history();
        assert!(matches!(history[0], RegistryEvent::Announced(_)));
        assert!(matches!(history[1], RegistryEvent::Withdrawn { .. }));
        assert!(matches!(history[2], RegistryEvent::Announced(ref a) if a.port == 4001));
        assert_eq!(registry.browse("_app._tcp").len(), 1);
    }

    #[test]
    fn test_failed_announce_stays_withdrawn() {
        let registry = MemoryRegistry::new();
        let mut advertiser = Advertiser::new(registry.service("_app._tcp").unwrap());
        advertiser.announce(&bound("box", 4000)).unwrap();

        registry.set_fail_announcements(true);
        assert!(advertiser.announce(&bound("box", 4001)).is_err());
        assert!(!advertiser.is_announced());
        assert!(registry.browse("_app._tcp").is_empty());
    }

    #[test]
    fn test_drop_withdraws() {
        let registry = MemoryRegistry::new();
        {
            let mut advertiser = Advertiser::new(registry.service("_app._tcp").unwrap());
            advertiser.announce(&bound("box", 4000)).unwrap();
        }
        assert!(registry.browse("_app._tcp").is_empty());
        assert!(matches!(
            registry.history().last(),
            Some(RegistryEvent::Withdrawn { .. })
        ));
    }

    #[test]
    fn test_withdraw_without_announce_is_noop() {
        let registry = MemoryRegistry::new();
        let mut advertiser = Advertiser::new(registry.service("_app._tcp").unwrap());
        advertiser.withdraw().unwrap();
        assert!(registry.history().is_empty());
    }
}
