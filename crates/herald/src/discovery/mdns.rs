// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast DNS discovery backend.
//!
//! Records are registered with an [`mdns_sd::ServiceDaemon`] as service type
//! `<service>.local.` (e.g. `_app._tcp.local.`), with the record's keys as
//! TXT properties. Registration replaces the whole service entry, so peers
//! resolve a consistent host/port pair.

use std::net::IpAddr;

use mdns_sd::{ServiceDaemon, ServiceInfo};

use crate::address::local_hostname;
use crate::error::DiscoveryError;

use super::{Discovery, DiscoveryProvider, DiscoveryRecord};

/// mDNS service type for a discovery service name.
pub fn service_type(service: &str) -> String {
    format!("{}.local.", service.trim_end_matches('.'))
}

/// mDNS host name (`<label>.local.`) for an advertised host.
///
/// Names already under `.local` are kept. IP literals and other dotted
/// names are not valid mDNS labels, so the local hostname's first label is
/// used instead and the addresses are published as A/AAAA records.
fn mdns_host_name(host: &str) -> Result<String, DiscoveryError> {
    let host = host.trim_end_matches('.');
    let is_ip = host.parse::<IpAddr>().is_ok();
    if !is_ip && host.ends_with(".local") {
        return Ok(format!("{}.", host));
    }
    let name = if is_ip || host.contains('.') {
        local_hostname().map_err(|e| DiscoveryError::InvalidRecord(e.to_string()))?
    } else {
        host.to_string()
    };
    let label = name.split('.').next().unwrap_or(&name);
    Ok(format!("{}.local.", label))
}

/// Provider backed by one mDNS daemon thread.
#[derive(Clone)]
pub struct MdnsProvider {
    daemon: ServiceDaemon,
}

impl MdnsProvider {
    /// Start a new mDNS daemon.
    pub fn new() -> Result<Self, DiscoveryError> {
        let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Unavailable(e.to_string()))?;
        Ok(Self { daemon })
    }

    /// Use an existing daemon.
    pub fn from_daemon(daemon: ServiceDaemon) -> Self {
        Self { daemon }
    }

    pub fn daemon(&self) -> &ServiceDaemon {
        &self.daemon
    }
}

impl DiscoveryProvider for MdnsProvider {
    fn service(&self, service: &str) -> Result<Box<dyn Discovery>, DiscoveryError> {
        Ok(Box::new(MdnsDiscovery {
            daemon: self.daemon.clone(),
            record: DiscoveryRecord::new(service),
            registered: None,
        }))
    }

    /// Stop the daemon thread. Records still registered are dropped.
    fn shutdown(&self) -> Result<(), DiscoveryError> {
        self.daemon
            .shutdown()
            .map(|_| ())
            .map_err(|e| DiscoveryError::Unavailable(e.to_string()))
    }
}

/// Record handle registered through an [`MdnsProvider`].
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
    record: DiscoveryRecord,

    /// Full name of the live registration
    registered: Option<String>,
}

impl Discovery for MdnsDiscovery {
    fn record(&self) -> &DiscoveryRecord {
        &self.record
    }

    fn set(&mut self, key: &str, value: &str) {
        self.record.set(key, value);
    }

    fn announce(&mut self, port: u16, instance: &str) -> Result<(), DiscoveryError> {
        if instance.is_empty() {
            return Err(DiscoveryError::InvalidRecord(
                "instance name is empty".to_string(),
            ));
        }
        self.withdraw()?;

        let ty = service_type(self.record.service());
        let host_name = mdns_host_name(instance)?;
        let ip = if instance.parse::<IpAddr>().is_ok() {
            instance
        } else {
            ""
        };
        let properties: Vec<(String, String)> = self
            .record
            .properties()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut info = ServiceInfo::new(&ty, instance, &host_name, ip, port, &properties[..])
            .map_err(|e| DiscoveryError::InvalidRecord(e.to_string()))?;
        if ip.is_empty() {
            info = info.enable_addr_auto();
        }
        let fullname = info.get_fullname().to_string();

        self.daemon
            .register(info)
            .map_err(|e| DiscoveryError::Registration(e.to_string()))?;
        log::debug!("mDNS: registered {} on port {}", fullname, port);
        self.registered = Some(fullname);
        Ok(())
    }

    fn withdraw(&mut self) -> Result<(), DiscoveryError> {
        let Some(fullname) = self.registered.take() else {
            return Ok(());
        };
        self.daemon
            .unregister(&fullname)
            .map(|_| ())
            .map_err(|e| DiscoveryError::Registration(e.to_string()))?;
        log::debug!("mDNS: unregistered {}", fullname);
        Ok(())
    }

    fn is_announced(&self) -> bool {
        self.registered.is_some()
    }
}

impl Drop for MdnsDiscovery {
    fn drop(&mut self) {
        if let Err(e) = self.withdraw() {
            log::warn!("mDNS: unregister failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type() {
        assert_eq!(service_type("_app._tcp"), "_app._tcp.local.");
        assert_eq!(service_type("_app._tcp."), "_app._tcp.local.");
    }

    #[test]
    fn test_host_name() {
        assert_eq!(mdns_host_name("box").unwrap(), "box.local.");
        assert_eq!(mdns_host_name("box.local").unwrap(), "box.local.");
        assert_eq!(mdns_host_name("box.local.").unwrap(), "box.local.");
        let from_ip = mdns_host_name("10.0.0.1").unwrap();
        assert!(from_ip.ends_with(".local."));
        assert!(!from_ip.starts_with("10.0.0.1"));
    }

    #[test]
    fn test_dotted_host_uses_local_label() {
        let machine = local_hostname().unwrap();
        let expected = format!("{}.local.", machine.split('.').next().unwrap());

        let name = mdns_host_name("box.lan").unwrap();
        assert_ne!(name, "box.lan.local.");
        assert_eq!(name, expected);
        assert_eq!(mdns_host_name("::1").unwrap(), expected);
        assert_eq!(name.matches('.').count(), 2);
    }
}
