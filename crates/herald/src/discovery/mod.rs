// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service discovery for publish endpoints.
//!
//! An endpoint advertises one [`DiscoveryRecord`] under the service name
//! `_<scheme>._tcp`, carrying at least the `host` and `port` subscribers
//! should connect to.
//!
//! # Backends
//!
//! ```text
//! DiscoveryProvider
//! +-- MdnsProvider    (multicast DNS, feature "mdns")
//! +-- MemoryRegistry  (in-process, browsable)
//! +-- Disabled        (records kept locally, never broadcast)
//! ```
//!
//! Backends publish a full snapshot of the record on
//! [`Discovery::announce`] only. Edits made with [`Discovery::set`] stay
//! local until the next announce, so a browser never sees a host from one
//! announcement paired with a port from another.

pub mod advertiser;
#[cfg(feature = "mdns")]
pub mod mdns;
pub mod memory;

pub use advertiser::Advertiser;
#[cfg(feature = "mdns")]
pub use mdns::{MdnsDiscovery, MdnsProvider};
pub use memory::{Announcement, MemoryDiscovery, MemoryRegistry, RegistryEvent};

use std::collections::BTreeMap;

use crate::error::DiscoveryError;

/// Record key holding the advertised host.
pub const KEY_HOST: &str = "host";

/// Record key holding the advertised port, as decimal text.
pub const KEY_PORT: &str = "port";

/// Named key/value advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRecord {
    service: String,
    properties: BTreeMap<String, String>,
}

impl DiscoveryRecord {
    /// Empty record for `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Advertised host, if set.
    pub fn host(&self) -> Option<&str> {
        self.get(KEY_HOST)
    }

    /// Advertised port, if set and numeric.
    pub fn port(&self) -> Option<u16> {
        self.get(KEY_PORT).and_then(|p| p.parse().ok())
    }
}

/// Handle on one discovery record.
pub trait Discovery: Send {
    /// Current local contents of the record.
    fn record(&self) -> &DiscoveryRecord;

    /// Set a key on the local record. Not visible until the next announce.
    fn set(&mut self, key: &str, value: &str);

    /// Publish the record at `port` under the instance name `instance`.
    fn announce(&mut self, port: u16, instance: &str) -> Result<(), DiscoveryError>;

    /// Retract the announced record. No-op if nothing is announced.
    fn withdraw(&mut self) -> Result<(), DiscoveryError>;

    /// True while an announcement is live.
    fn is_announced(&self) -> bool;
}

/// Factory for discovery records.
pub trait DiscoveryProvider {
    /// Create an empty, unannounced record for `service`.
    fn service(&self, service: &str) -> Result<Box<dyn Discovery>, DiscoveryError>;

    /// Release resources shared by this provider's records, such as a
    /// daemon thread. Records must be withdrawn first.
    fn shutdown(&self) -> Result<(), DiscoveryError> {
        Ok(())
    }
}

/// Provider whose records are accepted but never broadcast.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl DiscoveryProvider for Disabled {
    fn service(&self, service: &str) -> Result<Box<dyn Discovery>, DiscoveryError> {
        Ok(Box::new(DisabledDiscovery {
            record: DiscoveryRecord::new(service),
            announced: false,
        }))
    }
}

struct DisabledDiscovery {
    record: DiscoveryRecord,
    announced: bool,
}

impl Discovery for DisabledDiscovery {
    fn record(&self) -> &DiscoveryRecord {
        &self.record
    }

    fn set(&mut self, key: &str, value: &str) {
        self.record.set(key, value);
    }

    fn announce(&mut self, port: u16, instance: &str) -> Result<(), DiscoveryError> {
        log::debug!(
            "discovery disabled, not broadcasting {} ({} on port {})",
            self.record.service(),
            instance,
            port
        );
        self.announced = true;
        Ok(())
    }

    fn withdraw(&mut self) -> Result<(), DiscoveryError> {
        self.announced = false;
        Ok(())
    }

    fn is_announced(&self) -> bool {
        self.announced
    }
}
