// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process discovery registry.
//!
//! Announcements are stored as complete snapshots under a write lock, and
//! [`MemoryRegistry::browse`] reads under the matching read lock, so a
//! browser sees either the old record, the new one or nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::DiscoveryError;

use super::{Discovery, DiscoveryProvider, DiscoveryRecord};

/// A live announcement as seen by browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub service: String,
    pub instance: String,
    pub port: u16,
    pub properties: BTreeMap<String, String>,
}

/// Registry change, oldest first in [`MemoryRegistry::history`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Announced(Announcement),
    Withdrawn { service: String, instance: String },
    /// The owner released the registry through [`DiscoveryProvider::shutdown`].
    Shutdown,
}

#[derive(Default)]
struct RegistryState {
    /// (service, instance) -> announcement
    live: HashMap<(String, String), Announcement>,
    history: Vec<RegistryEvent>,
    fail_announcements: bool,
}

/// Shared in-process registry. Clones refer to the same registry.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live announcements for `service`, ordered by instance name.
    pub fn browse(&self, service: &str) -> Vec<Announcement> {
        let state = self.inner.read();
        let mut found: Vec<Announcement> = state
            .live
            .values()
            .filter(|a| a.service == service)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.instance.cmp(&b.instance));
        found
    }

    /// Number of times `service` has been announced.
    pub fn announcement_count(&self, service: &str) -> usize {
        self.inner
            .read()
            .history
            .iter()
            .filter(|e| matches!(e, RegistryEvent::Announced(a) if a.service == service))
            .count()
    }

    pub fn history(&self) -> Vec<RegistryEvent> {
        self.inner.read().history.clone()
    }

    /// Make every following announce fail.
    pub fn set_fail_announcements(&self, fail: bool) {
        self.inner.write().fail_announcements = fail;
    }
}

impl DiscoveryProvider for MemoryRegistry {
    fn service(&self, service: &str) -> Result<Box<dyn Discovery>, DiscoveryError> {
        Ok(Box::new(MemoryDiscovery {
            registry: self.clone(),
            record: DiscoveryRecord::new(service),
            live_instance: None,
        }))
    }

    fn shutdown(&self) -> Result<(), DiscoveryError> {
        self.inner.write().history.push(RegistryEvent::Shutdown);
        Ok(())
    }
}

/// Record handle created by [`MemoryRegistry`].
pub struct MemoryDiscovery {
    registry: MemoryRegistry,
    record: DiscoveryRecord,
    live_instance: Option<String>,
}

impl Discovery for MemoryDiscovery {
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

        let mut state = self.registry.inner.write();
        if state.fail_announcements {
            return Err(DiscoveryError::Registration(format!(
                "registry refused {}",
                self.record.service()
            )));
        }

        if let Some(previous) = self.live_instance.take() {
            state
                .live
                .remove(&(self.record.service().to_string(), previous));
        }

        let announcement = Announcement {
            service: self.record.service().to_string(),
            instance: instance.to_string(),
            port,
            properties: self.record.properties().clone(),
        };
        state.live.insert(
            (announcement.service.clone(), announcement.instance.clone()),
            announcement.clone(),
        );
        state.history.push(RegistryEvent::Announced(announcement));
        self.live_instance = Some(instance.to_string());
        Ok(())
    }

    fn withdraw(&mut self) -> Result<(), DiscoveryError> {
        let Some(instance) = self.live_instance.take() else {
            return Ok(());
        };
        let service = self.record.service().to_string();
        let mut state = self.registry.inner.write();
        state.live.remove(&(service.clone(), instance.clone()));
        state
            .history
            .push(RegistryEvent::Withdrawn { service, instance });
        Ok(())
    }

    fn is_announced(&self) -> bool {
        self.live_instance.is_some()
    }
}

impl Drop for MemoryDiscovery {
    fn drop(&mut self) {
        let _ = self.withdraw();
    }
}
