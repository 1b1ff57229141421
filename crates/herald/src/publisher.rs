// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publish endpoint.
//!
//! A [`Publisher`] owns a transport context, one publish socket bound on it,
//! and the discovery record advertising where that socket can be reached.
//!
//! # Lifecycle
//!
//! ```text
//! Unbound --bind--> Bound --resolve--> Resolved --announce--> Announced
//!    |                |                   |                      |
//!    +----------------+-------------------+----------------------+--> Closed
//! ```
//!
//! Construction runs the whole sequence or fails. A failure at any step
//! closes the socket and terminates the context before the error is
//! returned, and nothing stays announced. [`Publisher::close`] (also run on
//! drop) withdraws the record, closes the socket, then terminates the
//! context, exactly once. A discovery provider handed over with
//! [`Publisher::bind_owned`] is shut down right after the withdraw.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::address::{self, BoundAddress, TransportAddress};
use crate::config::{DiscoveryBackend, PublisherConfig};
use crate::discovery::{Advertiser, Disabled, DiscoveryProvider, DiscoveryRecord};
use crate::error::{EndpointError, PublishError, TransportError};
use crate::event::{encode_tag, Event};
use crate::transport::{PubSocket, SendFlags, TcpTransport, Transport};
use crate::uri::EndpointUri;

/// Lifecycle state of a [`Publisher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Unbound,
    Bound,
    Resolved,
    Announced,
    Closed,
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unbound => "unbound",
            Self::Bound => "bound",
            Self::Resolved => "resolved",
            Self::Announced => "announced",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

fn shutdown_discovery(discovery: &dyn DiscoveryProvider) {
    if let Err(e) = discovery.shutdown() {
        log::warn!("failed to shut down discovery: {}", e);
    }
}

fn bind_error(requested: &TransportAddress, e: TransportError) -> EndpointError {
    EndpointError::Bind {
        address: requested.to_string(),
        reason: e.to_string(),
    }
}

/// Publish endpoint sending typed events to every connected subscriber.
pub struct Publisher<T: Transport = TcpTransport> {
    uri: EndpointUri,
    address: BoundAddress,
    state: EndpointState,

    // Released in this order by `close`.
    advertiser: Advertiser,
    owned_discovery: Option<Box<dyn DiscoveryProvider + Send>>,
    socket: T::Socket,
    transport: T,
}

impl<T: Transport> Publisher<T> {
    /// Bind a publish socket for `uri` on `transport`, resolve its address
    /// and announce it through `discovery`.
    pub fn bind(
        uri: EndpointUri,
        mut transport: T,
        discovery: &dyn DiscoveryProvider,
    ) -> Result<Self, EndpointError> {
        let requested = uri.transport_address();
        let service = uri.service_name();

        let prepared = discovery
            .service(&service)
            .map_err(|source| EndpointError::Announce {
                service: service.clone(),
                source,
            })
            .and_then(|record| {
                let socket = transport
                    .pub_socket()
                    .map_err(|e| bind_error(&requested, e))?;
                Ok((record, socket))
            });
        let (record, socket) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                transport.terminate();
                return Err(e);
            }
        };

        let mut publisher = Self {
            uri,
            address: BoundAddress {
                host: String::new(),
                port: 0,
            },
            state: EndpointState::Unbound,
            advertiser: Advertiser::new(record),
            owned_discovery: None,
            socket,
            transport,
        };
        // On error `publisher` is dropped here, which releases everything.
        publisher.setup(&requested)?;
        Ok(publisher)
    }

    /// Like [`bind`](Self::bind), but the publisher keeps `discovery` and
    /// shuts it down on close, once the record is withdrawn. It is also
    /// shut down if construction fails.
    pub fn bind_owned<D>(uri: EndpointUri, transport: T, discovery: D) -> Result<Self, EndpointError>
    where
        D: DiscoveryProvider + Send + 'static,
    {
        match Self::bind(uri, transport, &discovery) {
            Ok(mut publisher) => {
                publisher.owned_discovery = Some(Box::new(discovery));
                Ok(publisher)
            }
            Err(e) => {
                shutdown_discovery(&discovery);
                Err(e)
            }
        }
    }

    fn setup(&mut self, requested: &TransportAddress) -> Result<(), EndpointError> {
        self.socket
            .bind(requested)
            .map_err(|e| bind_error(requested, e))?;
        self.state = EndpointState::Bound;
        log::debug!("publisher socket bound to {}", requested);

        self.address = address::resolve(self.uri.requested_host(), self.uri.port(), &self.socket)?;
        self.state = EndpointState::Resolved;

        self.advertiser
            .announce(&self.address)
            .map_err(|source| EndpointError::Announce {
                service: self.uri.service_name(),
                source,
            })?;
        self.state = EndpointState::Announced;

        log::info!("publisher for {} listening on {}", self.uri, self.address);
        Ok(())
    }

    pub fn uri(&self) -> &EndpointUri {
        &self.uri
    }

    /// Concrete address subscribers connect to.
    pub fn address(&self) -> &BoundAddress {
        &self.address
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == EndpointState::Closed
    }

    /// Local copy of the advertised record.
    pub fn record(&self) -> &DiscoveryRecord {
        self.advertiser.record()
    }

    pub fn socket(&self) -> &T::Socket {
        &self.socket
    }

    /// Send one event as a (tag, payload) message.
    ///
    /// Returns `false` and logs a warning if the transport refused either
    /// frame; subscribers then see neither. Succeeds with no subscribers.
    pub fn publish(&mut self, event_type: u64, payload: &[u8]) -> bool {
        match self.try_publish(event_type, payload) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "failed to publish event {} on {}: {}",
                    event_type,
                    self.uri,
                    e
                );
                false
            }
        }
    }

    /// Like [`publish`](Self::publish), returning the failure instead of
    /// logging it.
    pub fn try_publish(&mut self, event_type: u64, payload: &[u8]) -> Result<(), PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }
        self.socket.send(&encode_tag(event_type), SendFlags::MORE)?;
        self.socket.send(payload, SendFlags::NONE)?;
        Ok(())
    }

    pub fn publish_event(&mut self, event: &Event) -> bool {
        self.publish(event.event_type, &event.payload)
    }

    /// Withdraw the record, close the socket and terminate the context.
    /// An owned discovery provider is shut down after the withdraw. Later
    /// calls do nothing.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.advertiser.withdraw() {
            log::warn!("failed to withdraw {}: {}", self.advertiser.service(), e);
        }
        if let Some(discovery) = self.owned_discovery.take() {
            shutdown_discovery(discovery.as_ref());
        }
        self.socket.close();
        self.transport.terminate();
        self.state = EndpointState::Closed;
        log::debug!("publisher for {} closed", self.uri);
    }
}

impl Publisher<TcpTransport> {
    /// Build a TCP publisher from a configuration.
    pub fn from_config(config: &PublisherConfig) -> Result<Self, EndpointError> {
        config.validate()?;
        let uri = config.endpoint_uri()?;
        let transport = TcpTransport::new(config.tcp.clone())
            .map_err(|e| bind_error(&uri.transport_address(), e))?;

        match config.discovery {
            #[cfg(feature = "mdns")]
            DiscoveryBackend::Mdns => {
                let provider = match crate::discovery::MdnsProvider::new() {
                    Ok(provider) => provider,
                    Err(source) => {
                        return Err(EndpointError::Announce {
                            service: uri.service_name(),
                            source,
                        })
                    }
                };
                Self::bind_owned(uri, transport, provider)
            }
            #[cfg(not(feature = "mdns"))]
            DiscoveryBackend::Mdns => Err(crate::config::ConfigError::Invalid(
                "mdns discovery requires the mdns feature".into(),
            )
            .into()),
            DiscoveryBackend::None => Self::bind(uri, transport, &Disabled),
        }
    }
}

impl<T: Transport> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("uri", &self.uri.to_string())
            .field("address", &self.address)
            .field("state", &self.state)
            .finish()
    }
}

/// A [`Publisher`] shared between threads.
pub struct SharedPublisher<T: Transport = TcpTransport> {
    inner: Arc<Mutex<Publisher<T>>>,
}

impl<T: Transport> Clone for SharedPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SharedPublisher<T> {
    pub fn new(publisher: Publisher<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(publisher)),
        }
    }

    pub fn publish(&self, event_type: u64, payload: &[u8]) -> bool {
        self.inner.lock().publish(event_type, payload)
    }

    pub fn try_publish(&self, event_type: u64, payload: &[u8]) -> Result<(), PublishError> {
        self.inner.lock().try_publish(event_type, payload)
    }

    pub fn publish_event(&self, event: &Event) -> bool {
        self.inner.lock().publish_event(event)
    }

    pub fn address(&self) -> BoundAddress {
        self.inner.lock().address().clone()
    }

    pub fn state(&self) -> EndpointState {
        self.inner.lock().state()
    }

    /// Close the shared publisher for every holder.
    pub fn close(&self) {
        self.inner.lock().close();
    }
}

impl<T: Transport> From<Publisher<T>> for SharedPublisher<T> {
    fn from(publisher: Publisher<T>) -> Self {
        Self::new(publisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{MemoryRegistry, RegistryEvent};
    use crate::transport::{SimEvent, SimNetwork, SimTransport};

    fn sim_publisher(
        network: &SimNetwork,
        registry: &MemoryRegistry,
        uri: &str,
    ) -> Result<Publisher<SimTransport>, EndpointError> {
        Publisher::bind(uri.parse()?, network.transport(), registry)
    }

    #[test]
    fn test_bind_reaches_announced() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        let publisher = sim_publisher(&network, &registry, "app://*:0").unwrap();

        assert_eq!(publisher.state(), EndpointState::Announced);
        assert!(publisher.address().port > 0);
        assert_eq!(publisher.record().port(), Some(publisher.address().port));
    }

    #[test]
    fn test_publish_sends_tag_then_payload() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        let mut publisher = sim_publisher(&network, &registry, "app://box:6000").unwrap();
        let rx = network.subscribe(6000);

        assert!(publisher.publish(42, &[1, 2, 3]));
        let message = rx.try_recv().unwrap();
        assert_eq!(message, vec![42u64.to_le_bytes().to_vec(), vec![1, 2, 3]]);

        assert!(publisher.publish_event(&Event::new(1, Vec::new())));
        assert_eq!(rx.try_recv().unwrap()[1], Vec::<u8>::new());
    }

    #[test]
    fn test_publish_failure_returns_false() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        let mut publisher = sim_publisher(&network, &registry, "app://box:6001").unwrap();
        let rx = network.subscribe(6001);

        network.set_fail_final_frames(true);
        assert!(!publisher.publish(1, b"lost"));
        assert!(rx.try_recv().is_err());

        network.set_fail_final_frames(false);
        assert!(publisher.publish(2, b"ok"));
        assert_eq!(rx.try_recv().unwrap()[1], b"ok".to_vec());
    }

    #[test]
    fn test_close_releases_in_order() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        let mut publisher = sim_publisher(&network, &registry, "app://*:0").unwrap();

        publisher.close();
        publisher.close();
        assert_eq!(publisher.state(), EndpointState::Closed);
        assert!(matches!(
            publisher.try_publish(1, b"x"),
            Err(PublishError::Closed)
        ));
        assert!(!publisher.publish(1, b"x"));

        assert!(registry.browse("_app._tcp").is_empty());
        assert!(matches!(
            registry.history().last(),
            Some(RegistryEvent::Withdrawn { .. })
        ));
        let events = network.events();
        let n = events.len();
        assert!(matches!(events[n - 2], SimEvent::SocketClosed { .. }));
        assert!(matches!(events[n - 1], SimEvent::ContextTerminated { .. }));

        drop(publisher);
        assert_eq!(network.events().len(), n);
    }

    #[test]
    fn test_owned_discovery_shut_down_after_withdraw() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        let mut publisher =
            Publisher::bind_owned("app://*:0".parse().unwrap(), network.transport(), registry.clone())
                .unwrap();
        assert!(!registry.history().contains(&RegistryEvent::Shutdown));

        publisher.close();
        publisher.close();
        assert!(matches!(
            registry.history().as_slice(),
            [
                RegistryEvent::Announced(_),
                RegistryEvent::Withdrawn { .. },
                RegistryEvent::Shutdown
            ]
        ));
    }

    #[test]
    fn test_owned_discovery_shut_down_when_bind_fails() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        registry.set_fail_announcements(true);

        let err = Publisher::bind_owned(
            "app://box:6004".parse().unwrap(),
            network.transport(),
            registry.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, EndpointError::Announce { .. }));
        assert_eq!(registry.history(), vec![RegistryEvent::Shutdown]);
        assert_eq!(network.open_contexts(), 0);
    }

    #[test]
    fn test_borrowed_discovery_not_shut_down() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        let publisher = sim_publisher(&network, &registry, "app://*:0").unwrap();
        drop(publisher);
        assert!(!registry.history().contains(&RegistryEvent::Shutdown));
    }

    #[test]
    fn test_resolution_failure_unwinds() {
        let network = SimNetwork::new();
        network.set_hide_last_endpoint(true);
        let registry = MemoryRegistry::new();

        let err = sim_publisher(&network, &registry, "app://*:0").unwrap_err();
        assert!(matches!(err, EndpointError::Resolution(_)));
        assert_eq!(network.open_sockets(), 0);
        assert_eq!(network.open_contexts(), 0);
        assert!(registry.history().is_empty());
    }

    #[test]
    fn test_announce_failure_unwinds() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        registry.set_fail_announcements(true);

        let err = sim_publisher(&network, &registry, "app://box:6002").unwrap_err();
        assert!(matches!(err, EndpointError::Announce { .. }));
        assert_eq!(network.open_sockets(), 0);
        assert_eq!(network.open_contexts(), 0);
        assert!(!network.is_bound(6002));
    }

    #[test]
    fn test_shared_publisher_across_threads() {
        let network = SimNetwork::new();
        let registry = MemoryRegistry::new();
        let publisher = sim_publisher(&network, &registry, "app://box:6003").unwrap();
        let rx = network.subscribe(6003);
        let shared = SharedPublisher::new(publisher);

        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for j in 0..25u64 {
                        assert!(shared.publish(i, &j.to_le_bytes()));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let messages: Vec<_> = rx.try_iter().collect();
        assert_eq!(messages.len(), 100);
        assert!(messages.iter().all(|m| m.len() == 2 && m[0].len() == 8));

        shared.close();
        assert_eq!(shared.state(), EndpointState::Closed);
    }
}
