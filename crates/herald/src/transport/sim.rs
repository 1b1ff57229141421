// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process simulated network.
//!
//! [`SimNetwork`] stands in for the TCP stack in tests and in embedders that
//! want publish endpoints without sockets. It keeps a single port space,
//! hands out ephemeral ports from 49152, reports `tcp://0.0.0.0:<port>` as
//! the last endpoint of wildcard binds, and delivers complete multi-part
//! messages to subscriber channels.
//!
//! Failures are injected through the network handle:
//!
//! | Knob                          | Effect                                        |
//! |-------------------------------|-----------------------------------------------|
//! | `reserve_port()`              | port owned by "another process" (bind fails)  |
//! | `set_fail_sends()`            | every frame send fails                        |
//! | `set_fail_final_frames()`     | only the closing frame of a message fails     |
//! | `set_hide_last_endpoint()`    | sockets report no last endpoint               |
//! | `set_last_endpoint_override()`| sockets report the given string               |
//!
//! Lifecycle steps are recorded as [`SimEvent`]s so tests can check that
//! sockets are closed before their context is terminated.
//!
//! # Example
//!
//! ```
//! use herald::address::TransportAddress;
//! use herald::transport::{PubSocket, SendFlags, SimNetwork, Transport};
//!
//! let network = SimNetwork::new();
//! let mut transport = network.transport();
//! let mut socket = transport.pub_socket().unwrap();
//! socket.bind(&TransportAddress::tcp("*", 0)).unwrap();
//!
//! let port: TransportAddress = socket.last_endpoint().unwrap().parse().unwrap();
//! let rx = network.subscribe(port.port());
//! socket.send(b"tag", SendFlags::MORE).unwrap();
//! socket.send(b"body", SendFlags::NONE).unwrap();
//! assert_eq!(rx.try_recv().unwrap(), vec![b"tag".to_vec(), b"body".to_vec()]);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::address::{TransportAddress, TCP_PROTOCOL};
use crate::error::TransportError;
use crate::transport::{PubSocket, SendFlags, Transport};

/// First port handed out for ephemeral binds.
pub const EPHEMERAL_PORT_START: u16 = 49152;

/// A multi-part message as seen by a subscriber.
pub type SimMessage = Vec<Vec<u8>>;

/// Lifecycle step recorded by the simulated network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    ContextCreated { context: u64 },
    SocketCreated { context: u64, socket: u64 },
    Bound { socket: u64, address: String },
    SocketClosed { socket: u64 },
    ContextTerminated { context: u64 },
}

#[derive(Default)]
struct SimState {
    next_id: u64,
    next_ephemeral: Option<u16>,
    bound_ports: HashMap<u16, u64>,
    reserved_ports: HashSet<u16>,
    subscribers: HashMap<u16, Vec<Sender<SimMessage>>>,
    fail_sends: bool,
    fail_final_frames: bool,
    hide_last_endpoint: bool,
    last_endpoint_override: Option<String>,
    open_sockets: usize,
    open_contexts: usize,
    events: Vec<SimEvent>,
}

impl SimState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn port_taken(&self, port: u16) -> bool {
        self.bound_ports.contains_key(&port) || self.reserved_ports.contains(&port)
    }

    fn allocate_ephemeral(&mut self) -> Option<u16> {
        let span = u16::MAX - EPHEMERAL_PORT_START + 1;
        let mut candidate = self.next_ephemeral.unwrap_or(EPHEMERAL_PORT_START);
        for _ in 0..span {
            let next = if candidate == u16::MAX {
                EPHEMERAL_PORT_START
            } else {
                candidate + 1
            };
            if !self.port_taken(candidate) {
                self.next_ephemeral = Some(next);
                return Some(candidate);
            }
            candidate = next;
        }
        None
    }
}

/// Shared handle to a simulated network.
#[derive(Clone, Default)]
pub struct SimNetwork {
    inner: Arc<Mutex<SimState>>,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport context on this network.
    pub fn transport(&self) -> SimTransport {
        let mut state = self.inner.lock();
        let id = state.allocate_id();
        state.open_contexts += 1;
        state.events.push(SimEvent::ContextCreated { context: id });
        SimTransport {
            network: self.clone(),
            id,
            terminated: false,
        }
    }

    /// Mark `port` as used by something outside this network.
    pub fn reserve_port(&self, port: u16) {
        self.inner.lock().reserved_ports.insert(port);
    }

    /// Receive every message published on `port` from now on.
    pub fn subscribe(&self, port: u16) -> Receiver<SimMessage> {
        let (tx, rx) = unbounded();
        self.inner
            .lock()
            .subscribers
            .entry(port)
            .or_default()
            .push(tx);
        rx
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.inner.lock().fail_sends = fail;
    }

    pub fn set_fail_final_frames(&self, fail: bool) {
        self.inner.lock().fail_final_frames = fail;
    }

    pub fn set_hide_last_endpoint(&self, hide: bool) {
        self.inner.lock().hide_last_endpoint = hide;
    }

    pub fn set_last_endpoint_override(&self, endpoint: Option<String>) {
        self.inner.lock().last_endpoint_override = endpoint;
    }

    /// True if a socket on this network holds `port`.
    pub fn is_bound(&self, port: u16) -> bool {
        self.inner.lock().bound_ports.contains_key(&port)
    }

    /// Sockets created and not yet closed.
    pub fn open_sockets(&self) -> usize {
        self.inner.lock().open_sockets
    }

    /// Contexts created and not yet terminated.
    pub fn open_contexts(&self) -> usize {
        self.inner.lock().open_contexts
    }

    /// Lifecycle log, oldest first.
    pub fn events(&self) -> Vec<SimEvent> {
        self.inner.lock().events.clone()
    }
}

/// Transport context on a [`SimNetwork`].
pub struct SimTransport {
    network: SimNetwork,
    id: u64,
    terminated: bool,
}

impl SimTransport {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Transport for SimTransport {
    type Socket = SimSocket;

    fn pub_socket(&mut self) -> Result<SimSocket, TransportError> {
        if self.terminated {
            return Err(TransportError::Closed);
        }
        let mut state = self.network.inner.lock();
        let id = state.allocate_id();
        state.open_sockets += 1;
        state.events.push(SimEvent::SocketCreated {
            context: self.id,
            socket: id,
        });
        Ok(SimSocket {
            network: self.network.clone(),
            id,
            bound: None,
            pending: Vec::new(),
            closed: false,
        })
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let mut state = self.network.inner.lock();
        state.open_contexts -= 1;
        state
            .events
            .push(SimEvent::ContextTerminated { context: self.id });
    }
}

impl Drop for SimTransport {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Publish socket on a [`SimNetwork`].
pub struct SimSocket {
    network: SimNetwork,
    id: u64,
    bound: Option<TransportAddress>,
    pending: Vec<Vec<u8>>,
    closed: bool,
}

impl SimSocket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bound port, once bound.
    pub fn port(&self) -> Option<u16> {
        self.bound.as_ref().map(TransportAddress::port)
    }
}

impl PubSocket for SimSocket {
    fn bind(&mut self, address: &TransportAddress) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if let Some(bound) = &self.bound {
            return Err(TransportError::AlreadyBound(bound.to_string()));
        }
        if address.protocol() != TCP_PROTOCOL {
            return Err(TransportError::InvalidAddress(address.to_string()));
        }

        let mut state = self.network.inner.lock();
        let port = if address.port() == 0 {
            state
                .allocate_ephemeral()
                .ok_or_else(|| TransportError::Unavailable("no ephemeral port left".into()))?
        } else if state.port_taken(address.port()) {
            return Err(TransportError::AddressInUse(format!(
                "Address already in use: {}",
                address
            )));
        } else {
            address.port()
        };

        let host = if address.is_wildcard() {
            "0.0.0.0"
        } else {
            address.host()
        };
        let bound = TransportAddress::tcp(host, port);

        state.bound_ports.insert(port, self.id);
        state.events.push(SimEvent::Bound {
            socket: self.id,
            address: bound.to_string(),
        });
        self.bound = Some(bound);
        Ok(())
    }

    fn send(&mut self, frame: &[u8], flags: SendFlags) -> Result<(), TransportError> {
        if self.closed {
            self.pending.clear();
            return Err(TransportError::Closed);
        }
        let Some(port) = self.port() else {
            self.pending.clear();
            return Err(TransportError::NotBound);
        };

        let mut state = self.network.inner.lock();
        if state.fail_sends || (state.fail_final_frames && !flags.more()) {
            self.pending.clear();
            return Err(TransportError::Unavailable("simulated send failure".into()));
        }

        self.pending.push(frame.to_vec());
        if flags.more() {
            return Ok(());
        }

        let message = std::mem::take(&mut self.pending);
        if let Some(subscribers) = state.subscribers.get_mut(&port) {
            subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        }
        Ok(())
    }

    fn last_endpoint(&self) -> Option<String> {
        let state = self.network.inner.lock();
        if state.hide_last_endpoint {
            return None;
        }
        if let Some(endpoint) = &state.last_endpoint_override {
            return Some(endpoint.clone());
        }
        self.bound.as_ref().map(ToString::to_string)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();

        let mut state = self.network.inner.lock();
        if let Some(port) = self.port() {
            state.bound_ports.remove(&port);
        }
        state.open_sockets -= 1;
        state.events.push(SimEvent::SocketClosed { socket: self.id });
    }
}

impl Drop for SimSocket {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(transport: &mut SimTransport, host: &str, port: u16) -> SimSocket {
        let mut socket = transport.pub_socket().unwrap();
        socket.bind(&TransportAddress::tcp(host, port)).unwrap();
        socket
    }

    #[test]
    fn test_ephemeral_ports_are_distinct() {
        let network = SimNetwork::new();
        let mut transport = network.transport();
        let a = bind(&mut transport, "*", 0);
        let b = bind(&mut transport, "*", 0);
        assert_eq!(a.port(), Some(EPHEMERAL_PORT_START));
        assert_eq!(b.port(), Some(EPHEMERAL_PORT_START + 1));
    }

    #[test]
    fn test_ephemeral_skips_reserved() {
        let network = SimNetwork::new();
        network.reserve_port(EPHEMERAL_PORT_START);
        let mut transport = network.transport();
        let socket = bind(&mut transport, "*", 0);
        assert_eq!(socket.port(), Some(EPHEMERAL_PORT_START + 1));
    }

    #[test]
    fn test_port_conflicts() {
        let network = SimNetwork::new();
        network.reserve_port(7000);
        let mut transport = network.transport();
        let mut socket = transport.pub_socket().unwrap();
        assert!(matches!(
            socket.bind(&TransportAddress::tcp("*", 7000)),
            Err(TransportError::AddressInUse(_))
        ));

        let first = bind(&mut transport, "*", 7001);
        let mut second = transport.pub_socket().unwrap();
        assert!(second.bind(&TransportAddress::tcp("*", 7001)).is_err());
        drop(first);
        assert!(second.bind(&TransportAddress::tcp("*", 7001)).is_ok());
    }

    #[test]
    fn test_last_endpoint_reports_unspecified_for_wildcard() {
        let network = SimNetwork::new();
        let mut transport = network.transport();
        let socket = bind(&mut transport, "*", 7100);
        assert_eq!(socket.last_endpoint().unwrap(), "tcp://0.0.0.0:7100");

        network.set_hide_last_endpoint(true);
        assert!(socket.last_endpoint().is_none());
    }

    #[test]
    fn test_failed_final_frame_discards_message() {
        let network = SimNetwork::new();
        let mut transport = network.transport();
        let mut socket = bind(&mut transport, "*", 7200);
        let rx = network.subscribe(7200);

        network.set_fail_final_frames(true);
        socket.send(b"tag", SendFlags::MORE).unwrap();
        assert!(socket.send(b"body", SendFlags::NONE).is_err());
        assert!(rx.try_recv().is_err());

        network.set_fail_final_frames(false);
        socket.send(b"t2", SendFlags::MORE).unwrap();
        socket.send(b"b2", SendFlags::NONE).unwrap();
        assert_eq!(rx.try_recv().unwrap(), vec![b"t2".to_vec(), b"b2".to_vec()]);
    }

    #[test]
    fn test_lifecycle_events() {
        let network = SimNetwork::new();
        let mut transport = network.transport();
        let mut socket = bind(&mut transport, "*", 0);
        socket.close();
        transport.terminate();

        assert_eq!(network.open_sockets(), 0);
        assert_eq!(network.open_contexts(), 0);
        let events = network.events();
        assert!(matches!(events.last(), Some(SimEvent::ContextTerminated { .. })));
        assert!(matches!(
            events[events.len() - 2],
            SimEvent::SocketClosed { .. }
        ));
    }
}
