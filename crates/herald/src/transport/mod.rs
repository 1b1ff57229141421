// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message transports for publish endpoints.
//!
//! A [`Transport`] is a context that creates publish-mode sockets and owns
//! whatever machinery they need (I/O threads, simulated networks). A
//! [`PubSocket`] binds an address and sends multi-part messages: frames sent
//! with [`SendFlags::MORE`] are held back until the final frame, and the whole
//! message is handed to subscribers as one unit or not at all.
//!
//! # Transports
//!
//! - [`tcp`] - TCP with a mio I/O thread per context
//! - [`sim`] - in-process simulated network for tests and embedding

pub mod sim;
pub mod tcp;

use crate::address::TransportAddress;
use crate::error::TransportError;

pub use sim::{SimEvent, SimNetwork, SimSocket, SimTransport};
pub use tcp::{SocketStats, TcpConfig, TcpPubSocket, TcpTransport};

/// Per-frame send flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendFlags {
    more: bool,
}

impl SendFlags {
    /// Final frame of a message.
    pub const NONE: Self = Self { more: false };

    /// More frames of the same message follow.
    pub const MORE: Self = Self { more: true };

    pub fn more(self) -> bool {
        self.more
    }
}

/// A transport context.
///
/// Sockets created by a context must be closed before the context is
/// terminated.
pub trait Transport: Send {
    type Socket: PubSocket;

    /// Create an unbound publish socket.
    fn pub_socket(&mut self) -> Result<Self::Socket, TransportError>;

    /// Release the context. Called once; later calls are no-ops.
    fn terminate(&mut self);
}

/// A publish-mode socket.
pub trait PubSocket: Send {
    /// Bind to `address`. Fails if already bound or the address is taken.
    fn bind(&mut self, address: &TransportAddress) -> Result<(), TransportError>;

    /// Send one frame. With [`SendFlags::MORE`] the frame is staged until
    /// the final frame arrives. On error every staged frame is discarded.
    ///
    /// Never blocks on subscribers; with none connected the message is
    /// silently dropped.
    fn send(&mut self, frame: &[u8], flags: SendFlags) -> Result<(), TransportError>;

    /// Address actually bound, e.g. `tcp://0.0.0.0:40123`.
    fn last_endpoint(&self) -> Option<String>;

    /// Stop accepting subscribers and release the socket. Idempotent.
    fn close(&mut self);
}
