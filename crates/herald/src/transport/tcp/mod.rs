// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport for publish sockets.
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |                      TcpTransport                            |
//! |                                                              |
//! |  TcpPubSocket --+                                            |
//! |  TcpPubSocket --+--> command channel + Waker                 |
//! |                              |                               |
//! |  +---------------------------v---------------------------+  |
//! |  |                     IoThread                           |  |
//! |  |  - mio::Poll event loop                               |  |
//! |  |  - one listener per bound socket                      |  |
//! |  |  - per-subscriber send queues                         |  |
//! |  +-------------------------------------------------------+  |
//! +-------------------------------------------------------------+
//! ```
//!
//! A socket assembles a multi-part message locally and hands the encoded
//! message to the I/O thread in one command, so subscribers see whole
//! messages only. Sending never waits for subscribers; with none connected
//! the message is dropped.
//!
//! # Wire Format
//!
//! See [`frame_codec`]. The framing is specific to this crate and not
//! interoperable with other messaging libraries.
//!
//! # Example
//!
//! ```no_run
//! use herald::address::TransportAddress;
//! use herald::transport::{PubSocket, SendFlags, TcpConfig, TcpTransport, Transport};
//!
//! let mut transport = TcpTransport::new(TcpConfig::default())?;
//! let mut socket = transport.pub_socket()?;
//! socket.bind(&TransportAddress::tcp("*", 0))?;
//! socket.send(&1u64.to_le_bytes(), SendFlags::MORE)?;
//! socket.send(b"hello", SendFlags::NONE)?;
//! # Ok::<(), herald::TransportError>(())
//! ```

pub mod config;
pub mod frame_codec;
mod io_thread;
pub mod socket;
pub mod stats;

pub use config::TcpConfig;
pub use frame_codec::{FrameCodec, DEFAULT_MAX_MESSAGE_SIZE, FLAG_MORE, FRAME_HEADER_SIZE};
pub use socket::{TcpPubSocket, TcpTransport};
pub use stats::{SocketStats, SocketStatsSnapshot};
