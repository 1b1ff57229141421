// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport context and publish socket.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{bounded, RecvTimeoutError};

use super::frame_codec::FrameCodec;
use super::io_thread::{CommandSender, IoCommand, IoThread, IoThreadHandle};
use super::stats::SocketStats;
use super::TcpConfig;
use crate::address::{TransportAddress, TCP_PROTOCOL};
use crate::error::TransportError;
use crate::transport::{PubSocket, SendFlags, Transport};

/// TCP transport context. Owns the I/O thread shared by its sockets.
pub struct TcpTransport {
    config: TcpConfig,
    io: Option<IoThreadHandle>,
    next_socket_id: AtomicU64,
}

impl TcpTransport {
    /// Validate `config` and start the I/O thread.
    pub fn new(config: TcpConfig) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        let io = IoThread::spawn(config.clone())?;
        Ok(Self {
            config,
            io: Some(io),
            next_socket_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// True until [`Transport::terminate`] has run.
    pub fn is_running(&self) -> bool {
        self.io.as_ref().is_some_and(IoThreadHandle::is_running)
    }
}

impl Transport for TcpTransport {
    type Socket = TcpPubSocket;

    fn pub_socket(&mut self) -> Result<TcpPubSocket, TransportError> {
        let io = self.io.as_ref().ok_or(TransportError::Closed)?;
        let id = self.next_socket_id.fetch_add(1, Ordering::Relaxed);
        Ok(TcpPubSocket {
            id,
            io: io.sender(),
            config: self.config.clone(),
            local_addr: None,
            pending: Vec::new(),
            stats: Arc::new(SocketStats::new()),
            closed: false,
        })
    }

    fn terminate(&mut self) {
        if let Some(mut io) = self.io.take() {
            if let Err(e) = io.shutdown() {
                log::warn!("tcp transport shutdown failed: {}", e);
            }
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Publish socket of a [`TcpTransport`].
pub struct TcpPubSocket {
    id: u64,
    io: CommandSender,
    config: TcpConfig,
    local_addr: Option<SocketAddr>,

    /// Encoded frames of the message being assembled
    pending: Vec<u8>,

    stats: Arc<SocketStats>,
    closed: bool,
}

impl TcpPubSocket {
    /// Bound socket address, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Counters shared with the I/O thread.
    pub fn stats(&self) -> Arc<SocketStats> {
        Arc::clone(&self.stats)
    }

    fn check_size(&mut self) -> Result<(), TransportError> {
        if self.pending.len() > self.config.max_message_size {
            let size = self.pending.len();
            self.pending.clear();
            return Err(TransportError::MessageTooLarge {
                size,
                max: self.config.max_message_size,
            });
        }
        Ok(())
    }
}

impl PubSocket for TcpPubSocket {
    fn bind(&mut self, address: &TransportAddress) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if let Some(addr) = self.local_addr {
            return Err(TransportError::AlreadyBound(addr.to_string()));
        }
        if address.protocol() != TCP_PROTOCOL {
            return Err(TransportError::InvalidAddress(format!(
                "unsupported protocol '{}' in {}",
                address.protocol(),
                address
            )));
        }
        let addr = address.socket_addr()?;

        let (reply, reply_rx) = bounded(1);
        self.io
            .submit(IoCommand::Bind {
                socket_id: self.id,
                addr,
                stats: self.stats(),
                reply,
            })
            .map_err(|_| TransportError::Closed)?;

        match reply_rx.recv_timeout(self.config.bind_timeout()) {
            Ok(Ok(local)) => {
                self.local_addr = Some(local);
                Ok(())
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(TransportError::AddressInUse(e.to_string()))
            }
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Unavailable(format!(
                "bind to {} timed out",
                address
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn send(&mut self, frame: &[u8], flags: SendFlags) -> Result<(), TransportError> {
        if self.closed {
            self.pending.clear();
            return Err(TransportError::Closed);
        }
        if self.local_addr.is_none() {
            self.pending.clear();
            return Err(TransportError::NotBound);
        }

        FrameCodec::encode_frame_into(frame, flags.more(), &mut self.pending);
        self.check_size()?;
        if flags.more() {
            return Ok(());
        }

        let message = Arc::new(std::mem::take(&mut self.pending));
        self.io
            .submit(IoCommand::Publish {
                socket_id: self.id,
                message,
            })
            .map_err(|_| TransportError::Closed)?;
        self.stats.record_sent();
        Ok(())
    }

    fn last_endpoint(&self) -> Option<String> {
        self.local_addr
            .map(|addr| TransportAddress::from_socket_addr(TCP_PROTOCOL, addr).to_string())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();
        if self.local_addr.is_some() {
            // The context may already be gone; nothing left to release then.
            let _ = self.io.submit(IoCommand::CloseSocket { socket_id: self.id });
        }
    }
}

impl Drop for TcpPubSocket {
    fn drop(&mut self) {
        self.close();
    }
}
