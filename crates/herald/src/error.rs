// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for publish endpoints.
//!
//! Setup failures ([`EndpointError`]) are fatal to construction and always
//! unwind whatever was created before the failing step. Runtime failures
//! ([`PublishError`]) leave the endpoint usable.

use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::uri::UriError;

/// Errors raised while constructing a publish endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The socket could not be created or bound to the requested address.
    #[error("cannot bind publisher socket to {address}: {reason}")]
    Bind {
        /// Transport address that was requested.
        address: String,
        /// Native error text reported by the transport.
        reason: String,
    },

    /// The bound address could not be determined after a successful bind.
    #[error("cannot determine bound address of publisher: {0}")]
    Resolution(String),

    /// The discovery backend refused the record.
    #[error("cannot announce service {service}: {source}")]
    Announce {
        /// Service name of the record.
        service: String,
        /// Backend failure.
        #[source]
        source: DiscoveryError,
    },

    /// The endpoint URI is malformed.
    #[error(transparent)]
    InvalidUri(#[from] UriError),

    /// The configuration is invalid or could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors reported by a transport context or socket.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Address string could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Address is already bound by another socket.
    #[error("address in use: {0}")]
    AddressInUse(String),

    /// Send attempted before the socket was bound.
    #[error("socket is not bound")]
    NotBound,

    /// Socket is already bound.
    #[error("socket is already bound to {0}")]
    AlreadyBound(String),

    /// Socket or its context has been closed.
    #[error("socket is closed")]
    Closed,

    /// Multi-part message exceeds the configured limit.
    #[error("message of {size} bytes exceeds limit of {max} bytes")]
    MessageTooLarge {
        /// Encoded size of the message.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Transport refused the operation for another reason.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by a discovery backend.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Backend could not be started.
    #[error("discovery backend unavailable: {0}")]
    Unavailable(String),

    /// Record is not valid for this backend.
    #[error("invalid discovery record: {0}")]
    InvalidRecord(String),

    /// Backend rejected a registration.
    #[error("registration failed: {0}")]
    Registration(String),
}

/// Errors returned by [`crate::Publisher::try_publish`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// A frame could not be handed to the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint was closed.
    #[error("publisher is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_carries_native_text() {
        let err = EndpointError::Bind {
            address: "tcp://*:5555".into(),
            reason: "Address already in use".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tcp://*:5555"));
        assert!(msg.contains("Address already in use"));
    }

    #[test]
    fn test_publish_error_from_transport() {
        let err: PublishError = TransportError::NotBound.into();
        assert!(matches!(err, PublishError::Transport(TransportError::NotBound)));
        assert_eq!(err.to_string(), "socket is not bound");
    }
}
