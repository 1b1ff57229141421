// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport addresses and bound-address resolution.
//!
//! A publish socket is bound to a [`TransportAddress`] such as `tcp://*:0`.
//! When the request left host or port open, [`resolve`] asks the socket which
//! address it actually bound and derives a [`BoundAddress`] that remote
//! subscribers can connect to.
//!
//! # Precedence
//!
//! ```text
//! requested host  requested port   result
//! -------------   --------------   ---------------------------------------
//! "h"             p (non-zero)     ("h", p), no introspection
//! "h"             0                ("h", introspected port)
//! "" or "*"       p (non-zero)     (introspected host, p)
//! "" or "*"       0                (introspected host, introspected port)
//! ```
//!
//! An introspected unspecified address (`0.0.0.0`, `::`) is replaced by the
//! local hostname, since it is not a usable connect target.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{EndpointError, TransportError};
use crate::transport::PubSocket;
use crate::uri::{split_authority, WILDCARD_HOST};

/// Protocol name used by the TCP transport.
pub const TCP_PROTOCOL: &str = "tcp";

/// Typed transport address, `protocol://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportAddress {
    protocol: String,
    host: String,
    port: u16,
}

impl TransportAddress {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }

    /// TCP address; `host` may be `*`.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(TCP_PROTOCOL, host, port)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True for `*` or an empty host.
    pub fn is_wildcard(&self) -> bool {
        self.host.is_empty() || self.host == WILDCARD_HOST
    }

    /// True if the host is an unspecified IP literal (`0.0.0.0`, `::`).
    pub fn is_unspecified(&self) -> bool {
        self.host
            .parse::<IpAddr>()
            .map(|ip| ip.is_unspecified())
            .unwrap_or(false)
    }

    /// Resolve to a socket address. The wildcard maps to `0.0.0.0`.
    pub fn socket_addr(&self) -> Result<SocketAddr, TransportError> {
        if self.is_wildcard() {
            return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port));
        }
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", self, e)))?
            .next()
            .ok_or_else(|| TransportError::InvalidAddress(format!("{}: no address", self)))
    }

    /// Address of a bound socket.
    pub fn from_socket_addr(protocol: impl Into<String>, addr: SocketAddr) -> Self {
        Self::new(protocol, addr.ip().to_string(), addr.port())
    }
}

impl FromStr for TransportAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, authority) = s
            .split_once("://")
            .ok_or_else(|| TransportError::InvalidAddress(s.to_string()))?;
        if protocol.is_empty() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        let (host, port) = split_authority(authority)
            .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", s, e)))?;
        Ok(Self::new(protocol, host, port))
    }
}

impl fmt::Display for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.protocol, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
        }
    }
}

/// Concrete, advertisable host and port of a bound endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for BoundAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Canonical hostname of the local machine.
pub fn local_hostname() -> io::Result<String> {
    let name = hostname::get()?
        .into_string()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "hostname is not UTF-8"))?;
    if name.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "hostname is empty"));
    }
    Ok(name)
}

/// Derive the concrete address of `socket` after a bind to
/// `requested_host:requested_port`.
pub fn resolve<S: PubSocket + ?Sized>(
    requested_host: &str,
    requested_port: u16,
    socket: &S,
) -> Result<BoundAddress, EndpointError> {
    let requested_host = if requested_host == WILDCARD_HOST {
        ""
    } else {
        requested_host
    };

    if !requested_host.is_empty() && requested_port != 0 {
        return Ok(BoundAddress {
            host: requested_host.to_string(),
            port: requested_port,
        });
    }

    let last = socket.last_endpoint().ok_or_else(|| {
        EndpointError::Resolution("socket reports no last bound endpoint".to_string())
    })?;
    let bound: TransportAddress = last
        .parse()
        .map_err(|e: TransportError| EndpointError::Resolution(e.to_string()))?;
    log::debug!("publisher socket reports last endpoint {}", bound);

    let port = if requested_port == 0 {
        if bound.port() == 0 {
            return Err(EndpointError::Resolution(format!(
                "no port in last endpoint '{}'",
                last
            )));
        }
        bound.port()
    } else {
        requested_port
    };

    let host = if requested_host.is_empty() {
        if bound.is_unspecified() {
            local_hostname().map_err(|e| {
                EndpointError::Resolution(format!("cannot determine local hostname: {}", e))
            })?
        } else if bound.is_wildcard() {
            return Err(EndpointError::Resolution(format!(
                "no host in last endpoint '{}'",
                last
            )));
        } else {
            bound.host().to_string()
        }
    } else {
        requested_host.to_string()
    };

    Ok(BoundAddress { host, port })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SendFlags;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Socket stub that reports a fixed last endpoint.
    struct Stub {
        last: Option<String>,
        queried: AtomicBool,
    }

    impl Stub {
        fn new(last: Option<&str>) -> Self {
            Self {
                last: last.map(str::to_string),
                queried: AtomicBool::new(false),
            }
        }
    }

    impl PubSocket for Stub {
        fn bind(&mut self, _address: &TransportAddress) -> Result<(), TransportError> {
            Ok(())
        }
        fn send(&mut self, _frame: &[u8], _flags: SendFlags) -> Result<(), TransportError> {
            Ok(())
        }
        fn last_endpoint(&self) -> Option<String> {
            self.queried.store(true, Ordering::Relaxed);
            self.last.clone()
        }
        fn close(&mut self) {}
    }

    #[test]
    fn test_explicit_host_and_port_skip_introspection() {
        let stub = Stub::new(None);
        let bound = resolve("render-node", 7100, &stub).unwrap();
        assert_eq!(bound.host, "render-node");
        assert_eq!(bound.port, 7100);
        assert!(!stub.queried.load(Ordering::Relaxed));
    }

    #[test]
    fn test_ephemeral_port_keeps_explicit_host() {
        let stub = Stub::new(Some("tcp://0.0.0.0:40123"));
        let bound = resolve("render-node", 0, &stub).unwrap();
        assert_eq!(bound.host, "render-node");
        assert_eq!(bound.port, 40123);
    }

    #[test]
    fn test_wildcard_host_keeps_explicit_port() {
        let stub = Stub::new(Some("tcp://192.168.4.20:9999"));
        let bound = resolve("*", 7100, &stub).unwrap();
        assert_eq!(bound.host, "192.168.4.20");
        assert_eq!(bound.port, 7100);
    }

    #[test]
    fn test_unspecified_becomes_hostname() {
        let stub = Stub::new(Some("tcp://0.0.0.0:40123"));
        let bound = resolve("", 0, &stub).unwrap();
        assert_eq!(bound.host, local_hostname().unwrap());
        assert_ne!(bound.host, "0.0.0.0");
        assert_eq!(bound.port, 40123);

        let stub = Stub::new(Some("tcp://[::]:40124"));
        let bound = resolve("*", 0, &stub).unwrap();
        assert_eq!(bound.host, local_hostname().unwrap());
        assert_eq!(bound.port, 40124);
    }

    #[test]
    fn test_ipv6_last_endpoint() {
        let stub = Stub::new(Some("tcp://[fe80::1]:5000"));
        let bound = resolve("", 0, &stub).unwrap();
        assert_eq!(bound.host, "fe80::1");
        assert_eq!(bound.to_string(), "[fe80::1]:5000");
    }

    #[test]
    fn test_missing_last_endpoint_is_resolution_error() {
        let stub = Stub::new(None);
        let err = resolve("*", 0, &stub).unwrap_err();
        assert!(matches!(err, EndpointError::Resolution(_)));
    }

    #[test]
    fn test_garbage_last_endpoint_is_resolution_error() {
        let stub = Stub::new(Some("not an address"));
        assert!(matches!(
            resolve("", 0, &stub),
            Err(EndpointError::Resolution(_))
        ));

        let stub = Stub::new(Some("tcp://10.0.0.1:0"));
        assert!(matches!(
            resolve("", 0, &stub),
            Err(EndpointError::Resolution(_))
        ));
    }

    #[test]
    fn test_transport_address_parse() {
        let addr: TransportAddress = "tcp://127.0.0.1:5555".parse().unwrap();
        assert_eq!(addr.protocol(), "tcp");
        assert_eq!(addr.host(), "127.0.0.1");
        assert_eq!(addr.port(), 5555);
        assert!(!addr.is_unspecified());

        let addr: TransportAddress = "tcp://*:0".parse().unwrap();
        assert!(addr.is_wildcard());
        assert_eq!(
            addr.socket_addr().unwrap(),
            "0.0.0.0:0".parse::<SocketAddr>().unwrap()
        );
    }
}
