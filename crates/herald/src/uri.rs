// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint URIs.
//!
//! An endpoint is requested as `scheme://host:port`:
//!
//! - `scheme` names the service type and becomes the discovery service name
//!   `_<scheme>._tcp`
//! - `host` is a name or IP literal; `*` or an empty host binds all interfaces
//! - `port` 0 (or a missing port) lets the system choose an ephemeral port
//!
//! IPv6 literals are written in brackets: `app://[::1]:5555`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::address::TransportAddress;

/// Host marker meaning "bind all interfaces".
pub const WILDCARD_HOST: &str = "*";

/// URI parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("missing scheme in endpoint uri '{0}'")]
    MissingScheme(String),

    #[error("invalid scheme '{0}'")]
    InvalidScheme(String),

    #[error("invalid host in endpoint uri '{0}'")]
    InvalidHost(String),

    #[error("invalid port '{0}'")]
    InvalidPort(String),
}

/// Requested endpoint coordinates. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointUri {
    scheme: String,
    host: String,
    port: u16,
}

impl EndpointUri {
    /// Build a URI from its parts.
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Result<Self, UriError> {
        let scheme = scheme.into();
        validate_scheme(&scheme)?;
        let host = host.into();
        if host.contains('/') || host.chars().any(char::is_whitespace) {
            return Err(UriError::InvalidHost(host));
        }
        Ok(Self { scheme, host, port })
    }

    /// Wildcard host and ephemeral port for `scheme`.
    pub fn any(scheme: impl Into<String>) -> Result<Self, UriError> {
        Self::new(scheme, WILDCARD_HOST, 0)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host exactly as requested (may be `*` or empty).
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True if the host asks for all interfaces.
    pub fn is_wildcard_host(&self) -> bool {
        self.host.is_empty() || self.host == WILDCARD_HOST
    }

    /// Host for resolution purposes: empty when the wildcard was requested.
    pub fn requested_host(&self) -> &str {
        if self.is_wildcard_host() {
            ""
        } else {
            &self.host
        }
    }

    /// Discovery service name for this scheme, e.g. `_app._tcp`.
    pub fn service_name(&self) -> String {
        format!("_{}._tcp", self.scheme)
    }

    /// Transport address the publish socket binds to.
    pub fn transport_address(&self) -> TransportAddress {
        let host = if self.is_wildcard_host() {
            WILDCARD_HOST
        } else {
            &self.host
        };
        TransportAddress::tcp(host, self.port)
    }
}

fn validate_scheme(scheme: &str) -> Result<(), UriError> {
    let mut chars = scheme.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(UriError::InvalidScheme(scheme.to_string()))
    }
}

/// Split `host[:port]` / `[v6][:port]` into host and port (0 if absent).
pub(crate) fn split_authority(authority: &str) -> Result<(&str, u16), UriError> {
    let invalid_host = || UriError::InvalidHost(authority.to_string());

    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid_host)?;
        match after {
            "" => (host, None),
            _ => (host, Some(after.strip_prefix(':').ok_or_else(invalid_host)?)),
        }
    } else {
        match authority.rsplit_once(':') {
            // An unbracketed host may not contain ':' itself.
            Some((host, _)) if host.contains(':') => return Err(invalid_host()),
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    let port = match port {
        None | Some("") => 0,
        Some(p) => p.parse().map_err(|_| UriError::InvalidPort(p.to_string()))?,
    };
    Ok((host, port))
}

impl FromStr for EndpointUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| UriError::MissingScheme(s.to_string()))?;

        // Anything after the authority is ignored.
        let authority = rest.split('/').next().unwrap_or_default();

        let (host, port) = split_authority(authority)?;

        Self::new(scheme, host, port)
    }
}

impl fmt::Display for EndpointUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wildcard() {
        let uri: EndpointUri = "app://*:0".parse().unwrap();
        assert_eq!(uri.scheme(), "app");
        assert!(uri.is_wildcard_host());
        assert_eq!(uri.requested_host(), "");
        assert_eq!(uri.port(), 0);
        assert_eq!(uri.service_name(), "_app._tcp");
    }

    #[test]
    fn test_parse_missing_port_and_path() {
        let uri: EndpointUri = "hbp://render-node/events".parse().unwrap();
        assert_eq!(uri.host(), "render-node");
        assert_eq!(uri.port(), 0);
    }

    #[test]
    fn test_parse_ipv6() {
        let uri: EndpointUri = "app://[::1]:7000".parse().unwrap();
        assert_eq!(uri.host(), "::1");
        assert_eq!(uri.port(), 7000);
        assert_eq!(uri.to_string(), "app://[::1]:7000");
        assert_eq!(uri.transport_address().to_string(), "tcp://[::1]:7000");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "localhost:80".parse::<EndpointUri>(),
            Err(UriError::MissingScheme(_))
        ));
        assert!(matches!(
            "app://host:99999".parse::<EndpointUri>(),
            Err(UriError::InvalidPort(_))
        ));
        assert!(matches!(
            "1app://host:1".parse::<EndpointUri>(),
            Err(UriError::InvalidScheme(_))
        ));
        assert!(matches!(
            "app://::1:80".parse::<EndpointUri>(),
            Err(UriError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_wildcard_transport_address() {
        let uri = EndpointUri::new("app", "", 0).unwrap();
        assert_eq!(uri.transport_address().to_string(), "tcp://*:0");

        let uri = EndpointUri::new("app", "10.0.0.5", 4000).unwrap();
        assert_eq!(uri.transport_address().to_string(), "tcp://10.0.0.5:4000");
    }
}
