// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport configuration.
//!
//! # Example
//!
//! ```
//! use herald::transport::TcpConfig;
//!
//! let config = TcpConfig {
//!     nodelay: false,
//!     ..Default::default()
//! }
//! .with_max_message_size(1024 * 1024);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TCP transport configuration.
///
/// Deserializes from the `[tcp]` table of a publisher config file; every
/// field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    // === Listener ===
    /// TCP listen backlog (pending connection queue size)
    pub listen_backlog: u32,

    /// Set SO_REUSEADDR on listeners
    pub reuse_address: bool,

    /// How long `bind` waits for the I/O thread (milliseconds)
    pub bind_timeout_ms: u64,

    // === Framing ===
    /// Maximum encoded size of one multi-part message in bytes
    pub max_message_size: usize,

    /// Enable TCP_NODELAY on subscriber connections
    pub nodelay: bool,

    // === Queues ===
    /// Bytes that may be queued per subscriber before new messages are
    /// dropped for it. A subscriber with an empty queue always accepts the
    /// next message, so this may be smaller than `max_message_size`.
    pub send_high_water_mark: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            listen_backlog: 128,
            reuse_address: true,
            bind_timeout_ms: 2000,

            max_message_size: 16 * 1024 * 1024, // 16 MB
            nodelay: true,

            send_high_water_mark: 4 * 1024 * 1024, // 4 MB
        }
    }
}

impl TcpConfig {
    /// Builder: set max message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Builder: set per-subscriber queue limit
    pub fn with_send_high_water_mark(mut self, bytes: usize) -> Self {
        self.send_high_water_mark = bytes;
        self
    }

    /// Builder: set TCP_NODELAY
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Bind timeout as Duration.
    pub fn bind_timeout(&self) -> Duration {
        Duration::from_millis(self.bind_timeout_ms)
    }

    /// Validate configuration, returning error message if invalid.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_message_size == 0 {
            return Err("max_message_size must be > 0");
        }
        if self.max_message_size > 1024 * 1024 * 1024 {
            return Err("max_message_size too large (> 1 GB)");
        }
        if self.send_high_water_mark == 0 {
            return Err("send_high_water_mark must be > 0");
        }
        if self.listen_backlog == 0 {
            return Err("listen_backlog must be > 0");
        }
        if self.bind_timeout_ms == 0 {
            return Err("bind_timeout_ms must be > 0");
        }
        Ok(())
    }
}
