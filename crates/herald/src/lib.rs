// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Herald - publish endpoints for event distribution
//!
//! A publish endpoint binds an outbound message socket, works out the host
//! and port it actually listens on, advertises them through service
//! discovery, and sends typed events to every connected subscriber.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use herald::discovery::Disabled;
//! use herald::transport::{TcpConfig, TcpTransport};
//! use herald::Publisher;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = TcpTransport::new(TcpConfig::default())?;
//!     let mut publisher = Publisher::bind("app://*:0".parse()?, transport, &Disabled)?;
//!     println!("listening on {}", publisher.address());
//!
//!     publisher.publish(42, &[1, 2, 3]);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                            Publisher                                |
//! |   bind -> resolve -> announce | publish(tag, payload) | close       |
//! +---------------------------------------------------------------------+
//! |      address::resolve        |          discovery::Advertiser       |
//! |  last endpoint -> host:port  |   withdraw -> set -> announce        |
//! +---------------------------------------------------------------------+
//! |          transport           |              discovery               |
//! |   TCP (mio I/O thread) | sim |   mDNS | in-memory | disabled        |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Owns context, socket and discovery record |
//! | [`EndpointUri`] | `scheme://host:port` requested by the caller |
//! | [`BoundAddress`] | Host and port subscribers connect to |
//! | [`Event`] | Type tag plus opaque payload |
//! | [`PublisherConfig`] | TOML-loadable settings |
//!
//! ## Wire Format
//!
//! Every event is one two-frame message: the type tag as 8 little-endian
//! bytes, then the payload. Subscribers receive both frames or neither.
//!
//! ## Features
//!
//! - `mdns` (default) - multicast DNS discovery via `mdns-sd`

pub mod address;
pub mod config;
pub mod discovery;
pub mod error;
pub mod event;
pub mod publisher;
pub mod transport;
pub mod uri;

pub use address::BoundAddress;
pub use config::{ConfigError, DiscoveryBackend, PublisherConfig};
pub use discovery::{Discovery, DiscoveryProvider, DiscoveryRecord};
pub use error::{DiscoveryError, EndpointError, PublishError, TransportError};
pub use event::Event;
pub use publisher::{EndpointState, Publisher, SharedPublisher};
pub use uri::EndpointUri;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
