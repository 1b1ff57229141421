// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! herald-pub - publish events on a discoverable endpoint
//!
//! # Usage
//!
//! ```bash
//! # Heartbeat counter every second on an auto-selected port
//! herald-pub --uri app://*:0
//!
//! # Publish stdin lines as event type 7, no mDNS
//! tail -f app.log | herald-pub --uri app://*:5555 --stdin --event-type 7 --discovery none
//!
//! # Settings from a TOML file
//! herald-pub --config publisher.toml
//! ```

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use herald::{DiscoveryBackend, Publisher, PublisherConfig};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Publish heartbeat or stdin events on a discoverable endpoint
#[derive(Parser, Debug)]
#[command(name = "herald-pub")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint URI, scheme://host:port (* and 0 select automatically)
    #[arg(short, long)]
    uri: Option<String>,

    /// Configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Discovery backend: mdns, none
    #[arg(short, long)]
    discovery: Option<DiscoveryBackend>,

    /// Event type tag
    #[arg(short, long, default_value = "1")]
    event_type: u64,

    /// Heartbeat interval in milliseconds
    #[arg(short, long, default_value = "1000")]
    interval_ms: u64,

    /// Number of events to publish (0 = unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    count: u64,

    /// Publish stdin lines instead of a heartbeat counter
    #[arg(long)]
    stdin: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

const DEFAULT_URI: &str = "herald://*:0";

fn load_config(args: &Args) -> Result<PublisherConfig> {
    let mut config = match &args.config {
        Some(path) => PublisherConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PublisherConfig::new(DEFAULT_URI),
    };
    if let Some(uri) = &args.uri {
        config.uri = uri.clone();
    }
    if let Some(discovery) = args.discovery {
        config.discovery = discovery;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_ascii_lowercase()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Also captures the library's `log` records.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config.log_level))
        .with_target(true)
        .init();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    let mut publisher = Publisher::from_config(&config).context("starting publisher")?;
    info!(
        "publishing {} on {} (discovery={})",
        publisher.uri(),
        publisher.address(),
        config.discovery
    );

    let sent = if args.stdin {
        publish_stdin(&mut publisher, &args, &running)
    } else {
        publish_heartbeat(&mut publisher, &args, &running)
    };

    let stats = publisher.socket().stats().snapshot();
    info!(
        "published {} event(s): {} delivered to transport, {} subscriber copies dropped, {} bytes written, {} subscriber(s) connected",
        sent,
        stats.messages_sent,
        stats.messages_dropped,
        stats.bytes_written,
        stats.subscribers
    );
    publisher.close();
    Ok(())
}

fn limit_reached(args: &Args, sent: u64) -> bool {
    args.count > 0 && sent >= args.count
}

fn publish_heartbeat(publisher: &mut Publisher, args: &Args, running: &AtomicBool) -> u64 {
    let interval = Duration::from_millis(args.interval_ms);
    let mut sent = 0u64;

    while running.load(Ordering::SeqCst) && !limit_reached(args, sent) {
        let started = Instant::now();
        if publisher.publish(args.event_type, &sent.to_le_bytes()) {
            debug!("heartbeat {}", sent);
        }
        sent += 1;

        while running.load(Ordering::SeqCst) && started.elapsed() < interval {
            thread::sleep(Duration::from_millis(20).min(interval));
        }
    }
    sent
}

fn publish_stdin(publisher: &mut Publisher, args: &Args, running: &AtomicBool) -> u64 {
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    let mut sent = 0u64;
    while running.load(Ordering::SeqCst) && !limit_reached(args, sent) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => {
                if publisher.publish(args.event_type, line.as_bytes()) {
                    sent += 1;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("stdin closed");
                break;
            }
        }
    }
    sent
}
