// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! I/O thread for the TCP transport.
//!
//! One thread per transport context runs a mio event loop that owns every
//! listener and subscriber connection of the context's sockets. Sockets talk
//! to it through a command channel and a [`Waker`].
//!
//! ```text
//! +-------------------------------------------------------------+
//! |                        IoThread                              |
//! |  +-------------------------------------------------------+  |
//! |  |                    mio::Poll                           |  |
//! |  |  - Listeners (accept subscribers)                     |  |
//! |  |  - Subscriber streams (drain send queues, detect EOF)  |  |
//! |  |  - Waker (commands from publish sockets)              |  |
//! |  +-------------------------------------------------------+  |
//! +-------------------------------------------------------------+
//! ```
//!
//! Messages arrive fully encoded. Each subscriber gets an `Arc` of the
//! message in its queue, so a message is written to a subscriber completely
//! or, when its queue is over the high-water mark, not at all.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use socket2::{Domain, Protocol, Socket, Type};

use super::stats::SocketStats;
use super::TcpConfig;

// ============================================================================
// Constants
// ============================================================================

/// Token for the waker (command channel)
const WAKER_TOKEN: Token = Token(0);

/// Starting token for listeners and connections
const FIRST_TOKEN: usize = 1;

/// Default poll timeout
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum events to process per poll
const MAX_EVENTS: usize = 128;

/// Scratch buffer for discarding subscriber input
const READ_SCRATCH_SIZE: usize = 4096;

// ============================================================================
// Commands
// ============================================================================

/// Commands sent to the I/O thread.
pub(crate) enum IoCommand {
    /// Open a listener for a socket and report the bound address
    Bind {
        socket_id: u64,
        addr: SocketAddr,
        stats: Arc<SocketStats>,
        reply: Sender<io::Result<SocketAddr>>,
    },

    /// Queue an encoded message for every subscriber of a socket
    Publish {
        socket_id: u64,
        message: Arc<Vec<u8>>,
    },

    /// Drop a socket's listener and subscribers
    CloseSocket { socket_id: u64 },

    /// Shutdown the I/O thread
    Shutdown,
}

/// Cloneable command path into the I/O thread.
#[derive(Clone)]
pub(crate) struct CommandSender {
    cmd_tx: Sender<IoCommand>,
    waker: Arc<Waker>,
}

impl CommandSender {
    /// Queue a command and wake the poll.
    pub(crate) fn submit(&self, cmd: IoCommand) -> io::Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "I/O thread stopped"))?;
        self.waker.wake()
    }
}

// ============================================================================
// I/O Thread Handle
// ============================================================================

/// Owner handle of the I/O thread; shuts it down on drop.
pub(crate) struct IoThreadHandle {
    sender: CommandSender,
    thread_handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl IoThreadHandle {
    pub(crate) fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the event loop and join the thread.
    pub(crate) fn shutdown(&mut self) -> io::Result<()> {
        let Some(handle) = self.thread_handle.take() else {
            return Ok(());
        };

        let _ = self.sender.submit(IoCommand::Shutdown);
        handle
            .join()
            .map_err(|_| io::Error::other("I/O thread panicked"))
    }
}

impl Drop for IoThreadHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

// ============================================================================
// I/O Thread
// ============================================================================

struct ListenerEntry {
    socket_id: u64,
    listener: TcpListener,
    stats: Arc<SocketStats>,
}

/// One connected subscriber.
struct Subscriber {
    socket_id: u64,
    stream: TcpStream,
    remote_addr: SocketAddr,
    stats: Arc<SocketStats>,

    /// Encoded messages waiting to be written
    queue: VecDeque<Arc<Vec<u8>>>,

    /// Bytes of the front message already written
    offset: usize,

    /// Sum of queued message sizes
    queued_bytes: usize,
}

impl Subscriber {
    /// Write queued messages until the socket would block.
    fn flush(&mut self) -> io::Result<()> {
        while let Some(front) = self.queue.front().cloned() {
            match self.stream.write(&front[self.offset..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.offset += n;
                    self.stats.record_bytes_written(n);
                    if self.offset == front.len() {
                        self.queue.pop_front();
                        self.queued_bytes -= front.len();
                        self.offset = 0;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// I/O thread state and runner.
pub(crate) struct IoThread {
    config: TcpConfig,
    poll: Poll,
    listeners: HashMap<Token, ListenerEntry>,
    subscribers: HashMap<Token, Subscriber>,
    next_token: usize,
    cmd_rx: Receiver<IoCommand>,
    running: Arc<AtomicBool>,
    scratch: Vec<u8>,
}

impl IoThread {
    /// Create the I/O thread state without starting it.
    fn new(config: TcpConfig) -> io::Result<(Self, IoThreadHandle)> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let (cmd_tx, cmd_rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let io_thread = Self {
            config,
            poll,
            listeners: HashMap::new(),
            subscribers: HashMap::new(),
            next_token: FIRST_TOKEN,
            cmd_rx,
            running: running.clone(),
            scratch: vec![0u8; READ_SCRATCH_SIZE],
        };

        let handle = IoThreadHandle {
            sender: CommandSender { cmd_tx, waker },
            thread_handle: None,
            running,
        };

        Ok((io_thread, handle))
    }

    /// Spawn the I/O thread.
    pub(crate) fn spawn(config: TcpConfig) -> io::Result<IoThreadHandle> {
        let (io_thread, mut handle) = Self::new(config)?;

        let thread_handle = thread::Builder::new()
            .name("herald-tcp-io".to_string())
            .spawn(move || io_thread.run())?;

        handle.thread_handle = Some(thread_handle);
        Ok(handle)
    }

    /// Run the I/O event loop.
    fn run(mut self) {
        let mut events = Events::with_capacity(MAX_EVENTS);

        while self.running.load(Ordering::Relaxed) {
            if let Err(e) = self.poll.poll(&mut events, Some(DEFAULT_POLL_TIMEOUT)) {
                if e.kind() != io::ErrorKind::Interrupted {
                    log::warn!("tcp I/O poll error: {}", e);
                }
                continue;
            }

            for event in events.iter() {
                let token = event.token();
                if token == WAKER_TOKEN {
                    self.handle_commands();
                } else if self.listeners.contains_key(&token) {
                    self.handle_accept(token);
                } else {
                    if event.is_readable() {
                        self.handle_readable(token);
                    }
                    if event.is_writable() {
                        self.handle_writable(token);
                    }
                }
            }
        }

        // Cleanup
        for (_, mut sub) in self.subscribers.drain() {
            let _ = self.poll.registry().deregister(&mut sub.stream);
            sub.stats.record_subscriber_disconnected();
        }
        for (_, mut entry) in self.listeners.drain() {
            let _ = self.poll.registry().deregister(&mut entry.listener);
        }
        log::debug!("tcp I/O thread stopped");
    }

    fn allocate_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Handle commands from publish sockets.
    fn handle_commands(&mut self) {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(IoCommand::Bind {
                    socket_id,
                    addr,
                    stats,
                    reply,
                }) => {
                    let result = self.handle_bind(socket_id, addr, stats);
                    let _ = reply.send(result);
                }
                Ok(IoCommand::Publish { socket_id, message }) => {
                    self.handle_publish(socket_id, message);
                }
                Ok(IoCommand::CloseSocket { socket_id }) => {
                    self.handle_close_socket(socket_id);
                }
                Ok(IoCommand::Shutdown) | Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::Relaxed);
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
    }

    fn open_listener(&self, addr: SocketAddr) -> io::Result<TcpListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        if self.config.reuse_address && cfg!(unix) {
            socket.set_reuse_address(true)?;
        }
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(self.config.listen_backlog.min(i32::MAX as u32) as i32)?;
        Ok(TcpListener::from_std(socket.into()))
    }

    fn handle_bind(
        &mut self,
        socket_id: u64,
        addr: SocketAddr,
        stats: Arc<SocketStats>,
    ) -> io::Result<SocketAddr> {
        let mut listener = self.open_listener(addr)?;
        let local_addr = listener.local_addr()?;

        let token = self.allocate_token();
        self.poll
            .registry()
            .register(&mut listener, token, Interest::READABLE)?;

        self.listeners.insert(
            token,
            ListenerEntry {
                socket_id,
                listener,
                stats,
            },
        );
        log::debug!("socket {} listening on {}", socket_id, local_addr);
        Ok(local_addr)
    }

    /// Accept pending subscribers on a listener.
    fn handle_accept(&mut self, token: Token) {
        loop {
            let Some(entry) = self.listeners.get(&token) else {
                return;
            };
            match entry.listener.accept() {
                Ok((mut stream, remote_addr)) => {
                    let socket_id = entry.socket_id;
                    let stats = entry.stats.clone();
                    let sub_token = self.allocate_token();

                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        sub_token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        log::warn!("cannot register subscriber {}: {}", remote_addr, e);
                        continue;
                    }
                    let _ = stream.set_nodelay(self.config.nodelay);

                    stats.record_subscriber_connected();
                    log::debug!("socket {}: subscriber {} connected", socket_id, remote_addr);

                    self.subscribers.insert(
                        sub_token,
                        Subscriber {
                            socket_id,
                            stream,
                            remote_addr,
                            stats,
                            queue: VecDeque::new(),
                            offset: 0,
                            queued_bytes: 0,
                        },
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("accept error: {}", e);
                    break;
                }
            }
        }
    }

    /// Fan an encoded message out to a socket's subscribers.
    fn handle_publish(&mut self, socket_id: u64, message: Arc<Vec<u8>>) {
        let high_water_mark = self.config.send_high_water_mark;
        let mut failed = Vec::new();

        for (token, sub) in self.subscribers.iter_mut() {
            if sub.socket_id != socket_id {
                continue;
            }
            // An idle subscriber always takes the next message, whatever its size.
            if !sub.queue.is_empty() && sub.queued_bytes + message.len() > high_water_mark {
                sub.stats.record_dropped();
                log::debug!(
                    "subscriber {} queue full ({} bytes), dropping message",
                    sub.remote_addr,
                    sub.queued_bytes
                );
                continue;
            }
            sub.queued_bytes += message.len();
            sub.queue.push_back(Arc::clone(&message));
            if let Err(e) = sub.flush() {
                log::debug!("write to subscriber {} failed: {}", sub.remote_addr, e);
                failed.push(*token);
            }
        }

        for token in failed {
            self.remove_subscriber(token);
        }
    }

    /// Subscribers never send data we act on; drain and watch for EOF.
    fn handle_readable(&mut self, token: Token) {
        let Some(sub) = self.subscribers.get_mut(&token) else {
            return;
        };

        let closed = loop {
            match sub.stream.read(&mut self.scratch) {
                Ok(0) => break true,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break false,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("read from subscriber {} failed: {}", sub.remote_addr, e);
                    break true;
                }
            }
        };

        if closed {
            self.remove_subscriber(token);
        }
    }

    fn handle_writable(&mut self, token: Token) {
        let Some(sub) = self.subscribers.get_mut(&token) else {
            return;
        };
        if let Err(e) = sub.flush() {
            log::debug!("write to subscriber {} failed: {}", sub.remote_addr, e);
            self.remove_subscriber(token);
        }
    }

    fn remove_subscriber(&mut self, token: Token) {
        if let Some(mut sub) = self.subscribers.remove(&token) {
            let _ = self.poll.registry().deregister(&mut sub.stream);
            sub.stats.record_subscriber_disconnected();
            log::debug!(
                "socket {}: subscriber {} disconnected",
                sub.socket_id,
                sub.remote_addr
            );
        }
    }

    fn handle_close_socket(&mut self, socket_id: u64) {
        let listener_tokens: Vec<Token> = self
            .listeners
            .iter()
            .filter(|(_, l)| l.socket_id == socket_id)
            .map(|(t, _)| *t)
            .collect();
        for token in listener_tokens {
            if let Some(mut entry) = self.listeners.remove(&token) {
                let _ = self.poll.registry().deregister(&mut entry.listener);
            }
        }

        let sub_tokens: Vec<Token> = self
            .subscribers
            .iter()
            .filter(|(_, s)| s.socket_id == socket_id)
            .map(|(t, _)| *t)
            .collect();
        for token in sub_tokens {
            self.remove_subscriber(token);
        }
        log::debug!("socket {} closed", socket_id);
    }
}
