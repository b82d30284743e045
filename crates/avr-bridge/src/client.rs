//! Connected mirror clients and the fan-out engine.
//!
//! Every client keeps its own logical read position into the shared
//! [`RingBuffer`]. Each fan-out pass writes `[position, head)` to each client,
//! advances positions by what the socket actually accepted, and then lets the
//! ring buffer reclaim everything below the slowest surviving client.
//!
//! A client that falls more than half the buffer behind `head` is moved forward
//! so that one stalled reader cannot pin the tail; the bytes it skips are lost
//! to that client only.

use crate::command::CommandScratch;
use crate::ring_buffer::{Position, RingBuffer};
use crate::transport::{is_transient, ClientStream};
use std::io::IoSlice;
use tracing::debug;

/// One connected TCP peer.
pub struct Client<S> {
    pub(crate) stream: S,
    pub(crate) identifier: String,
    pub(crate) position: Position,
    pub(crate) disconnected: bool,
    pub(crate) scratch: CommandScratch,
}

impl<S> Client<S> {
    fn new(stream: S, identifier: String, position: Position) -> Self {
        Client {
            stream,
            identifier,
            position,
            disconnected: false,
            scratch: CommandScratch::new(),
        }
    }

    /// Peer address used for display.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Next stream position this client will be sent.
    pub fn position(&self) -> Position {
        self.position
    }

    /// True once the client has failed and awaits removal.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Bytes waiting in this client's command scratch.
    pub fn pending_command_bytes(&self) -> usize {
        self.scratch.len()
    }

    pub(crate) fn mark_disconnected(&mut self, reason: &str) {
        if !self.disconnected {
            debug!(client = %self.identifier, reason, "client disconnected");
            self.disconnected = true;
        }
    }
}

/// Result of one fan-out pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOutStats {
    /// Bytes accepted by client sockets.
    pub bytes_sent: usize,
    /// Clients whose position was moved forward for lagging.
    pub lag_skips: usize,
    /// Bytes those clients will never receive.
    pub bytes_skipped: u64,
    /// Clients marked disconnected during the pass.
    pub disconnected: usize,
}

/// Ordered set of connected clients.
pub struct ClientRegistry<S> {
    clients: Vec<Client<S>>,
}

impl<S> Default for ClientRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ClientRegistry<S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        ClientRegistry {
            clients: Vec::new(),
        }
    }

    /// Register a client. It receives only bytes written from `head` onwards.
    pub fn add(&mut self, stream: S, identifier: String, head: Position) {
        debug!(client = %identifier, position = head, "client connected");
        self.clients.push(Client::new(stream, identifier, head));
    }

    /// Number of registered clients, including ones awaiting removal.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True when no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Iterate over clients in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Client<S>> {
        self.clients.iter()
    }

    pub(crate) fn live_mut(&mut self) -> impl Iterator<Item = &mut Client<S>> {
        self.clients.iter_mut().filter(|c| !c.disconnected)
    }

    /// Let the ring buffer reclaim everything below the slowest live client,
    /// or everything if there are none.
    pub fn reclaim(&self, ring: &mut RingBuffer) {
        let slowest = self
            .clients
            .iter()
            .filter(|c| !c.disconnected)
            .map(|c| c.position)
            .min()
            .unwrap_or(ring.head());
        ring.release_to(slowest);
    }

    /// Remove disconnected clients. Returns how many were removed.
    pub fn cleanup(&mut self, ring: &mut RingBuffer) -> usize {
        let before = self.clients.len();
        self.clients.retain(|c| {
            if c.disconnected {
                debug!(client = %c.identifier, "removing client");
            }
            !c.disconnected
        });
        let removed = before - self.clients.len();
        if removed > 0 {
            self.reclaim(ring);
        }
        removed
    }
}

impl<S: ClientStream> ClientRegistry<S> {
    /// Push newly available bytes to every live client.
    pub fn fan_out(&mut self, ring: &mut RingBuffer) -> FanOutStats {
        let mut stats = FanOutStats::default();
        let head = ring.head();
        let floor = head.saturating_sub(ring.lag_limit()).max(ring.tail());

        for client in self.clients.iter_mut().filter(|c| !c.disconnected) {
            if client.position < floor {
                let skipped = floor - client.position;
                debug!(client = %client.identifier, skipped, "client lagging, skipping ahead");
                client.position = floor;
                stats.lag_skips += 1;
                stats.bytes_skipped += skipped;
            }

            if client.position == head {
                continue;
            }

            let (first, second) = ring.window(client.position, head);
            let bufs = [IoSlice::new(first), IoSlice::new(second)];
            match client.stream.write_vectored(&bufs) {
                Ok(0) => {
                    client.mark_disconnected("zero-length write");
                    stats.disconnected += 1;
                }
                Ok(n) => {
                    client.position += n as u64;
                    stats.bytes_sent += n;
                }
                Err(e) if is_transient(&e) => {}
                Err(e) => {
                    client.mark_disconnected(&e.to_string());
                    stats.disconnected += 1;
                }
            }
        }

        self.reclaim(ring);
        stats
    }

    /// Shut down every client connection.
    pub fn shutdown_all(&mut self) {
        for client in &mut self.clients {
            if let Err(e) = client.stream.shutdown() {
                debug!(client = %client.identifier, "shutdown failed: {}", e);
            }
        }
    }
}
