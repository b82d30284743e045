//! Command injection from TCP clients to the serial device.
//!
//! Clients trigger a device command by sending exactly four raw bytes. Bytes
//! from each read are appended to a scratch buffer; when the scratch holds
//! exactly four bytes they become the payload of a `PCSEND` frame. A scratch
//! that grows past [`MAX_SCRATCH_LEN`] without ever holding exactly four bytes
//! is discarded as garbage.

use crate::client::{Client, ClientRegistry};
use crate::transport::{is_transient, ClientStream, SerialDevice};
use avr_protocol::{CommandFrame, COMMAND_PAYLOAD_LEN};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::io;
use tracing::debug;

/// Scratch length above which pending bytes are dropped.
pub const MAX_SCRATCH_LEN: usize = 32;

/// Largest read taken from one client per tick.
pub const CLIENT_READ_CHUNK: usize = 128;

/// Which clients share a command scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScratchScope {
    /// Every client assembles its own commands.
    #[default]
    PerClient,
    /// All clients feed one buffer, so partial commands from different clients
    /// combine.
    Shared,
}

/// What happened after bytes were added to a scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchOutcome {
    /// Not a complete command yet.
    Pending,
    /// Exactly four bytes were present; the scratch has been cleared.
    Ready(CommandFrame),
    /// The scratch overflowed and was cleared; carries the discarded length.
    Discarded(usize),
}

/// Accumulator for one pending command.
#[derive(Debug, Default)]
pub struct CommandScratch {
    buf: BytesMut,
}

impl CommandScratch {
    /// Create an empty scratch.
    pub fn new() -> Self {
        CommandScratch {
            buf: BytesMut::with_capacity(MAX_SCRATCH_LEN + CLIENT_READ_CHUNK),
        }
    }

    /// Append one read's worth of bytes.
    pub fn push(&mut self, data: &[u8]) -> ScratchOutcome {
        self.buf.extend_from_slice(data);

        if self.buf.len() == COMMAND_PAYLOAD_LEN {
            let mut payload = [0u8; COMMAND_PAYLOAD_LEN];
            payload.copy_from_slice(&self.buf);
            self.buf.clear();
            return ScratchOutcome::Ready(CommandFrame::new(payload));
        }

        if self.buf.len() > MAX_SCRATCH_LEN {
            let discarded = self.buf.len();
            self.buf.clear();
            return ScratchOutcome::Discarded(discarded);
        }

        ScratchOutcome::Pending
    }

    /// Drop any pending bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of pending bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Result of polling every client for command bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommandStats {
    /// Bytes read from clients.
    pub bytes_received: usize,
    /// Command frames written to the device.
    pub sent: usize,
    /// Scratch buffers discarded as garbage.
    pub discarded: usize,
    /// Clients that closed or failed while being read.
    pub disconnected: usize,
}

/// Routes client bytes into command frames for the device.
#[derive(Debug, Default)]
pub struct CommandChannel {
    scope: ScratchScope,
    shared: CommandScratch,
}

impl CommandChannel {
    /// Create a channel with the given scratch scoping.
    pub fn new(scope: ScratchScope) -> Self {
        CommandChannel {
            scope,
            shared: CommandScratch::new(),
        }
    }

    /// Bytes pending in the shared scratch (always zero in per-client mode).
    pub fn shared_pending(&self) -> usize {
        self.shared.len()
    }

    /// Feed bytes received from `client`.
    pub fn on_client_bytes<S>(&mut self, client: &mut Client<S>, bytes: &[u8]) -> ScratchOutcome {
        let scratch = match self.scope {
            ScratchScope::PerClient => &mut client.scratch,
            ScratchScope::Shared => &mut self.shared,
        };
        scratch.push(bytes)
    }

    /// Forget pending bytes after `client` closed its side.
    pub fn on_client_closed<S>(&mut self, client: &mut Client<S>) {
        client.scratch.clear();
        if self.scope == ScratchScope::Shared {
            self.shared.clear();
        }
    }

    /// Read available bytes from every live client and forward completed
    /// commands to the device.
    ///
    /// Only a failing device write is returned as an error.
    pub fn poll_clients<S, D>(
        &mut self,
        registry: &mut ClientRegistry<S>,
        device: &mut D,
    ) -> io::Result<CommandStats>
    where
        S: ClientStream,
        D: SerialDevice + ?Sized,
    {
        let mut stats = CommandStats::default();
        let mut buf = [0u8; CLIENT_READ_CHUNK];

        for client in registry.live_mut() {
            match client.stream.read(&mut buf) {
                Ok(0) => {
                    client.mark_disconnected("peer closed");
                    self.on_client_closed(client);
                    stats.disconnected += 1;
                }
                Ok(n) => {
                    stats.bytes_received += n;
                    match self.on_client_bytes(client, &buf[..n]) {
                        ScratchOutcome::Ready(command) => {
                            device.write_bytes(&command.encode())?;
                            debug!(
                                client = %client.identifier,
                                payload = %hex::encode_upper(command.payload()),
                                "PCSEND"
                            );
                            stats.sent += 1;
                        }
                        ScratchOutcome::Discarded(len) => {
                            debug!(client = %client.identifier, len, "discarding command garbage");
                            stats.discarded += 1;
                        }
                        ScratchOutcome::Pending => {}
                    }
                }
                Err(e) if is_transient(&e) => {}
                Err(e) => {
                    client.mark_disconnected(&e.to_string());
                    self.on_client_closed(client);
                    stats.disconnected += 1;
                }
            }
        }

        Ok(stats)
    }
}
