//! In-memory transports and sinks for testing.
//!
//! Every mock is a cheap handle around shared state, so a test can keep one
//! clone for inspection while the bridge owns the other.

use crate::sink::StateSink;
use crate::transport::{ClientListener, ClientStream, SerialDevice};
use std::collections::VecDeque;
use std::io::{self, IoSlice, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Serial Device
// ============================================================================

#[derive(Default)]
struct MockDeviceInner {
    rx: VecDeque<u8>,
    written: Vec<u8>,
    fail_reads: bool,
}

/// Mock serial device.
#[derive(Clone, Default)]
pub struct MockDevice {
    inner: Arc<Mutex<MockDeviceInner>>,
}

impl MockDevice {
    /// Create an idle device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the bridge to read.
    pub fn inject(&self, data: &[u8]) {
        lock(&self.inner).rx.extend(data);
    }

    /// Bytes not yet read by the bridge.
    pub fn pending(&self) -> usize {
        lock(&self.inner).rx.len()
    }

    /// Everything the bridge has written to the device.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.inner).written.clone()
    }

    /// Make subsequent reads fail as if the device was unplugged.
    pub fn fail_reads(&self) {
        lock(&self.inner).fail_reads = true;
    }
}

impl SerialDevice for MockDevice {
    fn available(&mut self) -> io::Result<usize> {
        let inner = lock(&self.inner);
        if inner.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        Ok(inner.rx.len())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(lock(&self.inner).rx.pop_front())
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        lock(&self.inner).written.extend_from_slice(data);
        Ok(())
    }
}

// ============================================================================
// Client Stream
// ============================================================================

/// How a [`MockStream`] responds to writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBehavior {
    /// Accept up to `limit` bytes per call.
    Accept {
        /// Maximum bytes accepted per write call.
        limit: usize,
    },
    /// Report that the write would block.
    WouldBlock,
    /// Accept zero bytes (peer gone).
    Zero,
    /// Fail with a connection reset.
    Reset,
}

struct MockStreamInner {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    behavior: WriteBehavior,
    peer_closed: bool,
    shut_down: bool,
}

/// Mock client connection.
#[derive(Clone)]
pub struct MockStream {
    inner: Arc<Mutex<MockStreamInner>>,
}

impl Default for MockStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStream {
    /// Create a stream that accepts every write in full.
    pub fn new() -> Self {
        MockStream {
            inner: Arc::new(Mutex::new(MockStreamInner {
                inbound: VecDeque::new(),
                outbound: Vec::new(),
                behavior: WriteBehavior::Accept { limit: usize::MAX },
                peer_closed: false,
                shut_down: false,
            })),
        }
    }

    /// Change how writes are handled.
    pub fn set_behavior(&self, behavior: WriteBehavior) {
        lock(&self.inner).behavior = behavior;
    }

    /// Queue bytes as if the peer sent them.
    pub fn send_from_peer(&self, data: &[u8]) {
        lock(&self.inner).inbound.extend(data);
    }

    /// Make the next read (once queued bytes are drained) return end-of-stream.
    pub fn close_from_peer(&self) {
        lock(&self.inner).peer_closed = true;
    }

    /// Bytes the bridge has written to this client.
    pub fn received(&self) -> Vec<u8> {
        lock(&self.inner).outbound.clone()
    }

    /// Whether the bridge shut the connection down.
    pub fn is_shut_down(&self) -> bool {
        lock(&self.inner).shut_down
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = lock(&self.inner);
        if inner.inbound.is_empty() {
            if inner.peer_closed {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(inner.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inner.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_vectored(&[IoSlice::new(buf)])
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let mut inner = lock(&self.inner);
        let behavior = inner.behavior;
        match behavior {
            WriteBehavior::Accept { limit } => {
                let mut remaining = limit;
                let mut written = 0;
                for buf in bufs {
                    let n = buf.len().min(remaining);
                    inner.outbound.extend_from_slice(&buf[..n]);
                    written += n;
                    remaining -= n;
                    if remaining == 0 {
                        break;
                    }
                }
                Ok(written)
            }
            WriteBehavior::WouldBlock => Err(io::ErrorKind::WouldBlock.into()),
            WriteBehavior::Zero => Ok(0),
            WriteBehavior::Reset => Err(io::ErrorKind::ConnectionReset.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ClientStream for MockStream {
    fn shutdown(&mut self) -> io::Result<()> {
        lock(&self.inner).shut_down = true;
        Ok(())
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Mock listener handing out queued connections.
#[derive(Clone, Default)]
pub struct MockListener {
    pending: Arc<Mutex<VecDeque<(MockStream, String)>>>,
}

impl MockListener {
    /// Create a listener with no pending connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection and return a handle to its stream.
    pub fn connect(&self, identifier: &str) -> MockStream {
        let stream = MockStream::new();
        lock(&self.pending).push_back((stream.clone(), identifier.to_string()));
        stream
    }

    /// Connections not yet accepted.
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl ClientListener for MockListener {
    type Stream = MockStream;

    fn accept(&mut self) -> io::Result<Option<(MockStream, String)>> {
        Ok(lock(&self.pending).pop_front())
    }
}

// ============================================================================
// Sink
// ============================================================================

#[derive(Default)]
struct RecordingSinkInner {
    texts: Vec<(String, String)>,
    numerics: Vec<(String, f64)>,
}

/// Sink recording every publication.
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<RecordingSinkInner>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text publications in order.
    pub fn texts(&self) -> Vec<(String, String)> {
        lock(&self.inner).texts.clone()
    }

    /// Numeric publications in order.
    pub fn numerics(&self) -> Vec<(String, f64)> {
        lock(&self.inner).numerics.clone()
    }

    /// Total number of publications.
    pub fn count(&self) -> usize {
        let inner = lock(&self.inner);
        inner.texts.len() + inner.numerics.len()
    }
}

impl StateSink for RecordingSink {
    fn publish_text(&mut self, name: &str, value: &str) {
        lock(&self.inner).texts.push((name.to_string(), value.to_string()));
    }

    fn publish_numeric(&mut self, name: &str, value: f64) {
        lock(&self.inner).numerics.push((name.to_string(), value));
    }
}
