//! Shared ring buffer for the serial byte stream.
//!
//! One producer appends device bytes; any number of readers track their own
//! logical position. Positions live in an unbounded `u64` index space and are
//! mapped to storage with a bitmask, so the capacity must be a power of two.
//!
//! ```text
//!            tail                         head
//!             |<------ retained bytes ----->|
//! ... lost ...|  readers are somewhere here | next write
//! ```
//!
//! `head - tail <= capacity` holds after every operation. Bytes in
//! `[tail, head)` are guaranteed not to have been overwritten.

use crate::error::{BridgeError, Result};

/// Logical position in the serial byte stream.
pub type Position = u64;

/// Fixed-capacity circular byte store with a monotonic write head.
#[derive(Debug)]
pub struct RingBuffer {
    data: Box<[u8]>,
    mask: u64,
    head: Position,
    tail: Position,
    overwritten: u64,
}

impl RingBuffer {
    /// Create a buffer. `capacity` must be a non-zero power of two.
    pub fn new(capacity: usize) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(BridgeError::InvalidCapacity(capacity));
        }
        Ok(RingBuffer {
            data: vec![0u8; capacity].into_boxed_slice(),
            mask: capacity as u64 - 1,
            head: 0,
            tail: 0,
            overwritten: 0,
        })
    }

    /// Storage size in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// How far a reader may fall behind `head` before it is moved forward.
    #[inline]
    pub fn lag_limit(&self) -> u64 {
        self.data.len() as u64 / 2
    }

    /// Position of the next byte to be written.
    #[inline]
    pub fn head(&self) -> Position {
        self.head
    }

    /// Oldest position that is still retained.
    #[inline]
    pub fn tail(&self) -> Position {
        self.tail
    }

    /// Number of retained bytes (`head - tail`).
    #[inline]
    pub fn len(&self) -> usize {
        (self.head - self.tail) as usize
    }

    /// True when no bytes are retained.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Total bytes lost because the buffer was full when they were appended over.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    #[inline]
    fn index(&self, pos: Position) -> usize {
        (pos & self.mask) as usize
    }

    /// Append one byte, overwriting the oldest retained byte when full.
    #[inline]
    pub fn append(&mut self, byte: u8) {
        if self.len() == self.capacity() {
            self.tail += 1;
            self.overwritten += 1;
        }
        let idx = self.index(self.head);
        self.data[idx] = byte;
        self.head += 1;
    }

    /// Append a slice of bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.append(b);
        }
    }

    /// Allow storage below `pos` to be reused.
    ///
    /// The tail only moves forward and never passes `head`.
    pub fn release_to(&mut self, pos: Position) {
        self.tail = pos.clamp(self.tail, self.head);
    }

    /// View `[from, to)` as at most two contiguous slices.
    ///
    /// The range is clamped to `[tail, head]`. The first slice runs up to the
    /// physical end of storage; the second (possibly empty) continues from the
    /// start.
    pub fn window(&self, from: Position, to: Position) -> (&[u8], &[u8]) {
        let to = to.clamp(self.tail, self.head);
        let from = from.clamp(self.tail, to);
        let len = (to - from) as usize;
        if len == 0 {
            return (&[], &[]);
        }

        let start = self.index(from);
        let first_len = len.min(self.capacity() - start);
        (
            &self.data[start..start + first_len],
            &self.data[..len - first_len],
        )
    }
}
