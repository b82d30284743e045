//! Display frame parser.
//!
//! Display frames arrive interleaved with whatever else the device emits, so the
//! parser is a byte-at-a-time state machine rather than a buffer scanner:
//!
//! ```text
//! +----------+------+------+-----------+------+-----------+------+
//! | "MPSEND" | 0x32 | 0xF0 | upper[14] | 0xF1 | lower[14] | 0xF2 |
//! +----------+------+------+-----------+------+-----------+------+
//! ```
//!
//! Bytes that do not fit the expected position are ignored. A lost marker
//! desynchronizes the parser until the next signature; there is no look-ahead.

use crate::constants::*;
use crate::volume::parse_volume;

/// Position of the parser within the frame grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    /// Matching the `MPSEND` signature.
    #[default]
    WaitSignature,
    /// Waiting for the text metadata byte.
    WaitMeta,
    /// Waiting for the upper field marker.
    WaitUpperStart,
    /// Collecting the upper field.
    ReadUpper,
    /// Waiting for the lower field marker.
    WaitLowerStart,
    /// Collecting the lower field.
    ReadLower,
    /// Waiting for the end marker.
    WaitFrameEnd,
}

/// A completed display frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEvent {
    /// Upper display line, trimmed of surrounding spaces.
    pub upper: String,
    /// Lower display line, trimmed of surrounding spaces.
    pub lower: String,
}

impl FrameEvent {
    /// Volume in dB if the lower line shows a volume reading.
    pub fn volume(&self) -> Option<i32> {
        parse_volume(&self.lower)
    }
}

/// Fixed-width text accumulator with an explicit write cursor.
#[derive(Debug, Clone)]
struct TextField {
    buf: [u8; FIELD_LEN],
    len: usize,
}

impl TextField {
    const fn new() -> Self {
        TextField {
            buf: [b' '; FIELD_LEN],
            len: 0,
        }
    }

    fn clear(&mut self) {
        self.buf = [b' '; FIELD_LEN];
        self.len = 0;
    }

    /// Append one byte. Returns true once the field is full.
    fn push(&mut self, byte: u8) -> bool {
        if self.len < FIELD_LEN {
            self.buf[self.len] = printable(byte);
            self.len += 1;
        }
        self.len == FIELD_LEN
    }

    fn trimmed(&self) -> String {
        // Only printable ASCII is ever stored, so this is lossless.
        let text = String::from_utf8_lossy(&self.buf);
        text.trim_matches(' ').to_string()
    }
}

/// Map control and non-ASCII bytes to a space.
#[inline]
pub fn printable(byte: u8) -> u8 {
    if (32..127).contains(&byte) {
        byte
    } else {
        b' '
    }
}

/// Streaming parser for `MPSEND` display frames.
///
/// Call [`FrameParser::feed`] once per received byte, in arrival order.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParserState,
    sig_pos: usize,
    upper: TextField,
    lower: TextField,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser waiting for a signature.
    pub const fn new() -> Self {
        FrameParser {
            state: ParserState::WaitSignature,
            sig_pos: 0,
            upper: TextField::new(),
            lower: TextField::new(),
        }
    }

    /// Current grammar position.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Number of signature bytes matched so far.
    pub fn signature_progress(&self) -> usize {
        self.sig_pos
    }

    /// Drop any partial frame and wait for the next signature.
    pub fn reset(&mut self) {
        self.state = ParserState::WaitSignature;
        self.sig_pos = 0;
        self.upper.clear();
        self.lower.clear();
    }

    /// Feed one byte. Returns an event when the byte completes a frame.
    pub fn feed(&mut self, byte: u8) -> Option<FrameEvent> {
        match self.state {
            ParserState::WaitSignature => {
                if byte == DEVICE_SIGNATURE[self.sig_pos] {
                    self.sig_pos += 1;
                    if self.sig_pos == DEVICE_SIGNATURE.len() {
                        self.sig_pos = 0;
                        self.state = ParserState::WaitMeta;
                        log::trace!("display signature matched");
                    }
                } else if byte == DEVICE_SIGNATURE[0] {
                    // The signature has no self-overlap, so a fresh start is the only candidate.
                    self.sig_pos = 1;
                } else {
                    self.sig_pos = 0;
                }
            }

            ParserState::WaitMeta => {
                if byte == META_TEXT {
                    self.state = ParserState::WaitUpperStart;
                }
            }

            ParserState::WaitUpperStart => {
                if byte == MARKER_UPPER {
                    self.upper.clear();
                    self.state = ParserState::ReadUpper;
                }
            }

            ParserState::ReadUpper => {
                if self.upper.push(byte) {
                    self.state = ParserState::WaitLowerStart;
                }
            }

            ParserState::WaitLowerStart => {
                if byte == MARKER_LOWER {
                    self.lower.clear();
                    self.state = ParserState::ReadLower;
                }
            }

            ParserState::ReadLower => {
                if self.lower.push(byte) {
                    self.state = ParserState::WaitFrameEnd;
                }
            }

            ParserState::WaitFrameEnd => {
                if byte == MARKER_END {
                    self.state = ParserState::WaitSignature;
                    let event = FrameEvent {
                        upper: self.upper.trimmed(),
                        lower: self.lower.trimmed(),
                    };
                    log::trace!("display frame: {:?} / {:?}", event.upper, event.lower);
                    return Some(event);
                }
            }
        }

        None
    }

    /// Feed a slice, collecting every completed frame.
    pub fn feed_slice(&mut self, data: &[u8]) -> Vec<FrameEvent> {
        data.iter().filter_map(|&byte| self.feed(byte)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to build a display frame with the given raw field contents.
    fn display_frame(upper: &[u8; FIELD_LEN], lower: &[u8; FIELD_LEN]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(DEVICE_SIGNATURE);
        buf.push(META_TEXT);
        buf.push(MARKER_UPPER);
        buf.extend_from_slice(upper);
        buf.push(MARKER_LOWER);
        buf.extend_from_slice(lower);
        buf.push(MARKER_END);
        buf
    }

    #[test]
    fn test_single_frame() {
        let mut parser = FrameParser::new();
        let events = parser.feed_slice(&display_frame(b"  DVD         ", b"  VOL -43dB   "));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].upper, "DVD");
        assert_eq!(events[0].lower, "VOL -43dB");
        assert_eq!(events[0].volume(), Some(-43));
        assert_eq!(parser.state(), ParserState::WaitSignature);
    }

    #[test]
    fn test_event_only_on_end_marker() {
        let mut parser = FrameParser::new();
        let frame = display_frame(b"TUNER FM      ", b"101.10 MHz    ");
        let (body, end) = frame.split_at(frame.len() - 1);

        for &byte in body {
            assert!(parser.feed(byte).is_none());
        }
        assert_eq!(parser.state(), ParserState::WaitFrameEnd);
        let event = parser.feed(end[0]).expect("end marker completes the frame");
        assert_eq!(event.upper, "TUNER FM");
        assert_eq!(event.lower, "101.10 MHz");
    }

    #[test]
    fn test_non_printable_become_spaces() {
        let mut parser = FrameParser::new();
        let mut upper = *b"AB            ";
        upper[2] = 0x01;
        upper[3] = b'C';
        upper[4] = 0xF2; // marker values inside a field are plain data
        let lower = [0xFFu8; FIELD_LEN];

        let events = parser.feed_slice(&display_frame(&upper, &lower));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].upper, "AB C");
        assert_eq!(events[0].lower, "");
    }

    #[test]
    fn test_corrupted_signature_then_recovery() {
        let good = display_frame(b"CD            ", b"VOL -20dB     ");

        for i in 0..DEVICE_SIGNATURE.len() {
            let mut parser = FrameParser::new();
            let mut bad = good.clone();
            bad[i] = b'x';

            assert!(parser.feed_slice(&bad).is_empty(), "corrupted byte {} still matched", i);

            let events = parser.feed_slice(&good);
            assert_eq!(events.len(), 1, "failed to resync after corruption at {}", i);
            assert_eq!(events[0].upper, "CD");
        }
    }

    #[test]
    fn test_repeated_first_signature_byte() {
        let mut parser = FrameParser::new();
        let mut data = b"MM".to_vec();
        data.extend_from_slice(&display_frame(b"AUX           ", b"              ")[1..]);

        let events = parser.feed_slice(&data);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].upper, "AUX");
    }

    #[test]
    fn test_ignores_other_metadata_and_noise() {
        let mut parser = FrameParser::new();
        let mut data = Vec::new();
        data.extend_from_slice(DEVICE_SIGNATURE);
        data.extend_from_slice(&[0x03, 0x00, 0x55]); // skipped before 0x32
        data.push(META_TEXT);
        data.extend_from_slice(&[0x10, 0x20]); // skipped before 0xF0
        data.push(MARKER_UPPER);
        data.extend_from_slice(b"PHONO         ");
        data.extend_from_slice(&[0xAA]); // skipped before 0xF1
        data.push(MARKER_LOWER);
        data.extend_from_slice(b"MUTE          ");
        data.extend_from_slice(&[0x00, 0x00]); // skipped before 0xF2
        data.push(MARKER_END);

        let events = parser.feed_slice(&data);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].upper, "PHONO");
        assert_eq!(events[0].lower, "MUTE");
        assert_eq!(events[0].volume(), None);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut parser = FrameParser::new();
        let mut data = display_frame(b"ONE           ", b"VOL -1dB      ");
        data.extend_from_slice(&display_frame(b"TWO           ", b"VOL -2dB      "));

        let events = parser.feed_slice(&data);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].upper, "ONE");
        assert_eq!(events[1].upper, "TWO");
        assert_eq!(events[1].volume(), Some(-2));
    }

    #[test]
    fn test_every_byte_value_in_every_state() {
        // No byte value may panic regardless of the state it arrives in.
        let frame = display_frame(b"ABCDEFGHIJKLMN", b"OPQRSTUVWXYZ01");
        for prefix_len in 0..frame.len() {
            for byte in 0..=255u8 {
                let mut parser = FrameParser::new();
                parser.feed_slice(&frame[..prefix_len]);
                let _ = parser.feed(byte);
            }
        }
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut parser = FrameParser::new();
        let frame = display_frame(b"X             ", b"Y             ");
        parser.feed_slice(&frame[..20]);
        assert_eq!(parser.state(), ParserState::ReadUpper);

        parser.reset();
        assert_eq!(parser.state(), ParserState::WaitSignature);
        assert_eq!(parser.signature_progress(), 0);
        assert!(parser.feed_slice(&frame[20..]).is_empty());
    }
}
