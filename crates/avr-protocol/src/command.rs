//! Command frame encoding/decoding.
//!
//! Commands sent to the device are fixed 14-byte frames:
//!
//! ```text
//! +----------+------+------+------------+--------+--------+
//! | "PCSEND" | 0x02 | 0x04 | payload[4] | chk_hi | chk_lo |
//! +----------+------+------+------------+--------+--------+
//! ```
//!
//! The checksum is the XOR of the two payload halves, each read as a big-endian
//! `u16`.

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};

/// A 4-byte remote command ready to be framed for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    payload: [u8; COMMAND_PAYLOAD_LEN],
}

impl CommandFrame {
    /// Create a command from its payload bytes.
    pub const fn new(payload: [u8; COMMAND_PAYLOAD_LEN]) -> Self {
        CommandFrame { payload }
    }

    /// Create a command from a slice that must be exactly four bytes long.
    pub fn from_slice(data: &[u8]) -> ProtocolResult<Self> {
        let payload: [u8; COMMAND_PAYLOAD_LEN] =
            data.try_into().map_err(|_| ProtocolError::WrongPayloadLength {
                expected: COMMAND_PAYLOAD_LEN,
                actual: data.len(),
            })?;
        Ok(CommandFrame { payload })
    }

    /// The payload bytes.
    pub fn payload(&self) -> [u8; COMMAND_PAYLOAD_LEN] {
        self.payload
    }

    /// XOR of the payload halves as big-endian words.
    pub fn checksum(&self) -> u16 {
        let [a, b, c, d] = self.payload;
        u16::from_be_bytes([a, b]) ^ u16::from_be_bytes([c, d])
    }

    /// Encode the full frame for transmission.
    pub fn encode(&self) -> [u8; COMMAND_FRAME_LEN] {
        let mut frame = [0u8; COMMAND_FRAME_LEN];
        frame[..6].copy_from_slice(HOST_SIGNATURE);
        frame[6..8].copy_from_slice(&COMMAND_META);
        frame[8..12].copy_from_slice(&self.payload);
        frame[12..].copy_from_slice(&self.checksum().to_be_bytes());
        frame
    }

    /// Decode and verify an encoded frame.
    pub fn decode(data: &[u8]) -> ProtocolResult<Self> {
        if data.len() != COMMAND_FRAME_LEN {
            return Err(ProtocolError::FrameLength {
                expected: COMMAND_FRAME_LEN,
                actual: data.len(),
            });
        }
        if &data[..6] != HOST_SIGNATURE {
            return Err(ProtocolError::BadSignature);
        }
        if data[6..8] != COMMAND_META {
            return Err(ProtocolError::BadMetadata(data[6], data[7]));
        }

        let command = CommandFrame::from_slice(&data[8..12])?;
        let actual = u16::from_be_bytes([data[12], data[13]]);
        let expected = command.checksum();
        if actual != expected {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        Ok(command)
    }
}

impl From<[u8; COMMAND_PAYLOAD_LEN]> for CommandFrame {
    fn from(payload: [u8; COMMAND_PAYLOAD_LEN]) -> Self {
        CommandFrame::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = CommandFrame::new([0x01, 0x02, 0x03, 0x04]).encode();

        assert_eq!(frame.len(), 14);
        assert_eq!(&frame[..6], b"PCSEND");
        assert_eq!(&frame[6..8], &[0x02, 0x04]);
        assert_eq!(&frame[8..12], &[0x01, 0x02, 0x03, 0x04]);
        // 0x0102 ^ 0x0304 = 0x0206
        assert_eq!(&frame[12..], &[0x02, 0x06]);
    }

    #[test]
    fn test_checksum_known_command() {
        // High bits set in both halves
        let command = CommandFrame::new([0x80, 0x70, 0xC0, 0x3F]);
        assert_eq!(command.checksum(), 0x8070 ^ 0xC03F);
        assert_eq!(command.checksum(), 0x404F);
    }

    #[test]
    fn test_from_slice_length() {
        assert!(CommandFrame::from_slice(&[1, 2, 3, 4]).is_ok());
        assert_eq!(
            CommandFrame::from_slice(&[1, 2, 3]),
            Err(ProtocolError::WrongPayloadLength { expected: 4, actual: 3 })
        );
        assert!(CommandFrame::from_slice(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_decode_encoded() {
        let command = CommandFrame::new([0xDE, 0xAD, 0xBE, 0xEF]);
        let decoded = CommandFrame::decode(&command.encode()).expect("should decode frame");
        assert_eq!(decoded, command);
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let frame = CommandFrame::new([0x01, 0x02, 0x03, 0x04]).encode();

        assert!(matches!(
            CommandFrame::decode(&frame[..13]),
            Err(ProtocolError::FrameLength { expected: 14, actual: 13 })
        ));

        let mut bad = frame;
        bad[0] = b'M';
        assert_eq!(CommandFrame::decode(&bad), Err(ProtocolError::BadSignature));

        let mut bad = frame;
        bad[7] = 0x05;
        assert_eq!(CommandFrame::decode(&bad), Err(ProtocolError::BadMetadata(0x02, 0x05)));

        let mut bad = frame;
        bad[13] ^= 0xFF;
        assert!(matches!(
            CommandFrame::decode(&bad),
            Err(ProtocolError::ChecksumMismatch { expected: 0x0206, .. })
        ));
    }
}
