//! Protocol constants
//!
//! Byte values and field sizes shared by the display parser and the command
//! encoder.

// ============================================================================
// Display Frames (device → host)
// ============================================================================

/// Signature that opens every display frame.
pub const DEVICE_SIGNATURE: &[u8; 6] = b"MPSEND";
/// Metadata byte announcing a text display frame. Other metadata values are skipped.
pub const META_TEXT: u8 = 0x32;
/// Marker preceding the upper display line.
pub const MARKER_UPPER: u8 = 0xF0;
/// Marker preceding the lower display line.
pub const MARKER_LOWER: u8 = 0xF1;
/// Marker closing a display frame.
pub const MARKER_END: u8 = 0xF2;
/// Width of each display text field in bytes.
pub const FIELD_LEN: usize = 14;

// ============================================================================
// Command Frames (host → device)
// ============================================================================

/// Signature that opens every command frame.
pub const HOST_SIGNATURE: &[u8; 6] = b"PCSEND";
/// Metadata bytes following the command signature.
pub const COMMAND_META: [u8; 2] = [0x02, 0x04];
/// Length of a command payload.
pub const COMMAND_PAYLOAD_LEN: usize = 4;
/// Total length of an encoded command frame.
pub const COMMAND_FRAME_LEN: usize =
    HOST_SIGNATURE.len() + COMMAND_META.len() + COMMAND_PAYLOAD_LEN + 2;

// ============================================================================
// Display Text Conventions
// ============================================================================

/// Marker that introduces a volume reading in the lower display line.
pub const VOLUME_MARKER: &str = "VOL";
/// Unit suffix that may follow a volume reading.
pub const VOLUME_UNIT: &str = "dB";
