//! Volume extraction from the lower display line.
//!
//! The receiver shows its master volume as text such as `VOL -43dB`. Extraction
//! is best-effort: the first `VOL` marker is located, spaces are skipped, an
//! optional minus sign is taken, and at least one digit must follow.

use crate::constants::{VOLUME_MARKER, VOLUME_UNIT};

/// A parsed volume reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeReading {
    /// Volume in decibels.
    pub db: i32,
    /// Whether the `dB` unit suffix followed the digits.
    pub unit_confirmed: bool,
}

/// Parse a volume reading, reporting whether the unit suffix was present.
///
/// The magnitude saturates at the `i32` range.
pub fn parse_volume_reading(text: &str) -> Option<VolumeReading> {
    let start = text.find(VOLUME_MARKER)? + VOLUME_MARKER.len();
    let rest = text[start..].trim_start_matches(' ');

    let (negative, rest) = match rest.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }

    let magnitude = rest.as_bytes()[..digits_len]
        .iter()
        .fold(0i32, |acc, &d| {
            acc.saturating_mul(10).saturating_add(i32::from(d - b'0'))
        });

    Some(VolumeReading {
        db: if negative { -magnitude } else { magnitude },
        unit_confirmed: rest[digits_len..].starts_with(VOLUME_UNIT),
    })
}

/// Parse the volume in dB from a display line such as `VOL -43dB`.
///
/// Returns `None` when the line is not a volume reading. The unit suffix is
/// accepted but not required.
pub fn parse_volume(text: &str) -> Option<i32> {
    parse_volume_reading(text).map(|reading| reading.db)
}
