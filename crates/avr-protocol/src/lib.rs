//! AVR Front-Panel Serial Protocol
//!
//! This crate provides types and utilities for the framed text protocol spoken
//! by the receiver's RS-232 port. The device streams its front-panel display as
//! `MPSEND` frames and accepts remote-control style commands as `PCSEND` frames.
//!
//! # Protocol Overview
//!
//! - **Display frames** (device → host): `MPSEND`, one metadata byte, then two
//!   fixed 14-byte text fields each introduced by a marker byte, and an end marker.
//! - **Command frames** (host → device): `PCSEND`, two metadata bytes, a 4-byte
//!   payload and a 2-byte XOR checksum.
//!
//! The display parser is strictly single-pass: it consumes one byte at a time and
//! never buffers a whole frame.
//!
//! # Example
//!
//! ```rust,ignore
//! use avr_protocol::{CommandFrame, FrameParser};
//!
//! let mut parser = FrameParser::new();
//! for &byte in received {
//!     if let Some(event) = parser.feed(byte) {
//!         println!("{} / {} ({:?} dB)", event.upper, event.lower, event.volume());
//!     }
//! }
//!
//! let frame = CommandFrame::new([0x01, 0x02, 0x03, 0x04]).encode();
//! ```

mod command;
mod constants;
mod error;
mod frame;
mod volume;

pub use command::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use volume::*;
