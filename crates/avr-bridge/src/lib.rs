//! Serial-to-TCP bridge for an AV receiver front panel.
//!
//! The receiver streams `MPSEND` display frames over its serial port. The
//! bridge decodes them into sensor values and mirrors the raw byte stream to
//! any number of TCP clients. Clients can also send four-byte button codes,
//! which are wrapped in `PCSEND` frames and written back to the device.
//!
//! ```no_run
//! use avr_bridge::{Bridge, BridgeConfig, LogSink, SerialPortDevice, TcpClientListener};
//!
//! # fn main() -> avr_bridge::Result<()> {
//! let config = BridgeConfig::default();
//! let device = SerialPortDevice::open(&config.serial.path, config.serial.baud_rate)?;
//! let listener = TcpClientListener::bind(config.listen_addr())?;
//! let mut bridge = Bridge::new(device, listener, LogSink, config.options())?;
//! loop {
//!     bridge.tick()?;
//!     std::thread::sleep(config.tick_interval());
//! }
//! # }
//! ```

pub mod bridge;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ring_buffer;
pub mod serial;
pub mod sink;
pub mod transport;

pub use bridge::{Bridge, BridgeOptions, TickReport, SENSOR_LOWER, SENSOR_UPPER, SENSOR_VOLUME};
pub use client::{Client, ClientRegistry, FanOutStats};
pub use command::{CommandChannel, CommandScratch, CommandStats, ScratchOutcome, ScratchScope};
pub use config::{BridgeConfig, ListenConfig, SerialConfig};
pub use error::{BridgeError, Result};
pub use ring_buffer::{Position, RingBuffer};
pub use serial::SerialPortDevice;
pub use sink::{FanSink, JsonLinesSink, LogSink, Publication, PublishedValue, StateSink};
pub use transport::{ClientListener, ClientStream, SerialDevice, TcpClientListener};
