//! Serial port device backed by the `serialport` crate.

use crate::error::Result;
use crate::transport::{is_transient, SerialDevice};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Largest chunk pulled from the port in one read call.
const READ_CHUNK: usize = 256;

/// Serial port wrapper presenting a non-blocking byte interface.
///
/// Bytes are read from the OS in chunks and handed out one at a time.
pub struct SerialPortDevice {
    port: Box<dyn SerialPort>,
    pending: VecDeque<u8>,
}

impl SerialPortDevice {
    /// Open a serial port at the given baud rate (8N1, no flow control).
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open()?;

        tracing::info!(path, baud_rate, "opened serial port");

        Ok(SerialPortDevice {
            port,
            pending: VecDeque::with_capacity(READ_CHUNK),
        })
    }

    fn fill(&mut self) -> io::Result<()> {
        let waiting = self.port.bytes_to_read()? as usize;
        if waiting == 0 {
            return Ok(());
        }
        let mut chunk = [0u8; READ_CHUNK];
        let want = waiting.min(READ_CHUNK);
        match self.port.read(&mut chunk[..want]) {
            Ok(n) => {
                self.pending.extend(&chunk[..n]);
                Ok(())
            }
            Err(e) if is_transient(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl SerialDevice for SerialPortDevice {
    fn available(&mut self) -> io::Result<usize> {
        let waiting = self.port.bytes_to_read()? as usize;
        Ok(self.pending.len() + waiting)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pending.is_empty() {
            self.fill()?;
        }
        Ok(self.pending.pop_front())
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }
}
