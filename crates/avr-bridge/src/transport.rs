//! Transport abstractions for the serial device and TCP clients.
//!
//! The bridge is driven by a single non-blocking tick, so every operation here
//! must return promptly. A read or write that would block is reported through
//! [`is_transient`] and treated as "nothing this tick".

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

/// Non-blocking byte source/sink for the serial device.
pub trait SerialDevice {
    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> io::Result<usize>;

    /// Read one byte, or `None` if nothing is available right now.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Write a complete buffer and flush it to the device.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;
}

impl<T: SerialDevice + ?Sized> SerialDevice for Box<T> {
    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_bytes(data)
    }
}

/// A connected client stream. Reads and writes must not block.
pub trait ClientStream: Read + Write {
    /// Close both directions of the connection.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl ClientStream for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Source of new client connections.
pub trait ClientListener {
    /// Stream type produced for each connection.
    type Stream: ClientStream;

    /// Accept one pending connection, returning the stream and a display
    /// identifier for the peer. `Ok(None)` means nobody is waiting.
    fn accept(&mut self) -> io::Result<Option<(Self::Stream, String)>>;
}

/// True for errors that only mean "try again next tick".
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

/// Non-blocking TCP listener for mirror clients.
#[derive(Debug)]
pub struct TcpClientListener {
    listener: TcpListener,
}

impl TcpClientListener {
    /// Bind and switch the socket to non-blocking mode.
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(TcpClientListener { listener })
    }

    /// Address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl ClientListener for TcpClientListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> io::Result<Option<(TcpStream, String)>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                stream.set_nodelay(true)?;
                Ok(Some((stream, peer.ip().to_string())))
            }
            Err(e) if is_transient(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }

    #[test]
    fn test_listener_accept_nonblocking() {
        let mut listener = TcpClientListener::bind("127.0.0.1:0").expect("bind should succeed");
        assert!(listener.accept().expect("accept should not fail").is_none());

        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).expect("connect should succeed");

        // The connection may take a moment to show up in the accept queue.
        let mut accepted = None;
        for _ in 0..100 {
            if let Some(conn) = listener.accept().unwrap() {
                accepted = Some(conn);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let (_stream, identifier) = accepted.expect("connection should be accepted");
        assert_eq!(identifier, "127.0.0.1");
    }
}
