//! TCP transport to the node.
//!
//! The session driver never blocks on the network for long: reads carry a
//! short timeout so keyboard input and timers stay responsive, and writes
//! are all-or-nothing from the caller's perspective.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;
use tracing::info;

/// How long one socket read may block before the loop services timers and
/// the keyboard again.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Transport errors. Everything here is fatal to the session.
#[derive(Debug, Error)]
pub enum NetError {
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// Read or write failure on the socket.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// One connection to the remote node.
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Resolve `host:port` and connect to the first address that accepts.
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    info!("connected to {}", addr);
                    return Ok(Self { stream });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")
        }))
    }

    #[cfg(test)]
    pub(crate) fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(Self { stream })
    }

    /// Read whatever is available within the timeout.
    ///
    /// `Ok(None)` means the timeout expired with no data (or the read was
    /// interrupted); `Err(NetError::Closed)` means EOF from the peer.
    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<Option<usize>, NetError> {
        match self.stream.read(buf) {
            Ok(0) => Err(NetError::Closed),
            Ok(n) => Ok(Some(n)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write all of `bytes`, retrying interrupted writes.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        self.stream.write_all(bytes)?;
        Ok(())
    }
}
