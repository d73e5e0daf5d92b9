//! Serial link carried over TCP (ser2net, socat, terminal servers).

use panel_core::{Transport, TransportError};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct TcpSerialTransport {
    addr: String,
    read_timeout: Duration,
    write_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpSerialTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            stream: None,
        }
    }

    /// Zero is treated as one millisecond; a socket without a read timeout
    /// would block the poll loop indefinitely.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// Bounds how long a write may wait on a peer that stopped draining.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, Duration::from_secs(2)) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        }))
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotOpen)
    }

    /// Forgets a dead connection so the next `open` reconnects.
    fn drop_stream(&mut self, cause: &io::Error) {
        if self.stream.take().is_some() {
            warn!(addr = %self.addr, error = %cause, "serial link lost");
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

impl Transport for TcpSerialTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = self.connect().map_err(TransportError::Open)?;
        info!(addr = %self.addr, "serial link connected");
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                // Peer may already be gone.
                debug!(addr = %self.addr, error = %e, "serial link shutdown");
            }
            info!(addr = %self.addr, "serial link closed");
        }
        Ok(())
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream()?;
        let mut buf = vec![0u8; max];
        let err = match stream.read(&mut buf) {
            Ok(0) if max > 0 => io::Error::from(io::ErrorKind::UnexpectedEof),
            Ok(n) => {
                buf.truncate(n);
                return Ok(buf);
            }
            Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => {
                return Ok(Vec::new());
            }
            Err(e) => e,
        };
        self.drop_stream(&err);
        Err(TransportError::Read(err))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let stream = self.stream()?;
        let result = stream.write_all(bytes).and_then(|()| stream.flush());
        match result {
            Ok(()) => Ok(bytes.len()),
            Err(e) => {
                // A timed-out write may have sent part of a command; the
                // display's framing is unknown from here on.
                self.drop_stream(&e);
                Err(TransportError::Write(e))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpSerialTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
