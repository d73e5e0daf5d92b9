use crate::led::LedCommand;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not open")]
    NotOpen,
    #[error("failed to open transport: {0}")]
    Open(#[source] std::io::Error),
    #[error("transport read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("transport write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("short write: {written} of {expected} bytes accepted")]
    ShortWrite { expected: usize, written: usize },
}

#[derive(Debug, Error)]
pub enum FanError {
    #[error("alarm register read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("alarm register value {0:?} is not a byte")]
    Parse(String),
}

/// Byte link to the display (serial line or equivalent).
pub trait Transport: Send {
    fn open(&mut self) -> Result<(), TransportError>;
    fn close(&mut self) -> Result<(), TransportError>;
    /// Reads up to `max` bytes, returning an empty buffer when nothing
    /// arrived within the transport's read timeout.
    fn read(&mut self, max: usize) -> Result<Vec<u8>, TransportError>;
    /// Returns the number of bytes accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;
    fn is_open(&self) -> bool;
}

/// Fan/alarm monitoring chip.
pub trait FanController: Send {
    /// Raw ALARM1 register.
    fn alarm1(&mut self) -> Result<u8, FanError>;
}

/// Turns an abstract LED command into display bytes.
pub trait LedEncoder: Send {
    fn encode(&self, command: LedCommand) -> Vec<u8>;
}

/// Writes `bytes` in full or reports how much the link accepted.
pub fn transmit(link: &mut dyn Transport, bytes: &[u8]) -> Result<(), TransportError> {
    let written = link.write(bytes)?;
    if written != bytes.len() {
        return Err(TransportError::ShortWrite {
            expected: bytes.len(),
            written,
        });
    }
    Ok(())
}
