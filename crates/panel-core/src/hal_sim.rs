use crate::command::{LcdCommand, ESCAPE};
use crate::hal::{FanController, FanError, Transport, TransportError};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
struct Wire {
    open: bool,
    input: VecDeque<u8>,
    written: Vec<u8>,
    failing_reads: u32,
    failing_writes: u32,
    opens: u32,
    closes: u32,
}

/// In-memory display link.
///
/// Clones share the same wire, so a test can keep one clone as a monitor
/// while another is owned by the runtime.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    wire: Arc<Mutex<Wire>>,
    read_delay: Duration,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty reads sleep for `delay`, standing in for a serial read timeout.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn open_for_tests() -> Self {
        let link = Self::new();
        link.wire().open = true;
        link
    }

    fn wire(&self) -> MutexGuard<'_, Wire> {
        self.wire.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues keypad bytes for later reads.
    pub fn push_input(&self, bytes: &[u8]) {
        self.wire().input.extend(bytes.iter().copied());
    }

    pub fn pending_input(&self) -> usize {
        self.wire().input.len()
    }

    pub fn written(&self) -> Vec<u8> {
        self.wire().written.clone()
    }

    /// Drains everything written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.wire().written)
    }

    /// Drains everything written so far, split into commands and text.
    pub fn take_frames(&self) -> Vec<Frame> {
        parse_frames(&self.take_written())
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.wire().failing_reads = count;
    }

    pub fn fail_next_writes(&self, count: u32) {
        self.wire().failing_writes = count;
    }

    pub fn open_count(&self) -> u32 {
        self.wire().opens
    }

    pub fn close_count(&self) -> u32 {
        self.wire().closes
    }
}

impl Transport for SimulatedTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut wire = self.wire();
        wire.open = true;
        wire.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut wire = self.wire();
        wire.open = false;
        wire.closes += 1;
        Ok(())
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>, TransportError> {
        let bytes = {
            let mut wire = self.wire();
            if !wire.open {
                return Err(TransportError::NotOpen);
            }
            if wire.failing_reads > 0 {
                wire.failing_reads -= 1;
                return Err(TransportError::Read(io::Error::other(
                    "simulated read failure",
                )));
            }
            let take = max.min(wire.input.len());
            wire.input.drain(..take).collect::<Vec<u8>>()
        };

        if bytes.is_empty() && !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
        Ok(bytes)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let mut wire = self.wire();
        if !wire.open {
            return Err(TransportError::NotOpen);
        }
        if wire.failing_writes > 0 {
            wire.failing_writes -= 1;
            return Err(TransportError::Write(io::Error::other(
                "simulated write failure",
            )));
        }
        wire.written.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn is_open(&self) -> bool {
        self.wire().open
    }
}

/// One decoded unit of display traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Command(LcdCommand),
    Text(String),
    Unknown(u8),
}

/// Splits raw display traffic back into commands and text runs.
pub fn parse_frames(bytes: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut text = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != ESCAPE {
            text.push(bytes[i]);
            i += 1;
            continue;
        }
        if !text.is_empty() {
            frames.push(Frame::Text(String::from_utf8_lossy(&text).into_owned()));
            text.clear();
        }

        let opcode = bytes.get(i + 1).copied().unwrap_or_default();
        let arg = |n: usize| bytes.get(i + 2 + n).copied().unwrap_or_default();
        let (frame, len) = match opcode {
            0x58 => (Frame::Command(LcdCommand::Clear), 2),
            0x47 => (
                Frame::Command(LcdCommand::SetCursor { x: arg(0), y: arg(1) }),
                4,
            ),
            0x91 => (Frame::Command(LcdCommand::SetContrast(arg(0))), 3),
            0x99 => (Frame::Command(LcdCommand::SetDim(arg(0))), 3),
            0x42 => (
                Frame::Command(LcdCommand::BacklightOn { minutes: arg(0) }),
                3,
            ),
            0x46 => (Frame::Command(LcdCommand::BacklightOff), 2),
            0x53 => (Frame::Command(LcdCommand::HomeAcknowledge), 2),
            0x57 => (Frame::Command(LcdCommand::GpoOn(arg(0))), 3),
            0x56 => (Frame::Command(LcdCommand::GpoOff(arg(0))), 3),
            other => (Frame::Unknown(other), 2),
        };
        frames.push(frame);
        i += len;
    }

    if !text.is_empty() {
        frames.push(Frame::Text(String::from_utf8_lossy(&text).into_owned()));
    }
    frames
}

#[derive(Debug, Default)]
struct FanState {
    alarm: u8,
    failing_reads: u32,
    reads: u64,
}

/// Fan controller whose alarm register is set by the test or demo driver.
#[derive(Debug, Clone, Default)]
pub struct SimulatedFan {
    state: Arc<Mutex<FanState>>,
}

impl SimulatedFan {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_alarm(&self, raw: u8) {
        self.state().alarm = raw;
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.state().failing_reads = count;
    }

    pub fn reads(&self) -> u64 {
        self.state().reads
    }
}

impl FanController for SimulatedFan {
    fn alarm1(&mut self) -> Result<u8, FanError> {
        let mut state = self.state();
        state.reads += 1;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(FanError::Read(io::Error::other("simulated i2c failure")));
        }
        Ok(state.alarm)
    }
}
