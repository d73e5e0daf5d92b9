use crate::command::LcdCommand;
use crate::hal::{transmit, Transport, TransportError};

pub const COLUMNS: u8 = 20;
pub const ROWS: u8 = 4;

fn clamp_to(value: i32, max: u8) -> u8 {
    value.clamp(1, i32::from(max)) as u8
}

/// Text cursor position, 1-based.
///
/// Setters clamp, transmit a cursor move, then store; the stored position
/// therefore always matches the last position sent to the display, except
/// after [`home_line`](Self::home_line) / [`new_line`](Self::new_line),
/// which only move the stored position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorModel {
    x: u8,
    y: u8,
}

impl Default for CursorModel {
    fn default() -> Self {
        Self { x: 1, y: 1 }
    }
}

impl CursorModel {
    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn set_x(&mut self, x: i32, link: &mut dyn Transport) -> Result<(), TransportError> {
        let x = clamp_to(x, COLUMNS);
        transmit(link, &LcdCommand::SetCursor { x, y: self.y }.encode())?;
        self.x = x;
        Ok(())
    }

    pub fn set_y(&mut self, y: i32, link: &mut dyn Transport) -> Result<(), TransportError> {
        let y = clamp_to(y, ROWS);
        transmit(link, &LcdCommand::SetCursor { x: self.x, y }.encode())?;
        self.y = y;
        Ok(())
    }

    /// Moves to `(x, y)` with a single cursor command.
    pub fn set_position(
        &mut self,
        x: i32,
        y: i32,
        link: &mut dyn Transport,
    ) -> Result<(), TransportError> {
        let x = clamp_to(x, COLUMNS);
        let y = clamp_to(y, ROWS);
        transmit(link, &LcdCommand::SetCursor { x, y }.encode())?;
        self.x = x;
        self.y = y;
        Ok(())
    }

    /// Writes `text` at the cursor.
    ///
    /// Text that would run past the last column moves to the next line
    /// before anything is sent; a write ending exactly on the last column
    /// stays put. Text is never split, so a single write longer than the
    /// remaining width still overruns the row on the glass. Afterwards x
    /// advances by the text length, clamped to the last column.
    pub fn write_text(&mut self, text: &str, link: &mut dyn Transport) -> Result<(), TransportError> {
        if text.is_empty() {
            return Ok(());
        }
        let len = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);

        if i32::from(self.x).saturating_add(len) - 1 > i32::from(COLUMNS) {
            self.set_y(i32::from(self.y) + 1, link)?;
            self.set_x(1, link)?;
        }
        transmit(link, text.as_bytes())?;
        self.set_x(i32::from(self.x).saturating_add(len), link)
    }

    /// Clears the display. The display homes its own cursor, so no move is sent.
    pub fn clear(&mut self, link: &mut dyn Transport) -> Result<(), TransportError> {
        transmit(link, &LcdCommand::Clear.encode())?;
        self.x = 1;
        self.y = 1;
        Ok(())
    }

    pub fn home_line(&mut self) {
        self.x = 1;
        self.y = 1;
    }

    pub fn new_line(&mut self) {
        self.y = (self.y + 1).min(ROWS);
        self.x = 1;
    }
}
