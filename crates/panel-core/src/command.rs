//! Byte encoding for the character display's command set.
//!
//! Every command is introduced by [`ESCAPE`]; text is sent as raw bytes with
//! no prefix.

/// Command prefix byte.
pub const ESCAPE: u8 = 0xFE;

/// Keypress byte that forces the home menu.
pub const HOME_KEY: u8 = b'G';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdCommand {
    Clear,
    SetCursor { x: u8, y: u8 },
    SetContrast(u8),
    SetDim(u8),
    /// Backlight on; `minutes = 0` keeps it on indefinitely.
    BacklightOn { minutes: u8 },
    BacklightOff,
    HomeAcknowledge,
    GpoOn(u8),
    GpoOff(u8),
}

impl LcdCommand {
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Self::Clear => vec![ESCAPE, 0x58],
            Self::SetCursor { x, y } => vec![ESCAPE, 0x47, x, y],
            Self::SetContrast(level) => vec![ESCAPE, 0x91, level],
            Self::SetDim(level) => vec![ESCAPE, 0x99, level],
            Self::BacklightOn { minutes } => vec![ESCAPE, 0x42, minutes],
            Self::BacklightOff => vec![ESCAPE, 0x46],
            Self::HomeAcknowledge => vec![ESCAPE, 0x53],
            Self::GpoOn(gpo) => vec![ESCAPE, 0x57, gpo],
            Self::GpoOff(gpo) => vec![ESCAPE, 0x56, gpo],
        }
    }
}
