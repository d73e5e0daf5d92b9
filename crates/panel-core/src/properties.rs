use crate::command::LcdCommand;
use crate::hal::{transmit, Transport, TransportError};
use serde::Serialize;

pub const DEFAULT_DIM: u8 = 200;
pub const DEFAULT_CONTRAST: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backlight {
    #[default]
    On,
    Off,
}

/// How [`DisplayProperties::set_backlight`] chooses the command to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BacklightMode {
    /// Sends the opposite of the stored state and stores the requested
    /// value. Two identical requests in a row leave the stored value out of
    /// step with the glass.
    #[default]
    Toggle,
    /// Sends the command matching the requested state.
    Direct,
}

fn clamp_level(level: i32) -> u8 {
    level.clamp(0, 255) as u8
}

/// Write-through display settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayProperties {
    dim: u8,
    contrast: u8,
    backlight: Backlight,
    mode: BacklightMode,
}

impl Default for DisplayProperties {
    fn default() -> Self {
        Self::new(BacklightMode::default())
    }
}

impl DisplayProperties {
    pub fn new(mode: BacklightMode) -> Self {
        Self {
            dim: DEFAULT_DIM,
            contrast: DEFAULT_CONTRAST,
            backlight: Backlight::On,
            mode,
        }
    }

    pub fn dim(&self) -> u8 {
        self.dim
    }

    pub fn contrast(&self) -> u8 {
        self.contrast
    }

    pub fn backlight(&self) -> Backlight {
        self.backlight
    }

    pub fn backlight_mode(&self) -> BacklightMode {
        self.mode
    }

    /// Always transmits, even when the level is unchanged.
    pub fn set_dim(&mut self, level: i32, link: &mut dyn Transport) -> Result<(), TransportError> {
        let level = clamp_level(level);
        transmit(link, &LcdCommand::SetDim(level).encode())?;
        self.dim = level;
        Ok(())
    }

    /// Always transmits, even when the level is unchanged.
    pub fn set_contrast(
        &mut self,
        level: i32,
        link: &mut dyn Transport,
    ) -> Result<(), TransportError> {
        let level = clamp_level(level);
        transmit(link, &LcdCommand::SetContrast(level).encode())?;
        self.contrast = level;
        Ok(())
    }

    pub fn set_backlight(
        &mut self,
        requested: Backlight,
        link: &mut dyn Transport,
    ) -> Result<(), TransportError> {
        let turn_on = match self.mode {
            BacklightMode::Toggle => self.backlight != Backlight::On,
            BacklightMode::Direct => requested == Backlight::On,
        };
        let command = if turn_on {
            LcdCommand::BacklightOn { minutes: 0 }
        } else {
            LcdCommand::BacklightOff
        };
        transmit(link, &command.encode())?;
        self.backlight = requested;
        Ok(())
    }
}
