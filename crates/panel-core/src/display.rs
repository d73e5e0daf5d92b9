use crate::alarm::Health;
use crate::command::LcdCommand;
use crate::cursor::CursorModel;
use crate::hal::{transmit, Transport, TransportError};
use crate::led::LedBank;
use crate::properties::{Backlight, BacklightMode, DisplayProperties};

/// Everything the worker knows about the glass and the LEDs.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub cursor: CursorModel,
    pub properties: DisplayProperties,
    pub health: Health,
    pub leds: LedBank,
}

impl DisplayState {
    pub fn new(mode: BacklightMode) -> Self {
        Self {
            properties: DisplayProperties::new(mode),
            ..Self::default()
        }
    }
}

/// Borrowed view handed to menus: display state plus the link it is
/// mirrored on. All output a menu produces goes through here.
pub struct Panel<'a> {
    link: &'a mut dyn Transport,
    state: &'a mut DisplayState,
}

impl<'a> Panel<'a> {
    pub fn new(link: &'a mut dyn Transport, state: &'a mut DisplayState) -> Self {
        Self { link, state }
    }

    pub fn state(&self) -> &DisplayState {
        self.state
    }

    pub fn health(&self) -> Health {
        self.state.health
    }

    pub fn cursor(&self) -> &CursorModel {
        &self.state.cursor
    }

    pub fn properties(&self) -> &DisplayProperties {
        &self.state.properties
    }

    pub fn send(&mut self, command: LcdCommand) -> Result<(), TransportError> {
        transmit(self.link, &command.encode())
    }

    pub fn clear(&mut self) -> Result<(), TransportError> {
        self.state.cursor.clear(self.link)
    }

    pub fn write_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.state.cursor.write_text(text, self.link)
    }

    pub fn set_x(&mut self, x: i32) -> Result<(), TransportError> {
        self.state.cursor.set_x(x, self.link)
    }

    pub fn set_y(&mut self, y: i32) -> Result<(), TransportError> {
        self.state.cursor.set_y(y, self.link)
    }

    pub fn set_position(&mut self, x: i32, y: i32) -> Result<(), TransportError> {
        self.state.cursor.set_position(x, y, self.link)
    }

    pub fn home_line(&mut self) {
        self.state.cursor.home_line();
    }

    pub fn new_line(&mut self) {
        self.state.cursor.new_line();
    }

    pub fn set_dim(&mut self, level: i32) -> Result<(), TransportError> {
        self.state.properties.set_dim(level, self.link)
    }

    pub fn set_contrast(&mut self, level: i32) -> Result<(), TransportError> {
        self.state.properties.set_contrast(level, self.link)
    }

    pub fn set_backlight(&mut self, requested: Backlight) -> Result<(), TransportError> {
        self.state.properties.set_backlight(requested, self.link)
    }
}
