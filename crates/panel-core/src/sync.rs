use crate::alarm::Health;
use crate::led::LedBank;
use crate::menu::Menu;
use crate::properties::Backlight;
use serde::Serialize;
use std::sync::mpsc::Sender;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Read-only copy of the worker's state, published after every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    pub timestamp_us: u64,
    pub running: bool,
    pub cursor_x: u8,
    pub cursor_y: u8,
    pub dim: u8,
    pub contrast: u8,
    pub backlight: Backlight,
    pub health: Health,
    pub leds: LedBank,
    pub last_alarm: u8,
    pub idle_count: u32,
    pub at_home: bool,
    pub menu_depth: usize,
    pub cycles_executed: u64,
    pub cycle_errors: u64,
    pub keypresses: u64,
    pub home_resets: u64,
    pub idle_timeouts: u64,
}

/// Mutation requested from outside the worker. Applied at the top of the
/// next cycle, in order.
pub enum PanelCommand {
    SetDim(i32),
    SetContrast(i32),
    SetBacklight(Backlight),
    SetCursor { x: i32, y: i32 },
    WriteText(String),
    Clear,
    ShowMenu(Box<dyn Menu>),
    GoHome,
    /// Restores nominal health flags after an operator acknowledged them.
    ClearHealth,
}

impl std::fmt::Debug for PanelCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetDim(level) => f.debug_tuple("SetDim").field(level).finish(),
            Self::SetContrast(level) => f.debug_tuple("SetContrast").field(level).finish(),
            Self::SetBacklight(state) => f.debug_tuple("SetBacklight").field(state).finish(),
            Self::SetCursor { x, y } => f
                .debug_struct("SetCursor")
                .field("x", x)
                .field("y", y)
                .finish(),
            Self::WriteText(text) => f.debug_tuple("WriteText").field(text).finish(),
            Self::Clear => f.write_str("Clear"),
            Self::ShowMenu(menu) => f.debug_tuple("ShowMenu").field(&menu.name()).finish(),
            Self::GoHome => f.write_str("GoHome"),
            Self::ClearHealth => f.write_str("ClearHealth"),
        }
    }
}

#[derive(Debug, Error)]
#[error("panel worker is gone; command dropped")]
pub struct Disconnected;

#[derive(Debug, Default)]
pub struct StateExchange {
    snapshot: RwLock<PanelSnapshot>,
}

impl StateExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the worker after every cycle.
    pub fn publish(&self, snapshot: PanelSnapshot) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn read(&self) -> PanelSnapshot {
        *self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable access to a running panel from other threads.
#[derive(Debug, Clone)]
pub struct PanelHandle {
    commands: Sender<PanelCommand>,
    exchange: Arc<StateExchange>,
}

impl PanelHandle {
    pub(crate) fn new(commands: Sender<PanelCommand>, exchange: Arc<StateExchange>) -> Self {
        Self { commands, exchange }
    }

    pub fn send(&self, command: PanelCommand) -> Result<(), Disconnected> {
        self.commands.send(command).map_err(|_| Disconnected)
    }

    pub fn set_dim(&self, level: i32) -> Result<(), Disconnected> {
        self.send(PanelCommand::SetDim(level))
    }

    pub fn set_contrast(&self, level: i32) -> Result<(), Disconnected> {
        self.send(PanelCommand::SetContrast(level))
    }

    pub fn set_backlight(&self, state: Backlight) -> Result<(), Disconnected> {
        self.send(PanelCommand::SetBacklight(state))
    }

    pub fn show_menu(&self, menu: Box<dyn Menu>) -> Result<(), Disconnected> {
        self.send(PanelCommand::ShowMenu(menu))
    }

    pub fn clear_health(&self) -> Result<(), Disconnected> {
        self.send(PanelCommand::ClearHealth)
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.exchange.read()
    }

    pub fn exchange(&self) -> Arc<StateExchange> {
        Arc::clone(&self.exchange)
    }
}
