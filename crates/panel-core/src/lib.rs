pub mod alarm;
pub mod command;
pub mod control_loop;
pub mod cursor;
pub mod display;
pub mod error;
pub mod hal;
#[cfg(feature = "simulation")]
pub mod hal_sim;
pub mod idle;
pub mod led;
pub mod menu;
pub mod properties;
pub mod runtime;
pub mod sync;
pub mod tags;
pub mod timebase;

pub use alarm::{AlarmSeverity, Health, HealthDelta, HealthPolicy};
pub use command::{LcdCommand, HOME_KEY};
pub use control_loop::{CycleReport, CycleStats, PanelConfig, PanelWorker};
pub use cursor::CursorModel;
pub use display::{DisplayState, Panel};
pub use error::PanelError;
pub use hal::{FanController, FanError, LedEncoder, Transport, TransportError};
#[cfg(feature = "simulation")]
pub use hal_sim::{SimulatedFan, SimulatedTransport};
pub use idle::{IdleTimer, IDLE_TIMEOUT_CYCLES};
pub use led::{GpoLedEncoder, LedBank, LedCommand, LedId, LedPresenter, LedState};
pub use menu::{HomeMenu, Menu, MenuStateMachine, MenuTransition};
pub use properties::{Backlight, BacklightMode, DisplayProperties};
pub use runtime::{DisplayRuntime, RuntimeBuilder};
pub use sync::{Disconnected, PanelCommand, PanelHandle, PanelSnapshot, StateExchange};
pub use timebase::TimeBase;
