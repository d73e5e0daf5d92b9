use crate::alarm::Health;
use crate::command::LcdCommand;
use crate::hal::LedEncoder;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedState {
    #[default]
    Off,
    Green,
    Red,
}

/// The three front-panel indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedId {
    Status,
    Alarm,
    Fault,
}

impl LedId {
    pub const ALL: [LedId; 3] = [LedId::Status, LedId::Alarm, LedId::Fault];

    /// 1-based position on the panel.
    pub fn number(self) -> u8 {
        match self {
            LedId::Status => 1,
            LedId::Alarm => 2,
            LedId::Fault => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedCommand {
    pub led: LedId,
    pub state: LedState,
}

impl LedCommand {
    pub fn new(led: LedId, state: LedState) -> Self {
        Self { led, state }
    }
}

/// Last state commanded for each LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LedBank {
    pub status: LedState,
    pub alarm: LedState,
    pub fault: LedState,
}

impl LedBank {
    pub fn apply(&mut self, command: LedCommand) {
        match command.led {
            LedId::Status => self.status = command.state,
            LedId::Alarm => self.alarm = command.state,
            LedId::Fault => self.fault = command.state,
        }
    }

    pub fn as_array(&self) -> [LedState; 3] {
        [self.status, self.alarm, self.fault]
    }
}

pub struct LedPresenter;

impl LedPresenter {
    /// LED commands for the current health flags.
    ///
    /// Nominal status always drives all three LEDs. Degraded status drives
    /// the status LED red and only touches the alarm and fault LEDs whose
    /// flag is lowered.
    pub fn refresh(health: &Health) -> Vec<LedCommand> {
        if health.status {
            return vec![
                LedCommand::new(LedId::Status, LedState::Green),
                LedCommand::new(LedId::Alarm, LedState::Off),
                LedCommand::new(LedId::Fault, LedState::Off),
            ];
        }

        let mut commands = vec![LedCommand::new(LedId::Status, LedState::Red)];
        if !health.alarm {
            commands.push(LedCommand::new(LedId::Alarm, LedState::Red));
        }
        if !health.fault {
            commands.push(LedCommand::new(LedId::Fault, LedState::Red));
        }
        commands
    }

    /// Power-on pattern sent when the runtime starts.
    pub fn start_state() -> Vec<LedCommand> {
        Self::refresh(&Health::NOMINAL)
    }
}

/// Bi-colour LEDs wired to general purpose outputs: LED `n` uses GPO
/// `2n - 1` for green and GPO `2n` for red.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpoLedEncoder;

impl GpoLedEncoder {
    fn pins(led: LedId) -> (u8, u8) {
        let n = led.number();
        (2 * n - 1, 2 * n)
    }
}

impl LedEncoder for GpoLedEncoder {
    fn encode(&self, command: LedCommand) -> Vec<u8> {
        let (green, red) = Self::pins(command.led);
        let (green_cmd, red_cmd) = match command.state {
            LedState::Green => (LcdCommand::GpoOn(green), LcdCommand::GpoOff(red)),
            LedState::Red => (LcdCommand::GpoOff(green), LcdCommand::GpoOn(red)),
            LedState::Off => (LcdCommand::GpoOff(green), LcdCommand::GpoOff(red)),
        };
        let mut bytes = green_cmd.encode();
        bytes.extend(red_cmd.encode());
        bytes
    }
}
