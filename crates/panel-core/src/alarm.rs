use serde::Serialize;

/// Derived device health. `true` means nominal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: bool,
    pub alarm: bool,
    pub fault: bool,
}

impl Default for Health {
    fn default() -> Self {
        Self::NOMINAL
    }
}

impl Health {
    pub const NOMINAL: Health = Health {
        status: true,
        alarm: true,
        fault: true,
    };

    /// Lowers every flag the delta names. Flags are never raised here.
    pub fn apply(&mut self, delta: HealthDelta) {
        if delta.status == Some(false) {
            self.status = false;
        }
        if delta.alarm == Some(false) {
            self.alarm = false;
        }
        if delta.fault == Some(false) {
            self.fault = false;
        }
    }

    pub fn is_nominal(&self) -> bool {
        *self == Self::NOMINAL
    }
}

/// Flags a decoded alarm register wants cleared. `None` leaves a flag alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthDelta {
    pub status: Option<bool>,
    pub alarm: Option<bool>,
    pub fault: Option<bool>,
}

impl HealthDelta {
    pub const NONE: HealthDelta = HealthDelta {
        status: None,
        alarm: None,
        fault: None,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    pub fn severity(&self) -> AlarmSeverity {
        if self.fault == Some(false) {
            AlarmSeverity::Critical
        } else if self.alarm == Some(false) {
            AlarmSeverity::Warning
        } else {
            AlarmSeverity::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmSeverity {
    None,
    Warning,
    Critical,
}

/// How health flags react to the alarm register over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthPolicy {
    /// Flags stay lowered until explicitly cleared.
    #[default]
    Latching,
    /// Flags are reset to nominal before each decode and track the register.
    FollowAlarm,
}

const CRITICAL_MASK: u8 = 0b1100_0000;
const WARNING_MASK: u8 = 0b0011_1110;

/// Decodes an ALARM1 register byte.
///
/// Bit 7 is the MSB. Bits 7 and 6 are critical conditions and clear
/// `status` and `fault`; bits 5 through 1 are warnings and clear `status`
/// and `alarm`. Bit 0 is unused. A critical bit masks any warning bits.
pub fn decode(raw: u8) -> HealthDelta {
    if raw & CRITICAL_MASK != 0 {
        HealthDelta {
            status: Some(false),
            fault: Some(false),
            ..HealthDelta::NONE
        }
    } else if raw & WARNING_MASK != 0 {
        HealthDelta {
            status: Some(false),
            alarm: Some(false),
            ..HealthDelta::NONE
        }
    } else {
        HealthDelta::NONE
    }
}
