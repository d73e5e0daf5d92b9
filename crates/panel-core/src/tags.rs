//! Metric names and help text for the panel's counters and gauges.

#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub metric: &'static str,
    pub help: &'static str,
}

pub const CYCLES_EXECUTED: Tag = Tag {
    metric: "front_panel_cycles_executed_total",
    help: "Poll cycles executed",
};

pub const CYCLE_ERRORS: Tag = Tag {
    metric: "front_panel_cycle_errors_total",
    help: "Poll cycles that ended early on a step failure",
};

pub const KEYPRESSES: Tag = Tag {
    metric: "front_panel_keypresses_total",
    help: "Keypad bytes dispatched to menus",
};

pub const HOME_RESETS: Tag = Tag {
    metric: "front_panel_home_resets_total",
    help: "Forced returns to the home menu from the home key",
};

pub const IDLE_TIMEOUTS: Tag = Tag {
    metric: "front_panel_idle_timeouts_total",
    help: "Returns to the home menu after the idle threshold",
};

pub const IDLE_CYCLES: Tag = Tag {
    metric: "front_panel_idle_cycles",
    help: "Consecutive poll cycles without input",
};

pub const HEALTH_FLAG: Tag = Tag {
    metric: "front_panel_health_flag",
    help: "Health flag by name (1 = nominal)",
};

pub const LED_STATE: Tag = Tag {
    metric: "front_panel_led_state",
    help: "LED state by led (0 = off, 1 = green, 2 = red)",
};

pub const ALARM_REGISTER: Tag = Tag {
    metric: "front_panel_alarm_register",
    help: "Last raw ALARM1 register value",
};
