use crate::alarm::{self, Health, HealthPolicy};
use crate::command::HOME_KEY;
use crate::display::{DisplayState, Panel};
use crate::error::PanelError;
use crate::hal::{transmit, FanController, LedEncoder, Transport, TransportError};
use crate::idle::{IdleTimer, IDLE_TIMEOUT_CYCLES};
use crate::led::{GpoLedEncoder, LedBank, LedCommand, LedPresenter};
use crate::menu::{HomeMenu, Menu, MenuStateMachine};
use crate::properties::{BacklightMode, DEFAULT_CONTRAST, DEFAULT_DIM};
use crate::sync::{PanelCommand, PanelHandle, PanelSnapshot, StateExchange};
use crate::timebase::TimeBase;
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Bytes requested from the link per cycle: one keypress.
const KEY_READ_LEN: usize = 1;

/// Pause after a failed cycle that leaves the link closed.
pub const RECONNECT_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Clone, Debug)]
pub struct PanelConfig {
    pub idle_timeout_cycles: u32,
    pub backlight_mode: BacklightMode,
    pub health_policy: HealthPolicy,
    /// Levels written when the runtime starts.
    pub dim: u8,
    pub contrast: u8,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            idle_timeout_cycles: IDLE_TIMEOUT_CYCLES,
            backlight_mode: BacklightMode::Toggle,
            health_policy: HealthPolicy::Latching,
            dim: DEFAULT_DIM,
            contrast: DEFAULT_CONTRAST,
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct CycleStats {
    pub cycles_executed: u64,
    pub cycle_errors: u64,
    pub transport_errors: u64,
    pub fan_errors: u64,
    pub menu_errors: u64,
    pub keypresses: u64,
    pub home_resets: u64,
    pub idle_timeouts: u64,
    pub commands_applied: u64,
    /// Times the link was reopened after it dropped.
    pub reconnects: u64,
}

/// What one successful cycle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub alarm: u8,
    pub key: Option<u8>,
    pub health_changed: bool,
    pub idle_timeout: bool,
}

/// The poll loop and everything it owns.
///
/// Only this type touches the link, the fan controller and the display
/// state; other threads go through [`PanelHandle`].
pub struct PanelWorker<T: Transport, F: FanController> {
    link: T,
    fan: F,
    leds: Box<dyn LedEncoder>,
    config: PanelConfig,
    state: DisplayState,
    menus: MenuStateMachine,
    idle: IdleTimer,
    stats: CycleStats,
    last_alarm: u8,
    commands: Receiver<PanelCommand>,
    sender: Sender<PanelCommand>,
    exchange: Arc<StateExchange>,
    timebase: TimeBase,
}

impl<T: Transport, F: FanController> PanelWorker<T, F> {
    pub fn new(link: T, fan: F, config: PanelConfig) -> Self {
        Self::with_parts(
            link,
            fan,
            Box::new(HomeMenu::default()),
            Box::new(GpoLedEncoder),
            config,
        )
    }

    pub fn with_parts(
        link: T,
        fan: F,
        home: Box<dyn Menu>,
        leds: Box<dyn LedEncoder>,
        config: PanelConfig,
    ) -> Self {
        let (sender, commands) = mpsc::channel();
        Self {
            link,
            fan,
            leds,
            state: DisplayState::new(config.backlight_mode),
            menus: MenuStateMachine::new(home),
            idle: IdleTimer::new(config.idle_timeout_cycles),
            config,
            stats: CycleStats::default(),
            last_alarm: 0,
            commands,
            sender,
            exchange: Arc::new(StateExchange::new()),
            timebase: TimeBase::new(),
        }
    }

    pub fn handle(&self) -> PanelHandle {
        PanelHandle::new(self.sender.clone(), Arc::clone(&self.exchange))
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn idle_count(&self) -> u32 {
        self.idle.count()
    }

    pub fn menus(&self) -> &MenuStateMachine {
        &self.menus
    }

    pub fn link(&self) -> &T {
        &self.link
    }

    /// Opens the link and puts the panel into its start-up state: default
    /// levels, cleared glass, power-on LED pattern, home menu.
    pub fn initialize(&mut self) -> Result<(), PanelError> {
        if !self.link.is_open() {
            self.link.open()?;
        }
        self.state = DisplayState::new(self.config.backlight_mode);
        self.last_alarm = 0;

        self.restore_panel(
            self.config.contrast,
            self.config.dim,
            LedPresenter::start_state(),
        )?;
        self.publish(true);
        Ok(())
    }

    /// Reopens a dropped link and repaints the panel. Levels and health
    /// carry over; the menu returns home.
    fn reconnect(&mut self) -> Result<(), PanelError> {
        self.link.open()?;
        self.stats.reconnects += 1;
        info!("panel link reopened (reconnect #{})", self.stats.reconnects);

        let contrast = self.state.properties.contrast();
        let dim = self.state.properties.dim();
        let leds = LedPresenter::refresh(&self.state.health);
        self.restore_panel(contrast, dim, leds)
    }

    /// Writes levels, clears the glass, drives the LEDs and shows the home menu.
    fn restore_panel(
        &mut self,
        contrast: u8,
        dim: u8,
        leds: Vec<LedCommand>,
    ) -> Result<(), PanelError> {
        self.idle.reset();
        let mut panel = Panel::new(&mut self.link, &mut self.state);
        panel.set_contrast(i32::from(contrast))?;
        panel.clear()?;
        panel.set_dim(i32::from(dim))?;
        drive_leds(&mut self.link, self.leds.as_ref(), &mut self.state.leds, leds)?;

        let mut panel = Panel::new(&mut self.link, &mut self.state);
        self.menus.go_home(&mut panel)?;
        Ok(())
    }

    /// Drops commands queued while the worker was stopped.
    pub fn discard_pending(&mut self) {
        let dropped = self.commands.try_iter().count();
        if dropped > 0 {
            debug!("discarded {dropped} panel commands queued while stopped");
        }
    }

    /// Executes one poll cycle.
    ///
    /// Steps run in a fixed order (reconnect if the link dropped, queued
    /// commands, alarm, keypress, LEDs, idle timeout). The first failing
    /// step ends the cycle; whatever the earlier steps changed stays applied.
    pub fn run_cycle(&mut self) -> Result<CycleReport, PanelError> {
        if !self.link.is_open() {
            self.reconnect()?;
        }
        self.apply_pending()?;

        let raw = self.fan.alarm1()?;
        self.last_alarm = raw;
        let health_changed = self.update_health(raw);

        let input = self.link.read(KEY_READ_LEN)?;
        let key = input.first().copied();
        match key {
            Some(key) => {
                self.idle.reset();
                self.stats.keypresses += 1;
                if key == HOME_KEY {
                    self.stats.home_resets += 1;
                }
                let mut panel = Panel::new(&mut self.link, &mut self.state);
                self.menus.dispatch(key, &mut panel)?;
            }
            None => {
                self.idle.tick();
                trace!("idle cycle {}", self.idle.count());
            }
        }

        drive_leds(
            &mut self.link,
            self.leds.as_ref(),
            &mut self.state.leds,
            LedPresenter::refresh(&self.state.health),
        )?;

        let mut idle_timeout = false;
        if self.idle.expired() {
            info!(
                "no input for {} cycles; returning to home menu",
                self.idle.count()
            );
            let mut panel = Panel::new(&mut self.link, &mut self.state);
            self.menus.go_home(&mut panel)?;
            self.idle.reset();
            self.stats.idle_timeouts += 1;
            idle_timeout = true;
        }

        Ok(CycleReport {
            alarm: raw,
            key,
            health_changed,
            idle_timeout,
        })
    }

    /// Runs cycles until `stop` is set, then closes the link.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("panel poll loop started");
        while !stop.load(Ordering::Relaxed) {
            if let Err(err) = self.run_cycle() {
                self.record_failure(&err);
                if !self.link.is_open() {
                    thread::sleep(RECONNECT_BACKOFF);
                }
            }
            self.stats.cycles_executed += 1;
            self.publish(true);
        }
        self.shutdown();
        info!(
            "panel poll loop stopped after {} cycles ({} failed)",
            self.stats.cycles_executed, self.stats.cycle_errors
        );
    }

    /// Closes the link if it is open and marks the snapshot as stopped.
    pub fn shutdown(&mut self) {
        if self.link.is_open() {
            if let Err(err) = self.link.close() {
                warn!("failed to close panel link: {err}");
            }
        }
        self.publish(false);
    }

    fn update_health(&mut self, raw: u8) -> bool {
        let before = self.state.health;
        if self.config.health_policy == HealthPolicy::FollowAlarm {
            self.state.health = Health::NOMINAL;
        }
        let delta = alarm::decode(raw);
        self.state.health.apply(delta);

        let changed = self.state.health != before;
        if changed {
            warn!(
                "alarm register 0x{raw:02x} ({:?}): health now {:?}",
                delta.severity(),
                self.state.health
            );
        }
        changed
    }

    fn apply_pending(&mut self) -> Result<(), PanelError> {
        while let Ok(command) = self.commands.try_recv() {
            debug!("applying {command:?}");
            self.apply(command)?;
            self.stats.commands_applied += 1;
        }
        Ok(())
    }

    fn apply(&mut self, command: PanelCommand) -> Result<(), PanelError> {
        let mut panel = Panel::new(&mut self.link, &mut self.state);
        match command {
            PanelCommand::SetDim(level) => panel.set_dim(level)?,
            PanelCommand::SetContrast(level) => panel.set_contrast(level)?,
            PanelCommand::SetBacklight(state) => panel.set_backlight(state)?,
            PanelCommand::SetCursor { x, y } => panel.set_position(x, y)?,
            PanelCommand::WriteText(text) => panel.write_text(&text)?,
            PanelCommand::Clear => panel.clear()?,
            PanelCommand::ShowMenu(menu) => self.menus.set_active(menu, &mut panel)?,
            PanelCommand::GoHome => {
                self.menus.go_home(&mut panel)?;
                self.idle.reset();
            }
            PanelCommand::ClearHealth => {
                info!("health flags cleared");
                self.state.health = Health::NOMINAL;
            }
        }
        Ok(())
    }

    fn record_failure(&mut self, err: &PanelError) {
        self.stats.cycle_errors += 1;
        match err {
            PanelError::Transport(_) => self.stats.transport_errors += 1,
            PanelError::Fan(_) => self.stats.fan_errors += 1,
            PanelError::Menu { .. } => self.stats.menu_errors += 1,
            PanelError::WorkerLost => {}
        }
        warn!("panel cycle failed [{}]: {err}", err.kind());
    }

    fn publish(&self, running: bool) {
        self.exchange.publish(PanelSnapshot {
            timestamp_us: self.timebase.now_us(),
            running,
            cursor_x: self.state.cursor.x(),
            cursor_y: self.state.cursor.y(),
            dim: self.state.properties.dim(),
            contrast: self.state.properties.contrast(),
            backlight: self.state.properties.backlight(),
            health: self.state.health,
            leds: self.state.leds,
            last_alarm: self.last_alarm,
            idle_count: self.idle.count(),
            at_home: self.menus.is_home(),
            menu_depth: self.menus.depth(),
            cycles_executed: self.stats.cycles_executed,
            cycle_errors: self.stats.cycle_errors,
            keypresses: self.stats.keypresses,
            home_resets: self.stats.home_resets,
            idle_timeouts: self.stats.idle_timeouts,
        });
    }
}

fn drive_leds(
    link: &mut dyn Transport,
    encoder: &dyn LedEncoder,
    bank: &mut LedBank,
    commands: Vec<LedCommand>,
) -> Result<(), TransportError> {
    for command in commands {
        transmit(link, &encoder.encode(command))?;
        bank.apply(command);
    }
    Ok(())
}

#[cfg(all(test, feature = "simulation"))]
mod tests {
    use super::*;
    use crate::command::LcdCommand;
    use crate::hal_sim::{Frame, SimulatedFan, SimulatedTransport};
    use crate::led::LedState;
    use crate::menu::MenuTransition;
    use crate::properties::Backlight;

    struct Settings;

    impl Menu for Settings {
        fn name(&self) -> &str {
            "settings"
        }

        fn render(&mut self, panel: &mut Panel<'_>) -> Result<(), PanelError> {
            panel.clear()?;
            panel.write_text("Settings")?;
            Ok(())
        }

        fn handle_key(&mut self, key: u8, panel: &mut Panel<'_>) -> Result<MenuTransition, PanelError> {
            if key == b'+' {
                let dim = i32::from(panel.properties().dim()) + 10;
                panel.set_dim(dim)?;
            }
            Ok(MenuTransition::Stay)
        }
    }

    type SimWorker = PanelWorker<SimulatedTransport, SimulatedFan>;

    fn worker(config: PanelConfig) -> (SimWorker, SimulatedTransport, SimulatedFan) {
        let link = SimulatedTransport::new();
        let fan = SimulatedFan::new();
        let mut worker = PanelWorker::new(link.clone(), fan.clone(), config);
        worker.initialize().unwrap();
        link.take_written();
        (worker, link, fan)
    }

    #[test]
    fn initialize_writes_startup_sequence() {
        let link = SimulatedTransport::new();
        let mut worker = PanelWorker::new(link.clone(), SimulatedFan::new(), PanelConfig::default());
        worker.initialize().unwrap();

        let frames = link.take_frames();
        assert_eq!(
            &frames[..3],
            &[
                Frame::Command(LcdCommand::SetContrast(128)),
                Frame::Command(LcdCommand::Clear),
                Frame::Command(LcdCommand::SetDim(200)),
            ]
        );
        assert!(link.is_open());
        assert!(worker.menus().is_home());
        assert_eq!(
            worker.state().leds.as_array(),
            [LedState::Green, LedState::Off, LedState::Off]
        );
    }

    #[test]
    fn alarm_scenarios_drive_leds() {
        let (mut worker, _link, fan) = worker(PanelConfig::default());

        worker.run_cycle().unwrap();
        assert_eq!(
            worker.state().leds.as_array(),
            [LedState::Green, LedState::Off, LedState::Off]
        );

        fan.set_alarm(0b1000_0000);
        let report = worker.run_cycle().unwrap();
        assert!(report.health_changed);
        assert_eq!(
            worker.state().leds.as_array(),
            [LedState::Red, LedState::Off, LedState::Red]
        );
    }

    #[test]
    fn warning_scenario_drives_alarm_led() {
        let (mut worker, _link, fan) = worker(PanelConfig::default());
        fan.set_alarm(0b0000_0010);
        worker.run_cycle().unwrap();
        assert_eq!(
            worker.state().leds.as_array(),
            [LedState::Red, LedState::Red, LedState::Off]
        );
    }

    #[test]
    fn idle_counter_tracks_reads() {
        let (mut worker, link, _fan) = worker(PanelConfig::default());

        worker.run_cycle().unwrap();
        worker.run_cycle().unwrap();
        assert_eq!(worker.idle_count(), 2);

        link.push_input(b"x");
        worker.run_cycle().unwrap();
        assert_eq!(worker.idle_count(), 0);

        worker.run_cycle().unwrap();
        link.push_input(&[HOME_KEY]);
        worker.run_cycle().unwrap();
        assert_eq!(worker.idle_count(), 0);
    }

    #[test]
    fn idle_threshold_returns_home() {
        let (mut worker, link, _fan) = worker(PanelConfig::default());
        worker.handle().show_menu(Box::new(Settings)).unwrap();
        worker.run_cycle().unwrap();
        assert!(!worker.menus().is_home());

        // The cycle that applied the menu was idle too.
        for _ in 1..IDLE_TIMEOUT_CYCLES - 1 {
            let report = worker.run_cycle().unwrap();
            assert!(!report.idle_timeout);
        }
        assert_eq!(worker.idle_count(), IDLE_TIMEOUT_CYCLES - 1);
        assert!(!worker.menus().is_home());

        link.take_written();
        let report = worker.run_cycle().unwrap();
        assert!(report.idle_timeout);
        assert!(worker.menus().is_home());
        assert_eq!(worker.idle_count(), 0);
        assert_eq!(worker.stats().idle_timeouts, 1);
        assert!(link.take_frames().contains(&Frame::Text("Status: OK".into())));
    }

    #[test]
    fn home_key_resets_from_submenu() {
        let (mut worker, link, _fan) = worker(PanelConfig::default());
        worker.handle().show_menu(Box::new(Settings)).unwrap();
        for _ in 0..5 {
            worker.run_cycle().unwrap();
        }
        link.take_written();

        link.push_input(&[HOME_KEY]);
        worker.run_cycle().unwrap();

        let frames = link.take_frames();
        assert_eq!(frames.first(), Some(&Frame::Command(LcdCommand::Clear)));
        assert!(frames.contains(&Frame::Command(LcdCommand::HomeAcknowledge)));
        assert!(worker.menus().is_home());
        assert_eq!(worker.idle_count(), 0);
        assert_eq!(worker.stats().home_resets, 1);
    }

    #[test]
    fn home_render_reflects_alarm_read_in_same_cycle() {
        let (mut worker, link, fan) = worker(PanelConfig::default());
        link.take_frames();

        fan.set_alarm(0x80);
        link.push_input(&[HOME_KEY]);
        worker.run_cycle().unwrap();

        let frames = link.take_frames();
        assert!(frames.contains(&Frame::Text("Status: FAULT".into())));
        assert!(!frames.contains(&Frame::Text("Status: OK".into())));
        assert_eq!(
            worker.state().leds.as_array(),
            [LedState::Red, LedState::Off, LedState::Red]
        );
    }

    #[test]
    fn dropped_link_is_reopened_and_repainted() {
        let (mut worker, link, fan) = worker(PanelConfig::default());
        worker.handle().set_dim(40).unwrap();
        worker.handle().show_menu(Box::new(Settings)).unwrap();
        fan.set_alarm(0x02);
        worker.run_cycle().unwrap();
        assert!(!worker.menus().is_home());
        link.take_written();

        let mut far_end = link.clone();
        far_end.close().unwrap();
        assert!(!worker.link().is_open());

        worker.run_cycle().unwrap();
        assert!(link.is_open());
        assert_eq!(link.open_count(), 2);
        assert_eq!(worker.stats().reconnects, 1);
        assert!(worker.menus().is_home());

        let frames = link.take_frames();
        assert_eq!(
            &frames[..3],
            &[
                Frame::Command(LcdCommand::SetContrast(DEFAULT_CONTRAST)),
                Frame::Command(LcdCommand::Clear),
                Frame::Command(LcdCommand::SetDim(40)),
            ]
        );
        // Latched warning survives the reconnect.
        assert!(!worker.state().health.alarm);
        assert_eq!(
            worker.state().leds.as_array(),
            [LedState::Red, LedState::Red, LedState::Off]
        );

        worker.run_cycle().unwrap();
        assert_eq!(worker.stats().reconnects, 1);
    }

    #[test]
    fn keys_reach_active_menu() {
        let (mut worker, link, _fan) = worker(PanelConfig::default());
        worker.handle().show_menu(Box::new(Settings)).unwrap();
        worker.run_cycle().unwrap();

        link.push_input(b"+");
        worker.run_cycle().unwrap();
        assert_eq!(worker.state().properties.dim(), DEFAULT_DIM + 10);
    }

    #[test]
    fn failed_step_is_reported_and_next_cycle_runs() {
        let (mut worker, link, fan) = worker(PanelConfig::default());

        link.fail_next_reads(1);
        let err = worker.run_cycle().unwrap_err();
        assert_eq!(err.kind(), "transport_read");

        fan.fail_next_reads(1);
        assert_eq!(worker.run_cycle().unwrap_err().kind(), "fan_controller");

        assert!(worker.run_cycle().is_ok());
    }

    #[test]
    fn run_loop_counts_failures_and_stops() {
        let (mut worker, link, _fan) = worker(PanelConfig::default());
        link.fail_next_reads(3);
        let stop = AtomicBool::new(false);

        for _ in 0..5 {
            if let Err(err) = worker.run_cycle() {
                worker.record_failure(&err);
            }
        }
        assert_eq!(worker.stats().transport_errors, 3);

        stop.store(true, Ordering::Relaxed);
        worker.run(&stop);
        assert!(!link.is_open());
        assert!(!worker.handle().snapshot().running);
    }

    #[test]
    fn queued_commands_apply_before_alarm_step() {
        let (mut worker, link, _fan) = worker(PanelConfig {
            backlight_mode: BacklightMode::Direct,
            ..PanelConfig::default()
        });
        let handle = worker.handle();
        handle.set_dim(999).unwrap();
        handle.set_backlight(Backlight::Off).unwrap();
        handle.send(PanelCommand::SetCursor { x: 3, y: 2 }).unwrap();

        worker.run_cycle().unwrap();

        let frames = link.take_frames();
        assert_eq!(
            &frames[..3],
            &[
                Frame::Command(LcdCommand::SetDim(255)),
                Frame::Command(LcdCommand::BacklightOff),
                Frame::Command(LcdCommand::SetCursor { x: 3, y: 2 }),
            ]
        );
        assert_eq!(worker.state().properties.dim(), 255);
        assert_eq!(worker.stats().commands_applied, 3);
    }

    #[test]
    fn latching_health_survives_clean_register_until_cleared() {
        let (mut worker, _link, fan) = worker(PanelConfig::default());
        fan.set_alarm(0x40);
        worker.run_cycle().unwrap();
        fan.set_alarm(0x00);
        worker.run_cycle().unwrap();
        assert!(!worker.state().health.fault);

        worker.handle().clear_health().unwrap();
        worker.run_cycle().unwrap();
        assert!(worker.state().health.is_nominal());
        assert_eq!(worker.state().leds.status, LedState::Green);
    }

    #[test]
    fn follow_alarm_policy_tracks_register() {
        let (mut worker, _link, fan) = worker(PanelConfig {
            health_policy: HealthPolicy::FollowAlarm,
            ..PanelConfig::default()
        });
        fan.set_alarm(0x04);
        worker.run_cycle().unwrap();
        assert!(!worker.state().health.alarm);

        fan.set_alarm(0x00);
        worker.run_cycle().unwrap();
        assert!(worker.state().health.is_nominal());
    }
}
