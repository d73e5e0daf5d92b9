use panel_core::{
    DisplayRuntime, LedState, Menu, MenuTransition, Panel, PanelConfig, PanelError, PanelHandle,
    PanelSnapshot, SimulatedFan, SimulatedTransport, Transport, TransportError, HOME_KEY,
};
use std::io;
use std::thread;
use std::time::{Duration, Instant};

type SimRuntime = DisplayRuntime<SimulatedTransport, SimulatedFan>;

fn sim_runtime() -> (SimRuntime, SimulatedTransport, SimulatedFan) {
    let link = SimulatedTransport::new().with_read_delay(Duration::from_millis(1));
    let fan = SimulatedFan::new();
    let runtime = DisplayRuntime::new(link.clone(), fan.clone(), PanelConfig::default());
    (runtime, link, fan)
}

fn wait_for(handle: &PanelHandle, what: &str, pred: impl Fn(&PanelSnapshot) -> bool) -> PanelSnapshot {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = handle.snapshot();
        if pred(&snapshot) {
            return snapshot;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}: {snapshot:?}");
        thread::sleep(Duration::from_millis(2));
    }
}

struct Diagnostics;

impl Menu for Diagnostics {
    fn name(&self) -> &str {
        "diagnostics"
    }

    fn render(&mut self, panel: &mut Panel<'_>) -> Result<(), PanelError> {
        panel.clear()?;
        panel.write_text("Diagnostics")?;
        Ok(())
    }

    fn handle_key(&mut self, _key: u8, _panel: &mut Panel<'_>) -> Result<MenuTransition, PanelError> {
        Ok(MenuTransition::Stay)
    }
}

#[test]
fn start_runs_cycles_and_stop_closes_link() {
    let (mut runtime, link, _fan) = sim_runtime();
    runtime.start().unwrap();
    assert!(runtime.is_running());
    assert!(link.is_open());

    wait_for(&runtime.handle(), "cycles", |s| s.running && s.cycles_executed > 10);

    runtime.stop();
    assert!(!runtime.is_running());
    assert!(!link.is_open());
    assert_eq!(link.close_count(), 1);
    assert!(!runtime.snapshot().running);
    assert!(runtime.stats().is_some());
}

#[test]
fn lifecycle_misuse_is_a_no_op() {
    let (mut runtime, link, _fan) = sim_runtime();
    runtime.stop();

    runtime.start().unwrap();
    runtime.start().unwrap();
    assert_eq!(link.open_count(), 1);

    runtime.stop();
    runtime.stop();
    assert_eq!(link.close_count(), 1);
}

#[test]
fn runtime_restarts_with_fresh_state() {
    let (mut runtime, link, _fan) = sim_runtime();
    let handle = runtime.handle();

    runtime.start().unwrap();
    handle.set_dim(17).unwrap();
    wait_for(&handle, "dim", |s| s.dim == 17);
    runtime.stop();

    runtime.start().unwrap();
    let snapshot = wait_for(&handle, "restart", |s| s.running);
    assert_eq!(snapshot.dim, 200);
    assert!(snapshot.at_home);
    assert_eq!(link.open_count(), 2);
    runtime.stop();
}

#[test]
fn alarm_register_reaches_leds() {
    let (mut runtime, _link, fan) = sim_runtime();
    let handle = runtime.handle();
    runtime.start().unwrap();

    wait_for(&handle, "nominal", |s| {
        s.cycles_executed > 0 && s.leds.as_array() == [LedState::Green, LedState::Off, LedState::Off]
    });

    fan.set_alarm(0b1000_0000);
    let snapshot = wait_for(&handle, "critical", |s| {
        s.leds.as_array() == [LedState::Red, LedState::Off, LedState::Red]
    });
    assert!(!snapshot.health.status);
    assert!(!snapshot.health.fault);
    assert!(snapshot.health.alarm);

    runtime.stop();
}

#[test]
fn home_key_returns_from_submenu() {
    let (mut runtime, link, _fan) = sim_runtime();
    let handle = runtime.handle();
    runtime.start().unwrap();

    handle.show_menu(Box::new(Diagnostics)).unwrap();
    wait_for(&handle, "submenu", |s| !s.at_home);

    link.push_input(&[HOME_KEY]);
    let snapshot = wait_for(&handle, "home", |s| s.at_home && s.home_resets == 1);
    assert_eq!(snapshot.keypresses, 1);
    assert!(snapshot.idle_count < 1200);

    runtime.stop();
}

#[test]
fn read_failures_do_not_stop_the_worker() {
    let (mut runtime, link, _fan) = sim_runtime();
    let handle = runtime.handle();
    runtime.start().unwrap();

    link.fail_next_reads(5);
    let failed = wait_for(&handle, "errors", |s| s.cycle_errors >= 5);
    wait_for(&handle, "recovery", |s| s.cycles_executed > failed.cycles_executed + 5);
    assert!(runtime.is_running());

    runtime.stop();
}

#[test]
fn dropped_link_is_reopened_while_running() {
    let (mut runtime, link, _fan) = sim_runtime();
    let handle = runtime.handle();
    runtime.start().unwrap();

    handle.show_menu(Box::new(Diagnostics)).unwrap();
    wait_for(&handle, "submenu", |s| !s.at_home);

    let mut far_end = link.clone();
    far_end.close().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while link.open_count() < 2 {
        assert!(Instant::now() < deadline, "link was not reopened");
        thread::sleep(Duration::from_millis(2));
    }
    wait_for(&handle, "home after reconnect", |s| s.at_home);
    assert!(link.is_open());
    assert!(runtime.is_running());

    runtime.stop();
    assert_eq!(runtime.stats().map(|s| s.reconnects), Some(1));
}

#[test]
fn short_idle_threshold_returns_home() {
    let link = SimulatedTransport::new().with_read_delay(Duration::from_millis(1));
    let mut runtime = DisplayRuntime::new(
        link,
        SimulatedFan::new(),
        PanelConfig {
            idle_timeout_cycles: 20,
            ..PanelConfig::default()
        },
    );
    let handle = runtime.handle();
    runtime.start().unwrap();

    handle.show_menu(Box::new(Diagnostics)).unwrap();
    let snapshot = wait_for(&handle, "idle timeout", |s| s.idle_timeouts >= 1);
    assert!(snapshot.at_home);

    runtime.stop();
}

/// Link whose serial device never appears.
struct MissingDevice;

impl Transport for MissingDevice {
    fn open(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Open(io::Error::new(
            io::ErrorKind::NotFound,
            "no such device",
        )))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn read(&mut self, _max: usize) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::NotOpen)
    }

    fn write(&mut self, _bytes: &[u8]) -> Result<usize, TransportError> {
        Err(TransportError::NotOpen)
    }

    fn is_open(&self) -> bool {
        false
    }
}

#[test]
fn failed_open_leaves_runtime_stopped() {
    let mut runtime = DisplayRuntime::new(MissingDevice, SimulatedFan::new(), PanelConfig::default());

    let err = runtime.start().unwrap_err();
    assert_eq!(err.kind(), "transport_open");
    assert!(!runtime.is_running());

    runtime.stop();
}
