//! Prometheus metrics for the front panel runtime.
//!
//! The poll loop never touches these directly; [`SnapshotRecorder`] turns
//! published [`PanelSnapshot`]s into metric updates from another thread.

use panel_core::tags;
use panel_core::{LedState, PanelSnapshot};
use prometheus::{Encoder, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(tag: tags::Tag) -> IntCounter {
    let counter = IntCounter::new(tag.metric, tag.help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

fn gauge(tag: tags::Tag) -> IntGauge {
    let gauge = IntGauge::new(tag.metric, tag.help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

fn gauge_vec(tag: tags::Tag, label: &str) -> IntGaugeVec {
    let gauge = IntGaugeVec::new(Opts::new(tag.metric, tag.help), &[label]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

// ============================================================================
// Poll Loop Metrics
// ============================================================================

pub static CYCLES_EXECUTED: LazyLock<IntCounter> =
    LazyLock::new(|| counter(tags::CYCLES_EXECUTED));

pub static CYCLE_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| counter(tags::CYCLE_ERRORS));

pub static KEYPRESSES: LazyLock<IntCounter> = LazyLock::new(|| counter(tags::KEYPRESSES));

pub static HOME_RESETS: LazyLock<IntCounter> = LazyLock::new(|| counter(tags::HOME_RESETS));

pub static IDLE_TIMEOUTS: LazyLock<IntCounter> = LazyLock::new(|| counter(tags::IDLE_TIMEOUTS));

pub static IDLE_CYCLES: LazyLock<IntGauge> = LazyLock::new(|| gauge(tags::IDLE_CYCLES));

/// Poll loop state (1 = running, 0 = stopped)
pub static PANEL_RUNNING: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        "front_panel_running",
        "Poll loop state (1=running, 0=stopped)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Device State Metrics
// ============================================================================

pub static HEALTH_FLAG: LazyLock<IntGaugeVec> =
    LazyLock::new(|| gauge_vec(tags::HEALTH_FLAG, "flag"));

pub static LED_STATE: LazyLock<IntGaugeVec> = LazyLock::new(|| gauge_vec(tags::LED_STATE, "led"));

pub static ALARM_REGISTER: LazyLock<IntGauge> = LazyLock::new(|| gauge(tags::ALARM_REGISTER));

fn led_value(state: LedState) -> i64 {
    match state {
        LedState::Off => 0,
        LedState::Green => 1,
        LedState::Red => 2,
    }
}

/// Feeds successive snapshots into the registry. Counters advance by the
/// difference between snapshots, so a runtime restart (counters reset to
/// zero inside the worker) never moves them backwards.
#[derive(Debug, Default)]
pub struct SnapshotRecorder {
    last: PanelSnapshot,
}

impl SnapshotRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, snapshot: &PanelSnapshot) {
        let advance = |counter: &IntCounter, now: u64, before: u64| {
            if now > before {
                counter.inc_by(now - before);
            }
        };
        advance(&CYCLES_EXECUTED, snapshot.cycles_executed, self.last.cycles_executed);
        advance(&CYCLE_ERRORS, snapshot.cycle_errors, self.last.cycle_errors);
        advance(&KEYPRESSES, snapshot.keypresses, self.last.keypresses);
        advance(&HOME_RESETS, snapshot.home_resets, self.last.home_resets);
        advance(&IDLE_TIMEOUTS, snapshot.idle_timeouts, self.last.idle_timeouts);

        IDLE_CYCLES.set(i64::from(snapshot.idle_count));
        ALARM_REGISTER.set(i64::from(snapshot.last_alarm));
        PANEL_RUNNING.set(i64::from(snapshot.running));

        let health = snapshot.health;
        for (flag, ok) in [
            ("status", health.status),
            ("alarm", health.alarm),
            ("fault", health.fault),
        ] {
            HEALTH_FLAG.with_label_values(&[flag]).set(i64::from(ok));
        }
        for (led, state) in [
            ("status", snapshot.leds.status),
            ("alarm", snapshot.leds.alarm),
            ("fault", snapshot.leds.fault),
        ] {
            LED_STATE.with_label_values(&[led]).set(led_value(state));
        }

        self.last = *snapshot;
    }
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(addr = %bind_addr, error = %e, "Failed to start metrics server");
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let response = Response::from_data(buffer).with_header(
                        tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        )
                        .unwrap(),
                    );
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready while the poll loop is running
                    if PANEL_RUNNING.get() == 1 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = CYCLES_EXECUTED.get();
    let _ = CYCLE_ERRORS.get();
    let _ = KEYPRESSES.get();
    let _ = HOME_RESETS.get();
    let _ = IDLE_TIMEOUTS.get();
    let _ = IDLE_CYCLES.get();
    let _ = PANEL_RUNNING.get();
    let _ = ALARM_REGISTER.get();
    LazyLock::force(&HEALTH_FLAG);
    LazyLock::force(&LED_STATE);
}
