use crate::infra::audit::{snapshot_events, AuditLogger};
use panel_core::{PanelSnapshot, StateExchange, TimeBase};
use panel_io::metrics::{init_metrics, serve_metrics, SnapshotRecorder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const WATCH_INTERVAL: Duration = Duration::from_millis(200);

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Polls the published snapshot, feeding metrics and deriving audit events
/// until `stop` is set. One last pass runs after the stop so events from
/// the final cycles are not lost.
pub fn start_snapshot_watcher(
    exchange: Arc<StateExchange>,
    audit: Option<Arc<AuditLogger>>,
    timebase: TimeBase,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut recorder = SnapshotRecorder::new();
        let mut last = PanelSnapshot::default();
        loop {
            let stopping = stop.load(Ordering::Relaxed);
            let snapshot = exchange.read();
            recorder.observe(&snapshot);

            for (event_type, details) in snapshot_events(&last, &snapshot) {
                info!(event = ?event_type, %details, "panel event");
                if let Some(logger) = &audit {
                    if let Err(e) = logger.log_event(
                        timebase.now_us(),
                        timebase.unix_us(),
                        event_type,
                        details,
                    ) {
                        warn!(error = %e, "Failed to write audit entry");
                    }
                }
            }
            last = snapshot;

            if stopping {
                break;
            }
            thread::sleep(WATCH_INTERVAL);
        }
    })
}
