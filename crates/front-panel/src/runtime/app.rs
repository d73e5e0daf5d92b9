use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use panel_core::{
    DisplayRuntime, FanController, FanError, PanelError, SimulatedFan, SimulatedTransport,
    TimeBase, Transport, TransportError,
};
use panel_io::{FileAlarmRegister, TcpSerialTransport};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{atomic::AtomicBool, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to open audit log: {0}")]
    Audit(#[source] std::io::Error),
    #[error(transparent)]
    Panel(#[from] PanelError),
}

enum PanelLink {
    Simulated(SimulatedTransport),
    TcpSerial(TcpSerialTransport),
}

impl Transport for PanelLink {
    fn open(&mut self) -> Result<(), TransportError> {
        match self {
            Self::Simulated(link) => link.open(),
            Self::TcpSerial(link) => link.open(),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self {
            Self::Simulated(link) => link.close(),
            Self::TcpSerial(link) => link.close(),
        }
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>, TransportError> {
        match self {
            Self::Simulated(link) => link.read(max),
            Self::TcpSerial(link) => link.read(max),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        match self {
            Self::Simulated(link) => link.write(bytes),
            Self::TcpSerial(link) => link.write(bytes),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Simulated(link) => link.is_open(),
            Self::TcpSerial(link) => link.is_open(),
        }
    }
}

enum AlarmSource {
    Simulated(SimulatedFan),
    File(FileAlarmRegister),
}

impl FanController for AlarmSource {
    fn alarm1(&mut self) -> Result<u8, FanError> {
        match self {
            Self::Simulated(fan) => fan.alarm1(),
            Self::File(fan) => fan.alarm1(),
        }
    }
}

fn build_link(config: &RuntimeConfig) -> PanelLink {
    match &config.serial_addr {
        Some(addr) => {
            info!(addr = %addr, timeout_ms = config.read_timeout_ms, "Using serial bridge");
            PanelLink::TcpSerial(
                TcpSerialTransport::new(addr.clone()).with_read_timeout(config.read_timeout()),
            )
        }
        None => {
            info!("No --serial given; using simulated panel");
            // Paced like a quiet serial line so the poll loop does not spin.
            PanelLink::Simulated(SimulatedTransport::new().with_read_delay(config.read_timeout()))
        }
    }
}

fn build_alarm_source(config: &RuntimeConfig) -> AlarmSource {
    match &config.alarm_file {
        Some(path) => {
            info!(path = %path.display(), "Reading alarm register from file");
            AlarmSource::File(FileAlarmRegister::new(path.clone()))
        }
        None => AlarmSource::Simulated(SimulatedFan::new()),
    }
}

pub fn run_from_args() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("front-panel: {e}");
            eprintln!("Try 'front-panel --help' for more information.");
            return ExitCode::from(2);
        }
    };
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

pub fn run(config: RuntimeConfig) -> Result<(), AppError> {
    let _log_guard = init_tracing(config.json_logs, config.log_dir.as_deref());

    telemetry::init();
    let metrics_enabled = config.metrics_addr.is_some();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let timebase = TimeBase::new();
    let audit_logger = match init_audit_logger(config.audit_path.as_ref()) {
        Ok(logger) => logger,
        Err(e) => {
            error!(error = %e, "Audit logging requested but failed to initialize");
            return Err(AppError::Audit(e));
        }
    };
    let audit = |event_type: AuditEventType, details: serde_json::Value| {
        if let Some(logger) = &audit_logger {
            if let Err(e) =
                logger.log_event(timebase.now_us(), timebase.unix_us(), event_type, details)
            {
                error!(error = %e, "Failed to write audit entry");
            }
        }
    };

    let panel_config = config.panel_config();
    info!(
        idle_timeout_cycles = panel_config.idle_timeout_cycles,
        backlight_mode = ?panel_config.backlight_mode,
        health_policy = ?panel_config.health_policy,
        "Starting front panel runtime"
    );

    let mut runtime = DisplayRuntime::new(
        build_link(&config),
        build_alarm_source(&config),
        panel_config,
    );

    if let Err(e) = runtime.start() {
        error!(kind = e.kind(), error = %e, "Front panel failed to start");
        audit(
            AuditEventType::StartFailed,
            serde_json::json!({ "kind": e.kind(), "error": e.to_string() }),
        );
        return Err(e.into());
    }

    audit(
        AuditEventType::PanelStart,
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "serial": config.serial_addr,
            "alarm_file": config.alarm_file,
            "metrics_enabled": metrics_enabled,
        }),
    );

    let stop_watcher = Arc::new(AtomicBool::new(false));
    let watcher = telemetry::start_snapshot_watcher(
        runtime.handle().exchange(),
        audit_logger.clone(),
        timebase,
        Arc::clone(&stop_watcher),
    );

    info!("Front panel running. Press the home key (G) to return to the home menu.");

    let Some(seconds) = config.run_seconds else {
        // Runs until the process is killed.
        let _ = watcher.join();
        return Ok(());
    };

    info!(seconds, "Running for limited duration");
    thread::sleep(Duration::from_secs(seconds));
    runtime.stop();

    stop_watcher.store(true, std::sync::atomic::Ordering::Relaxed);
    let _ = watcher.join();

    if let Some(stats) = runtime.stats() {
        info!(
            cycles_executed = stats.cycles_executed,
            cycle_errors = stats.cycle_errors,
            keypresses = stats.keypresses,
            home_resets = stats.home_resets,
            idle_timeouts = stats.idle_timeouts,
            reconnects = stats.reconnects,
            "Run complete"
        );
        audit(
            AuditEventType::PanelStop,
            serde_json::json!({
                "cycles_executed": stats.cycles_executed,
                "cycle_errors": stats.cycle_errors,
                "transport_errors": stats.transport_errors,
                "fan_errors": stats.fan_errors,
                "keypresses": stats.keypresses,
                "reconnects": stats.reconnects,
            }),
        );
    } else {
        warn!("Panel worker was lost; no final statistics");
    }
    Ok(())
}

fn init_audit_logger(audit_path: Option<&PathBuf>) -> std::io::Result<Option<Arc<AuditLogger>>> {
    let Some(path) = audit_path else {
        return Ok(None);
    };
    let logger = AuditLogger::new(path)?;
    info!(path = %path.display(), "Audit logging enabled");
    Ok(Some(Arc::new(logger)))
}
