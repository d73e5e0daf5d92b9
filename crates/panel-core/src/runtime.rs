use crate::control_loop::{CycleStats, PanelConfig, PanelWorker};
use crate::error::PanelError;
use crate::hal::{FanController, LedEncoder, Transport};
use crate::led::GpoLedEncoder;
use crate::menu::{HomeMenu, Menu};
use crate::sync::{PanelHandle, PanelSnapshot};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum Lifecycle<T: Transport, F: FanController> {
    Stopped(Box<PanelWorker<T, F>>),
    Running {
        stop: Arc<AtomicBool>,
        worker: JoinHandle<Box<PanelWorker<T, F>>>,
    },
    /// The worker panicked; its link and state went with it.
    Lost,
}

/// Owns the panel worker and its start/stop lifecycle.
///
/// While running, the worker lives on its own thread and is the only code
/// that touches the link. It comes back on [`stop`](Self::stop), so the
/// runtime can be started again.
pub struct DisplayRuntime<T: Transport + 'static, F: FanController + 'static> {
    lifecycle: Lifecycle<T, F>,
    handle: PanelHandle,
}

impl<T: Transport + 'static, F: FanController + 'static> DisplayRuntime<T, F> {
    pub fn new(link: T, fan: F, config: PanelConfig) -> Self {
        Self::builder(link, fan).config(config).build()
    }

    pub fn builder(link: T, fan: F) -> RuntimeBuilder<T, F> {
        RuntimeBuilder {
            link,
            fan,
            config: PanelConfig::default(),
            home: Box::new(HomeMenu::default()),
            leds: Box::new(GpoLedEncoder),
        }
    }

    fn from_worker(worker: PanelWorker<T, F>) -> Self {
        Self {
            handle: worker.handle(),
            lifecycle: Lifecycle::Stopped(Box::new(worker)),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. })
    }

    /// Handle for sending commands and reading snapshots from any thread.
    pub fn handle(&self) -> PanelHandle {
        self.handle.clone()
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.handle.snapshot()
    }

    /// Counters of the stopped worker; `None` while running.
    pub fn stats(&self) -> Option<&CycleStats> {
        match &self.lifecycle {
            Lifecycle::Stopped(worker) => Some(worker.stats()),
            _ => None,
        }
    }

    /// Initializes the panel and spawns the poll loop.
    ///
    /// A no-op when already running. If the panel cannot be initialized the
    /// link is closed again, the error is returned and the runtime stays
    /// stopped.
    pub fn start(&mut self) -> Result<(), PanelError> {
        let mut worker = match std::mem::replace(&mut self.lifecycle, Lifecycle::Lost) {
            Lifecycle::Stopped(worker) => worker,
            Lifecycle::Lost => return Err(PanelError::WorkerLost),
            running @ Lifecycle::Running { .. } => {
                debug!("panel runtime already running");
                self.lifecycle = running;
                return Ok(());
            }
        };

        worker.discard_pending();
        if let Err(err) = worker.initialize() {
            error!("panel start failed [{}]: {err}", err.kind());
            worker.shutdown();
            self.lifecycle = Lifecycle::Stopped(worker);
            return Err(err);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_worker = Arc::clone(&stop);
        let worker = thread::Builder::new()
            .name("panel-poll".to_string())
            .spawn(move || {
                worker.run(&stop_worker);
                worker
            })
            .map_err(|err| {
                error!("failed to spawn panel poll thread: {err}");
                PanelError::WorkerLost
            })?;

        info!("panel runtime started");
        self.lifecycle = Lifecycle::Running { stop, worker };
        Ok(())
    }

    /// Signals the poll loop and blocks until it has closed the link and
    /// exited. A no-op when already stopped.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Lost) {
            Lifecycle::Running { stop, worker } => {
                stop.store(true, Ordering::Relaxed);
                match worker.join() {
                    Ok(worker) => {
                        info!("panel runtime stopped");
                        self.lifecycle = Lifecycle::Stopped(worker);
                    }
                    Err(_) => error!("panel poll thread panicked; runtime cannot restart"),
                }
            }
            other => {
                debug!("panel runtime already stopped");
                self.lifecycle = other;
            }
        }
    }
}

impl<T: Transport + 'static, F: FanController + 'static> Drop for DisplayRuntime<T, F> {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct RuntimeBuilder<T: Transport, F: FanController> {
    link: T,
    fan: F,
    config: PanelConfig,
    home: Box<dyn Menu>,
    leds: Box<dyn LedEncoder>,
}

impl<T: Transport + 'static, F: FanController + 'static> RuntimeBuilder<T, F> {
    pub fn config(mut self, config: PanelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn home_menu(mut self, home: Box<dyn Menu>) -> Self {
        self.home = home;
        self
    }

    pub fn led_encoder(mut self, leds: Box<dyn LedEncoder>) -> Self {
        self.leds = leds;
        self
    }

    pub fn build(self) -> DisplayRuntime<T, F> {
        DisplayRuntime::from_worker(PanelWorker::with_parts(
            self.link,
            self.fan,
            self.home,
            self.leds,
            self.config,
        ))
    }
}
