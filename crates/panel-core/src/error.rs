use crate::hal::{FanError, TransportError};
use thiserror::Error;

/// Failure of a single runtime step.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Fan(#[from] FanError),
    #[error("menu '{menu}' failed: {reason}")]
    Menu { menu: String, reason: String },
    #[error("panel worker thread panicked")]
    WorkerLost,
}

impl PanelError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PanelError::Transport(TransportError::NotOpen) => "transport_not_open",
            PanelError::Transport(TransportError::Open(_)) => "transport_open",
            PanelError::Transport(TransportError::Read(_)) => "transport_read",
            PanelError::Transport(TransportError::Write(_))
            | PanelError::Transport(TransportError::ShortWrite { .. }) => "transport_write",
            PanelError::Fan(_) => "fan_controller",
            PanelError::Menu { .. } => "menu",
            PanelError::WorkerLost => "worker_lost",
        }
    }
}
