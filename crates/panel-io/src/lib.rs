pub mod alarm_file;
pub mod metrics;
pub mod transport_tcp;

pub use alarm_file::{parse_register, FileAlarmRegister};
pub use metrics::{init_metrics, serve_metrics, SnapshotRecorder};
pub use transport_tcp::TcpSerialTransport;
