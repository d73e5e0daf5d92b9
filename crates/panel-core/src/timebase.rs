use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Clock shared by the poll loop and the binary's audit trail.
///
/// `now_us` stamps every [`PanelSnapshot`](crate::PanelSnapshot) the worker
/// publishes, so watchers can order snapshots and tell how stale one is.
/// `unix_us` goes into audit entries next to that value so they can be
/// matched against syslog or ser2net logs on the same host.
#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Microseconds since this clock was created. Never goes backwards.
    pub fn now_us(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Wall-clock microseconds since the Unix epoch; zero if the host clock
    /// is set before 1970.
    pub fn unix_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| u64::try_from(since.as_micros()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}
