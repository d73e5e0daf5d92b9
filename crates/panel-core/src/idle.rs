/// Consecutive idle cycles before the panel falls back to the home menu.
pub const IDLE_TIMEOUT_CYCLES: u32 = 1200;

/// Counts consecutive poll cycles without input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleTimer {
    count: u32,
    threshold: u32,
}

impl Default for IdleTimer {
    fn default() -> Self {
        Self::new(IDLE_TIMEOUT_CYCLES)
    }
}

impl IdleTimer {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Records one idle cycle.
    pub fn tick(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    pub fn expired(&self) -> bool {
        self.count >= self.threshold
    }
}
