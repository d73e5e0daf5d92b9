//! Audit trail for operator-visible panel events.
//!
//! Entries are appended as JSON lines. Events other than start/stop are
//! derived by comparing successive [`PanelSnapshot`]s.

use panel_core::{Health, PanelSnapshot};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Types of events that are logged in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Poll loop started and panel initialized
    PanelStart,
    /// Panel could not be initialized
    StartFailed,
    /// Poll loop stopped and link closed
    PanelStop,
    /// A health flag was lowered by the alarm register
    HealthDegraded,
    /// Health flags raised again (cleared or following the register)
    HealthRestored,
    /// Operator pressed the home key
    HomeReset,
    /// No input for the idle threshold; home menu restored
    IdleTimeout,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic timestamp in microseconds
    pub timestamp_us: u64,
    /// Wall-clock Unix timestamp in microseconds
    pub unix_us: u64,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
}

/// Thread-safe audit logger that writes to a JSONL file
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogger {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }

    pub fn log(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn log_event(
        &self,
        timestamp_us: u64,
        unix_us: u64,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(AuditEntry {
            timestamp_us,
            unix_us,
            event_type,
            details,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthChangeDetails {
    pub alarm_register: u8,
    pub health: Health,
    pub previous: Health,
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterDetails {
    /// Occurrences since the previous snapshot.
    pub count: u64,
    pub total: u64,
    pub menu_depth: usize,
}

fn lowered(before: &Health, after: &Health) -> bool {
    (before.status && !after.status)
        || (before.alarm && !after.alarm)
        || (before.fault && !after.fault)
}

fn counter_event(
    kind: AuditEventType,
    before: u64,
    after: u64,
    menu_depth: usize,
) -> Option<(AuditEventType, serde_json::Value)> {
    let count = after.checked_sub(before).filter(|n| *n > 0)?;
    let details = CounterDetails {
        count,
        total: after,
        menu_depth,
    };
    serde_json::to_value(details).ok().map(|v| (kind, v))
}

/// Audit events implied by the change from `before` to `after`.
pub fn snapshot_events(
    before: &PanelSnapshot,
    after: &PanelSnapshot,
) -> Vec<(AuditEventType, serde_json::Value)> {
    let mut events = Vec::new();

    if before.health != after.health {
        let kind = if lowered(&before.health, &after.health) {
            AuditEventType::HealthDegraded
        } else {
            AuditEventType::HealthRestored
        };
        let details = HealthChangeDetails {
            alarm_register: after.last_alarm,
            health: after.health,
            previous: before.health,
        };
        if let Ok(value) = serde_json::to_value(details) {
            events.push((kind, value));
        }
    }

    events.extend(counter_event(
        AuditEventType::HomeReset,
        before.home_resets,
        after.home_resets,
        after.menu_depth,
    ));
    events.extend(counter_event(
        AuditEventType::IdleTimeout,
        before.idle_timeouts,
        after.idle_timeouts,
        after.menu_depth,
    ));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_audit_logger_writes_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        let logger = AuditLogger::new(&path).unwrap();
        logger
            .log_event(
                1000,
                1704067200000000,
                AuditEventType::PanelStart,
                serde_json::json!({"version": "0.1.0"}),
            )
            .unwrap();
        logger
            .log_event(
                2000,
                1704067201000000,
                AuditEventType::HomeReset,
                serde_json::json!({"count": 1}),
            )
            .unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();

        let lines: Vec<&str> = content.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"event_type\":\"panel_start\""));

        let entry: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(entry.timestamp_us, 2000);
        assert_eq!(entry.event_type, AuditEventType::HomeReset);
    }

    #[test]
    fn quiet_snapshots_produce_no_events() {
        let snapshot = PanelSnapshot {
            cycles_executed: 10,
            ..PanelSnapshot::default()
        };
        let mut later = snapshot;
        later.cycles_executed = 20;
        later.idle_count = 10;
        assert!(snapshot_events(&snapshot, &later).is_empty());
    }

    #[test]
    fn critical_alarm_is_a_degradation() {
        let before = PanelSnapshot::default();
        let mut after = before;
        after.last_alarm = 0x80;
        after.health = Health {
            status: false,
            alarm: true,
            fault: false,
        };

        let events = snapshot_events(&before, &after);
        assert_eq!(events.len(), 1);
        let (kind, details) = &events[0];
        assert_eq!(*kind, AuditEventType::HealthDegraded);
        assert_eq!(details["alarm_register"], 0x80);
        assert_eq!(details["health"]["fault"], false);

        let restored = snapshot_events(&after, &before);
        assert_eq!(restored[0].0, AuditEventType::HealthRestored);
    }

    #[test]
    fn counters_become_events_with_deltas() {
        let before = PanelSnapshot {
            home_resets: 1,
            ..PanelSnapshot::default()
        };
        let mut after = before;
        after.home_resets = 3;
        after.idle_timeouts = 1;

        let events = snapshot_events(&before, &after);
        let kinds: Vec<AuditEventType> = events.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, [AuditEventType::HomeReset, AuditEventType::IdleTimeout]);
        assert_eq!(events[0].1["count"], 2);
        assert_eq!(events[0].1["total"], 3);

        // Counters reset by a restart are not events.
        assert!(snapshot_events(&after, &PanelSnapshot::default()).is_empty());
    }
}
