//! Bounded log of recent market activity
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actor::{ActorReport, Role};

/// Number of entries kept; older entries are discarded
pub const LOG_CAPACITY: usize = 100;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    SystemStatus,
    TicketAdded,
    TicketSold,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_amount: Option<u64>,
}

/// Most recent entries first
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change of the market as a whole
    pub fn system(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.push(LogEntry {
            timestamp: now(),
            kind: LogKind::SystemStatus,
            message,
            actor_id: None,
            ticket_amount: None,
        });
    }

    /// Record the final count of an actor that has stopped
    pub fn actor_exit(&mut self, report: &ActorReport) {
        let (kind, message) = match report.role {
            Role::Vendor => (
                LogKind::TicketAdded,
                format!(
                    "Vendor {} added {} ticket(s) to the pool",
                    report.id, report.handled
                ),
            ),
            Role::Customer => (
                LogKind::TicketSold,
                format!("Customer {} bought {} ticket(s)", report.id, report.handled),
            ),
        };
        info!(reason = ?report.reason, "{message}");
        self.push(LogEntry {
            timestamp: now(),
            kind,
            message,
            actor_id: Some(report.id.clone()),
            ticket_amount: Some(report.handled),
        });
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: LogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(LOG_CAPACITY);
    }
}

fn now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ExitReason;

    #[test]
    fn keeps_newest_entries() {
        let mut log = ActivityLog::new();
        for i in 0..LOG_CAPACITY + 5 {
            log.system(format!("entry {i}"));
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        let entries = log.entries();
        assert_eq!(entries[0].message, format!("entry {}", LOG_CAPACITY + 4));
        assert_eq!(entries[LOG_CAPACITY - 1].message, "entry 5");
    }

    #[test]
    fn actor_exit_carries_amount() {
        let mut log = ActivityLog::new();
        log.actor_exit(&ActorReport {
            id: "C-00000001".into(),
            role: Role::Customer,
            handled: 3,
            reason: ExitReason::Cancelled,
        });
        let entry = &log.entries()[0];
        assert_eq!(entry.kind, LogKind::TicketSold);
        assert_eq!(entry.actor_id.as_deref(), Some("C-00000001"));
        assert_eq!(entry.ticket_amount, Some(3));
        assert_eq!(entry.message, "Customer C-00000001 bought 3 ticket(s)");
    }
}
