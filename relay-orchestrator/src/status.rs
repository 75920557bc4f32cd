//! Heartbeat-backed worker status registry
//!
//! Supervisors publish a `status` envelope on `agent:status` roughly
//! every minute; the registry folds them into a map keyed by sender and
//! treats an entry as stale after two missed heartbeats. The
//! `check-agent-status` tool answers from here.

use relay_core::StatusReport;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct StatusEntry {
    report: StatusReport,
    observed_at: Instant,
}

/// Latest observed worker state per agent, with expiry.
pub struct StatusRegistry {
    expiry: Duration,
    map: Mutex<HashMap<String, StatusEntry>>,
}

impl StatusRegistry {
    pub fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Record a heartbeat from `agent`.
    pub fn observe(&self, agent: &str, report: StatusReport) {
        debug!(%agent, status = %report.status, "status heartbeat observed");
        lock(&self.map).insert(
            agent.to_string(),
            StatusEntry {
                report,
                observed_at: Instant::now(),
            },
        );
    }

    /// The last report from `agent`, unless it has expired.
    pub fn get(&self, agent: &str) -> Option<StatusReport> {
        let map = lock(&self.map);
        map.get(agent).and_then(|entry| {
            (entry.observed_at.elapsed() < self.expiry).then(|| entry.report.clone())
        })
    }

    /// Human-readable answer for the status tool.
    pub fn render(&self, agent: &str) -> String {
        match self.get(agent) {
            Some(report) => {
                let task = report
                    .current_task_id
                    .map(|id| format!(", current task {id}"))
                    .unwrap_or_default();
                format!(
                    "Agent {agent} is {}{task} ({} tasks completed, up {} seconds).",
                    report.status, report.completed_count, report.uptime_seconds
                )
            }
            None => format!("No recent status from agent {agent}; it may be offline."),
        }
    }

    /// Drop expired entries.
    pub fn sweep(&self) {
        let expiry = self.expiry;
        lock(&self.map).retain(|_, entry| entry.observed_at.elapsed() < expiry);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_report() -> StatusReport {
        StatusReport {
            status: "idle".to_string(),
            current_task_id: None,
            completed_count: 2,
            uptime_seconds: 90,
        }
    }

    #[test]
    fn test_observe_then_get() {
        let registry = StatusRegistry::new(Duration::from_secs(120));
        registry.observe("frontend", idle_report());

        let report = registry.get("frontend").expect("fresh entry");
        assert_eq!(report.status, "idle");
        assert!(registry.get("backend").is_none());
    }

    #[test]
    fn test_expired_entries_are_invisible() {
        let registry = StatusRegistry::new(Duration::from_millis(10));
        registry.observe("frontend", idle_report());
        std::thread::sleep(Duration::from_millis(25));

        assert!(registry.get("frontend").is_none());
        registry.sweep();
        assert!(lock(&registry.map).is_empty());
    }

    #[test]
    fn test_render_known_and_unknown() {
        let registry = StatusRegistry::new(Duration::from_secs(120));
        registry.observe("backend", idle_report());

        let known = registry.render("backend");
        assert!(known.contains("backend is idle"));
        assert!(known.contains("2 tasks completed"));

        let unknown = registry.render("archivist");
        assert!(unknown.contains("No recent status"));
    }
}
