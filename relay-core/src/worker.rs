//! Worker supervisor state
//!
//! A supervisor owns exactly one agent identity and runs at most one
//! subprocess at a time; [`WorkerState`] is the single value tracking
//! that. The transition methods are the only way to mutate it, which is
//! what keeps the `current`-iff-`working` invariant honest.

use crate::error::WorkerError;
use crate::identity::{TaskId, Timestamp};
use crate::payload::StatusReport;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// STATUS
// ============================================================================

/// Lifecycle states of a worker supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerStatus {
    /// Connecting and running startup checks.
    Starting,
    /// Ready for a task.
    Idle,
    /// Exactly one subprocess is running.
    Working,
    /// Draining after a shutdown signal.
    ShuttingDown,
    /// Final state published just before exit.
    Offline,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Starting => "starting",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Working => "working",
            WorkerStatus::ShuttingDown => "shutting-down",
            WorkerStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// STATE
// ============================================================================

/// The task a worker is currently executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTask {
    pub task_id: TaskId,
    pub started_at: Timestamp,
}

/// Single-valued state of one supervisor process.
///
/// Invariant: `current.is_some()` iff `status == Working`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerState {
    pub status: WorkerStatus,
    pub current: Option<CurrentTask>,
    pub completed_count: u64,
    pub uptime_started_at: Timestamp,
}

impl WorkerState {
    /// Fresh state at process start.
    pub fn starting() -> Self {
        Self {
            status: WorkerStatus::Starting,
            current: None,
            completed_count: 0,
            uptime_started_at: Utc::now(),
        }
    }

    /// Startup checks passed; ready for tasks.
    pub fn mark_ready(&mut self) -> Result<(), WorkerError> {
        match self.status {
            WorkerStatus::Starting => {
                self.status = WorkerStatus::Idle;
                Ok(())
            }
            other => Err(invalid(other, WorkerStatus::Idle)),
        }
    }

    /// Accept a task. Fails unless idle.
    pub fn begin_task(&mut self, task_id: TaskId) -> Result<(), WorkerError> {
        match self.status {
            WorkerStatus::Idle => {
                self.status = WorkerStatus::Working;
                self.current = Some(CurrentTask {
                    task_id,
                    started_at: Utc::now(),
                });
                Ok(())
            }
            other => Err(invalid(other, WorkerStatus::Working)),
        }
    }

    /// Subprocess exited; return to idle and bump the counter.
    pub fn finish_task(&mut self) -> Result<(), WorkerError> {
        match self.status {
            WorkerStatus::Working => {
                self.status = WorkerStatus::Idle;
                self.current = None;
                self.completed_count += 1;
                Ok(())
            }
            // A shutdown can land while the last task drains; the
            // terminal envelope still has to go out.
            WorkerStatus::ShuttingDown => {
                self.current = None;
                self.completed_count += 1;
                Ok(())
            }
            other => Err(invalid(other, WorkerStatus::Idle)),
        }
    }

    /// A termination signal arrived. Legal from any live state.
    pub fn begin_shutdown(&mut self) {
        if self.status != WorkerStatus::Offline {
            self.status = WorkerStatus::ShuttingDown;
        }
    }

    /// Final transition, published just before exit.
    pub fn go_offline(&mut self) {
        self.status = WorkerStatus::Offline;
        self.current = None;
    }

    /// Whether a task can be accepted right now.
    pub fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle
    }

    /// Whether a subprocess is live.
    pub fn is_working(&self) -> bool {
        self.status == WorkerStatus::Working
    }

    /// Seconds since process start.
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.uptime_started_at).num_seconds().max(0) as u64
    }

    /// The heartbeat payload for the current state.
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            status: self.status.as_str().to_string(),
            current_task_id: self.current.as_ref().map(|c| c.task_id),
            completed_count: self.completed_count,
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

fn invalid(from: WorkerStatus, to: WorkerStatus) -> WorkerError {
    WorkerError::InvalidTransition {
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityIdType;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = WorkerState::starting();
        assert_eq!(state.status, WorkerStatus::Starting);

        state.mark_ready().expect("starting -> idle");
        assert!(state.is_idle());
        assert!(state.current.is_none());

        let task_id = TaskId::random();
        state.begin_task(task_id).expect("idle -> working");
        assert!(state.is_working());
        assert_eq!(state.current.as_ref().map(|c| c.task_id), Some(task_id));

        state.finish_task().expect("working -> idle");
        assert!(state.is_idle());
        assert!(state.current.is_none());
        assert_eq!(state.completed_count, 1);
    }

    #[test]
    fn test_current_iff_working() {
        let mut state = WorkerState::starting();
        state.mark_ready().expect("ready");
        state.begin_task(TaskId::random()).expect("begin");

        // Every live state observes the invariant
        assert_eq!(state.is_working(), state.current.is_some());
        state.finish_task().expect("finish");
        assert_eq!(state.is_working(), state.current.is_some());
    }

    #[test]
    fn test_busy_worker_rejects_second_task() {
        let mut state = WorkerState::starting();
        state.mark_ready().expect("ready");
        state.begin_task(TaskId::random()).expect("first task");

        let err = state.begin_task(TaskId::random()).unwrap_err();
        assert!(matches!(err, WorkerError::InvalidTransition { .. }));
        // The first task is unaffected
        assert!(state.is_working());
        assert_eq!(state.completed_count, 0);
    }

    #[test]
    fn test_shutdown_mid_task_still_counts_completion() {
        let mut state = WorkerState::starting();
        state.mark_ready().expect("ready");
        state.begin_task(TaskId::random()).expect("begin");

        state.begin_shutdown();
        assert_eq!(state.status, WorkerStatus::ShuttingDown);

        // The draining child finishes and its completion is recorded
        state.finish_task().expect("drain");
        assert_eq!(state.completed_count, 1);
        assert!(state.current.is_none());

        state.go_offline();
        assert_eq!(state.status, WorkerStatus::Offline);
    }

    #[test]
    fn test_status_report_shape() {
        let mut state = WorkerState::starting();
        state.mark_ready().expect("ready");
        let task_id = TaskId::random();
        state.begin_task(task_id).expect("begin");

        let report = state.status_report();
        assert_eq!(report.status, "working");
        assert_eq!(report.current_task_id, Some(task_id));
        assert_eq!(report.completed_count, 0);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(WorkerStatus::ShuttingDown.as_str(), "shutting-down");
        let json = serde_json::to_string(&WorkerStatus::ShuttingDown).expect("serialize");
        assert_eq!(json, "\"shutting-down\"");
    }
}
