//! End-to-end supervisor tests
//!
//! The supervisor runs against the in-memory bus and store with a shell
//! script standing in for the external tool. Unix-only: the scripts rely
//! on /bin/sh and exec permissions.

#![cfg(unix)]

use relay_bus::Bus;
use relay_core::{
    agent_channel, to_payload, BroadcastCommand, EntityIdType, Envelope, ProgressUpdate,
    StatusReport, TaskAssignment, TaskCompletion, TaskId, TaskOutcome, TaskRejection,
    WorkerStatus, AGENT_PROGRESS, AGENT_STATUS, BROADCAST,
};
use relay_store::ActivityStore;
use relay_supervisor::{Supervisor, SupervisorConfig};
use relay_test_utils::{MemoryBus, MemoryStore};
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// SUPPORT
// ============================================================================

/// Install a fake external tool. It answers the `--version` startup
/// probe and otherwise runs `body` with `$1` bound to the command file.
fn install_tool(repo: &TempDir, body: &str) -> String {
    let path = repo.path().join("fake-tool.sh");
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo fake-tool 1.0; exit 0; fi\n{body}\n"
    );
    std::fs::write(&path, script).expect("write tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path.display().to_string()
}

fn test_config(repo: &TempDir, tool: String) -> SupervisorConfig {
    SupervisorConfig {
        agent_name: "frontend".to_string(),
        repo_path: repo.path().to_path_buf(),
        command_file: ".claude-command.md".to_string(),
        tool_path: tool,
        task_timeout: Duration::from_secs(10),
        heartbeat_interval: Duration::from_secs(60),
        shutdown_grace: Duration::from_secs(5),
        kill_grace: Duration::from_millis(500),
    }
}

struct TestRig {
    bus: MemoryBus,
    supervisor: Arc<Supervisor>,
    repo: TempDir,
    shutdown_rx: tokio::sync::mpsc::UnboundedReceiver<String>,
}

async fn start_supervisor(body: &str) -> TestRig {
    let repo = TempDir::new().expect("tempdir");
    let tool = install_tool(&repo, body);
    let bus = MemoryBus::new();
    let store = Arc::new(MemoryStore::new());

    let supervisor = Supervisor::new(
        Arc::new(bus.clone()),
        store as Arc<dyn ActivityStore>,
        test_config(&repo, tool),
    );
    let shutdown_rx = supervisor.start().await.expect("supervisor starts");

    TestRig {
        bus,
        supervisor,
        repo,
        shutdown_rx,
    }
}

fn task_envelope(command_file: &str, timeout_ms: Option<i64>) -> (Envelope, TaskId) {
    let task_id = TaskId::random();
    let assignment = TaskAssignment {
        task_id,
        command_file: command_file.to_string(),
        timeout_ms,
        priority: None,
        estimated_duration: None,
    };
    (
        Envelope::task("chatter", "frontend", to_payload(&assignment)),
        task_id,
    )
}

async fn wait_for<F: Fn() -> bool>(condition: F, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Responses the supervisor sent back to the orchestrator's channel.
fn responses(bus: &MemoryBus) -> Vec<Envelope> {
    bus.published_on(&agent_channel("chatter"))
}

// ============================================================================
// TASK EXECUTION
// ============================================================================

#[tokio::test]
async fn task_runs_to_completion_with_progress_and_cleanup() {
    let rig = start_supervisor("cat \"$1\"").await;
    let (envelope, task_id) = task_envelope("# Build the widget\nstep one", None);

    rig.bus
        .publish(&agent_channel("frontend"), &envelope)
        .await
        .expect("publish task");

    wait_for(|| !responses(&rig.bus).is_empty(), "terminal envelope").await;

    let terminal = &responses(&rig.bus)[0];
    assert_eq!(terminal.in_response_to, Some(envelope.id));
    let completion: TaskCompletion = terminal.payload_as().expect("completion payload");
    assert_eq!(completion.task_id, task_id);
    assert_eq!(completion.status, TaskOutcome::Completed);
    assert_eq!(completion.result.exit_code, 0);
    assert!(completion.result.stdout.contains("step one"));
    assert!(completion.duration_ms >= 0);

    // Progress was streamed for the task
    let progress = rig.bus.published_on(AGENT_PROGRESS);
    assert!(!progress.is_empty());
    let update: ProgressUpdate = progress[0].payload_as().expect("progress payload");
    assert_eq!(update.task_id, task_id);

    // The scratch file is gone and the worker is idle again
    assert!(!rig.repo.path().join(".claude-command.md").exists());
    wait_for(
        || rig.supervisor.state().status == WorkerStatus::Idle,
        "worker back to idle",
    )
    .await;
    assert_eq!(rig.supervisor.state().completed_count, 1);
}

#[tokio::test]
async fn failing_tool_reports_failed_with_exit_code() {
    let rig = start_supervisor("echo broken >&2; exit 3").await;
    let (envelope, _task_id) = task_envelope("# doomed", None);

    rig.bus
        .publish(&agent_channel("frontend"), &envelope)
        .await
        .expect("publish task");

    wait_for(|| !responses(&rig.bus).is_empty(), "terminal envelope").await;
    let completion: TaskCompletion = responses(&rig.bus)[0].payload_as().expect("payload");
    assert_eq!(completion.status, TaskOutcome::Failed);
    assert_eq!(completion.result.exit_code, 3);
    assert!(completion.result.stderr.contains("broken"));
}

#[tokio::test]
async fn per_task_timeout_terminates_long_jobs() {
    let rig = start_supervisor("sleep 30").await;
    let (envelope, _task_id) = task_envelope("# slow", Some(300));

    let started = std::time::Instant::now();
    rig.bus
        .publish(&agent_channel("frontend"), &envelope)
        .await
        .expect("publish task");

    wait_for(|| !responses(&rig.bus).is_empty(), "terminal envelope").await;
    assert!(started.elapsed() < Duration::from_secs(5));
    let completion: TaskCompletion = responses(&rig.bus)[0].payload_as().expect("payload");
    assert_eq!(completion.status, TaskOutcome::Failed);
}

// ============================================================================
// BUSY REJECTION
// ============================================================================

#[tokio::test]
async fn busy_worker_rejects_second_task_immediately() {
    let rig = start_supervisor("sleep 1").await;
    let (first, _first_id) = task_envelope("# task A", None);

    rig.bus
        .publish(&agent_channel("frontend"), &first)
        .await
        .expect("publish first");
    wait_for(
        || rig.supervisor.state().status == WorkerStatus::Working,
        "worker busy",
    )
    .await;

    let (second, _second_id) = task_envelope("# task B", None);
    rig.bus
        .publish(&agent_channel("frontend"), &second)
        .await
        .expect("publish second");

    // The rejection lands promptly, long before task A finishes
    wait_for(|| !responses(&rig.bus).is_empty(), "rejection envelope").await;
    let rejection_envelope = &responses(&rig.bus)[0];
    assert_eq!(rejection_envelope.in_response_to, Some(second.id));
    let rejection: TaskRejection = rejection_envelope.payload_as().expect("rejection payload");
    assert_eq!(rejection.status, "rejected");
    assert_eq!(rejection.reason, "Worker is busy");

    // Task A is unaffected and completes afterwards
    wait_for(|| responses(&rig.bus).len() == 2, "first task terminal").await;
    let completion: TaskCompletion = responses(&rig.bus)[1].payload_as().expect("payload");
    assert_eq!(completion.status, TaskOutcome::Completed);
    assert_eq!(rig.supervisor.state().completed_count, 1);
}

// ============================================================================
// PROTOCOL EDGES
// ============================================================================

#[tokio::test]
async fn invalid_task_payload_is_dropped_silently() {
    let rig = start_supervisor("cat \"$1\"").await;

    let garbage = Envelope::task("chatter", "frontend", serde_json::json!({"nope": true}));
    rig.bus
        .publish(&agent_channel("frontend"), &garbage)
        .await
        .expect("publish garbage");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(responses(&rig.bus).is_empty());

    // And the worker still takes real tasks afterwards
    let (valid, _) = task_envelope("# real work", None);
    rig.bus
        .publish(&agent_channel("frontend"), &valid)
        .await
        .expect("publish valid");
    wait_for(|| !responses(&rig.bus).is_empty(), "terminal envelope").await;
}

#[tokio::test]
async fn status_heartbeats_track_the_lifecycle() {
    let rig = start_supervisor("sleep 0.3").await;

    // The ready heartbeat is published at startup
    wait_for(|| !rig.bus.published_on(AGENT_STATUS).is_empty(), "ready status").await;
    let first: StatusReport = rig.bus.published_on(AGENT_STATUS)[0]
        .payload_as()
        .expect("status payload");
    assert_eq!(first.status, "idle");

    let (envelope, task_id) = task_envelope("# watch me", None);
    rig.bus
        .publish(&agent_channel("frontend"), &envelope)
        .await
        .expect("publish task");

    wait_for(
        || {
            rig.bus
                .published_on(AGENT_STATUS)
                .iter()
                .filter_map(|e| e.payload_as::<StatusReport>().ok())
                .any(|report| report.status == "working")
        },
        "working status",
    )
    .await;

    let working: StatusReport = rig
        .bus
        .published_on(AGENT_STATUS)
        .iter()
        .filter_map(|e| e.payload_as::<StatusReport>().ok())
        .find(|report| report.status == "working")
        .expect("working report");
    assert_eq!(working.current_task_id, Some(task_id));
}

// ============================================================================
// SHUTDOWN
// ============================================================================

#[tokio::test]
async fn broadcast_shutdown_drains_and_goes_offline() {
    let mut rig = start_supervisor("cat \"$1\"").await;

    let command = BroadcastCommand {
        command: "shutdown".to_string(),
        reason: Some("test teardown".to_string()),
    };
    rig.bus
        .publish(BROADCAST, &Envelope::status("tester", to_payload(&command)))
        .await
        .expect("publish shutdown");

    // The broadcast surfaces through the receiver start() handed out;
    // acting on it is the caller's job, exactly as in main().
    let reason = tokio::time::timeout(Duration::from_secs(2), rig.shutdown_rx.recv())
        .await
        .expect("shutdown signal within deadline")
        .expect("channel open");
    assert_eq!(reason, "test teardown");

    rig.supervisor.shutdown().await;
    assert_eq!(rig.supervisor.state().status, WorkerStatus::Offline);
    let last: StatusReport = rig
        .bus
        .published_on(AGENT_STATUS)
        .last()
        .expect("final status")
        .payload_as()
        .expect("payload");
    assert_eq!(last.status, "offline");
    assert!(!rig.bus.is_connected());
}
