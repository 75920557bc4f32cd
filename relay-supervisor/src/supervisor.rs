//! The supervisor daemon
//!
//! One agent identity, one subprocess at a time. Tasks arrive on the
//! agent's own channel through a queue so the bus handler never blocks;
//! the dispatcher executes them strictly sequentially, which is what
//! makes the busy-rejection simple: any task that arrives while one is
//! running is answered immediately with a rejection envelope.

use crate::config::SupervisorConfig;
use crate::runner::{self, OutputLine, OutputSource};
use crate::startup;
use relay_bus::Bus;
use relay_core::{
    agent_channel, to_payload, BroadcastCommand, Envelope, MessageKind, ProcessResult,
    RelayResult, TaskAssignment, TaskCompletion, TaskOutcome, TaskRejection, WorkerState,
    AGENT_PROGRESS, AGENT_STATUS, BROADCAST,
};
use relay_store::{spawn_log, ActivityStore, LogLevel, LogRecord};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The worker supervisor.
pub struct Supervisor {
    config: SupervisorConfig,
    bus: Arc<dyn Bus>,
    store: Arc<dyn ActivityStore>,
    state: Mutex<WorkerState>,
}

impl Supervisor {
    pub fn new(
        bus: Arc<dyn Bus>,
        store: Arc<dyn ActivityStore>,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            bus,
            store,
            state: Mutex::new(WorkerState::starting()),
        })
    }

    /// Current state snapshot, for tests and observability.
    pub fn state(&self) -> WorkerState {
        lock(&self.state).clone()
    }

    /// Run startup checks, subscribe, and start the background tasks.
    ///
    /// Returns a receiver that fires when a broadcast shutdown command
    /// arrives; the caller selects over it and process signals.
    pub async fn start(self: &Arc<Self>) -> RelayResult<mpsc::UnboundedReceiver<String>> {
        // Startup checks, all fatal.
        startup::probe_tool(&self.config.tool_path).await?;
        startup::check_repo(&self.config.repo_path)?;
        self.config.validate()?;
        let latency = self.bus.ping().await?;
        debug!(latency_ms = latency.as_millis() as u64, "bus liveness ok");

        // Task intake queue.
        let (task_tx, mut task_rx) = mpsc::unbounded_channel::<Envelope>();
        self.bus
            .subscribe(
                &agent_channel(&self.config.agent_name),
                Arc::new(move |envelope| {
                    // Responses we publish come back on this channel too;
                    // only task envelopes belong in the queue.
                    if envelope.kind == MessageKind::Task {
                        let _ = task_tx.send(envelope);
                    }
                }),
            )
            .await?;

        // Broadcast shutdown commands.
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel::<String>();
        self.bus
            .subscribe(
                BROADCAST,
                Arc::new(move |envelope| {
                    if let Ok(command) = envelope.payload_as::<BroadcastCommand>() {
                        if command.is_shutdown() {
                            let reason = command
                                .reason
                                .unwrap_or_else(|| format!("broadcast from {}", envelope.from));
                            let _ = shutdown_tx.send(reason);
                        }
                    }
                }),
            )
            .await?;

        // Ready: starting -> idle, announced immediately.
        lock(&self.state).mark_ready()?;
        self.publish_status().await;
        info!(
            agent = %self.config.agent_name,
            repo = %self.config.repo_path.display(),
            "supervisor ready"
        );

        // Periodic status heartbeat.
        let heartbeat = Arc::clone(self);
        tokio::spawn(async move {
            let period = heartbeat.config.heartbeat_interval;
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                heartbeat.publish_status().await;
            }
        });

        // Sequential task dispatcher.
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(envelope) = task_rx.recv().await {
                dispatcher.handle_task(envelope).await;
            }
        });

        Ok(shutdown_rx)
    }

    /// Handle one task envelope end to end.
    async fn handle_task(self: &Arc<Self>, envelope: Envelope) {
        let assignment: TaskAssignment = match envelope.payload_as() {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!(id = %envelope.id, %e, "discarding invalid task message");
                spawn_log(
                    &self.store,
                    LogRecord::new(
                        &self.config.agent_name,
                        LogLevel::Warn,
                        format!("invalid task message: {e}"),
                    ),
                );
                return;
            }
        };

        // One job per worker: anything arriving while busy is rejected
        // on the sender's channel, immediately.
        let accepted = {
            let mut state = lock(&self.state);
            state.is_idle() && state.begin_task(assignment.task_id).is_ok()
        };
        if !accepted {
            warn!(task_id = %assignment.task_id, "rejecting task, worker is busy");
            let rejection =
                Envelope::response_to(&envelope, &self.config.agent_name, to_payload(&TaskRejection::busy()));
            if let Err(e) = self
                .bus
                .publish(&agent_channel(&envelope.from), &rejection)
                .await
            {
                error!(%e, "failed to publish rejection");
            }
            return;
        }

        // Execution runs on its own task so the dispatcher returns to
        // the queue immediately; the next arrival finds `working` and is
        // rejected within its own handler pass.
        info!(task_id = %assignment.task_id, "task accepted");
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            supervisor.run_accepted_task(envelope, assignment).await;
        });
    }

    /// Execute an accepted task and publish its terminal envelope.
    async fn run_accepted_task(self: Arc<Self>, envelope: Envelope, assignment: TaskAssignment) {
        self.publish_status().await;
        let execution = self.execute(&assignment).await;

        // Terminal envelope, whatever happened.
        let completion = match execution {
            Ok(execution) => TaskCompletion {
                task_id: assignment.task_id,
                status: execution.outcome,
                result: ProcessResult {
                    exit_code: execution.exit_code,
                    stdout: execution.stdout,
                    stderr: execution.stderr,
                },
                duration_ms: execution.duration_ms,
            },
            Err(e) => {
                error!(task_id = %assignment.task_id, error = %e, "task execution failed");
                TaskCompletion {
                    task_id: assignment.task_id,
                    status: TaskOutcome::Failed,
                    result: ProcessResult {
                        exit_code: -1,
                        stdout: String::new(),
                        stderr: e.to_string(),
                    },
                    duration_ms: 0,
                }
            }
        };

        let terminal =
            Envelope::response_to(&envelope, &self.config.agent_name, to_payload(&completion));
        if let Err(e) = self
            .bus
            .publish(&agent_channel(&envelope.from), &terminal)
            .await
        {
            error!(%e, "failed to publish task completion");
        }
        spawn_log(
            &self.store,
            LogRecord::new(
                &self.config.agent_name,
                match completion.status {
                    TaskOutcome::Completed => LogLevel::Info,
                    TaskOutcome::Failed => LogLevel::Error,
                },
                format!("task {} {}", completion.task_id, completion.status),
            )
            .with_metadata(json!({
                "exit_code": completion.result.exit_code,
                "duration_ms": completion.duration_ms,
            })),
        );

        if let Err(e) = lock(&self.state).finish_task() {
            error!(%e, "state transition after task");
        }
        self.publish_status().await;
    }

    /// Materialize the command file, run the tool, stream output, clean
    /// up the scratch file.
    async fn execute(
        self: &Arc<Self>,
        assignment: &TaskAssignment,
    ) -> Result<crate::runner::TaskExecution, relay_core::WorkerError> {
        let command_path = self.config.command_path();
        tokio::fs::write(&command_path, &assignment.command_file)
            .await
            .map_err(|e| relay_core::WorkerError::CommandFileWrite {
                path: command_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let timeout = assignment
            .timeout_ms
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or(self.config.task_timeout);

        // Progress publisher: drains the line channel until the readers
        // close it.
        let (output_tx, mut output_rx) = mpsc::unbounded_channel::<OutputLine>();
        let publisher = {
            let bus = Arc::clone(&self.bus);
            let store = Arc::clone(&self.store);
            let agent = self.config.agent_name.clone();
            let task_id = assignment.task_id;
            tokio::spawn(async move {
                while let Some(line) = output_rx.recv().await {
                    let update = relay_core::ProgressUpdate {
                        task_id,
                        output: line.text.clone(),
                    };
                    let envelope = Envelope::progress(&agent, to_payload(&update));
                    if let Err(e) = bus.publish(AGENT_PROGRESS, &envelope).await {
                        warn!(%e, "failed to publish progress");
                    }
                    let level = match line.source {
                        OutputSource::Stdout => LogLevel::Info,
                        OutputSource::Stderr => LogLevel::Warn,
                    };
                    spawn_log(
                        &store,
                        LogRecord::new(&agent, level, &line.text)
                            .with_metadata(json!({ "task_id": task_id })),
                    );
                }
            })
        };

        let execution = runner::run_task(
            &self.config.tool_path,
            &self.config.repo_path,
            &command_path,
            timeout,
            self.config.kill_grace,
            output_tx,
        )
        .await;

        // All senders are gone once run_task returns; let the publisher
        // drain what is buffered.
        let _ = publisher.await;

        if let Err(e) = tokio::fs::remove_file(&command_path).await {
            warn!(path = %command_path.display(), %e, "failed to delete command file");
        }

        execution
    }

    /// Publish the worker state on the shared status channel.
    pub async fn publish_status(&self) {
        let report = lock(&self.state).status_report();
        let envelope = Envelope::status(&self.config.agent_name, to_payload(&report));
        if let Err(e) = self.bus.publish(AGENT_STATUS, &envelope).await {
            warn!(%e, "failed to publish status heartbeat");
        }
    }

    /// Drain and exit: wait up to the grace window for the current task,
    /// then announce offline and release the bus.
    pub async fn shutdown(&self) {
        info!(agent = %self.config.agent_name, "shutting down");
        lock(&self.state).begin_shutdown();
        self.publish_status().await;

        let deadline = Instant::now() + self.config.shutdown_grace;
        while Instant::now() < deadline {
            if lock(&self.state).current.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if lock(&self.state).current.is_some() {
            warn!("task still running at grace deadline, going offline anyway");
        }

        lock(&self.state).go_offline();
        self.publish_status().await;
        if let Err(e) = self.bus.close().await {
            warn!(%e, "bus close failed");
        }
        info!(agent = %self.config.agent_name, "offline");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
