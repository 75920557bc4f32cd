//! The turn loop
//!
//! One inbound human message becomes one turn: the model is called with
//! the conversation and the tool catalog, tool calls are executed in
//! source order (consultations await a correlated response, task
//! handoffs return immediately), and the loop repeats until the model
//! stops asking for tools. Whatever happens, something is published on
//! `chatter-output` before the turn ends.

use crate::config::OrchestratorConfig;
use crate::conversation::ConversationStore;
use crate::prompt::SYSTEM_PROMPT;
use crate::status::StatusRegistry;
use crate::tools::{
    catalog, format_escalation, AssignTaskInput, CheckAgentStatusInput, EscalateInput,
    TOOL_ASSIGN_TASK, TOOL_CHECK_AGENT_STATUS, TOOL_CONSULT_PLANNER, TOOL_CONSULT_RESEARCHER,
    TOOL_ESCALATE_TO_HUMAN,
};
use crate::{CHATTER_AGENT, HUMAN_AGENT, SIBLING_AGENTS, WORKER_AGENTS};
use chrono::Utc;
use relay_bus::{Bus, CorrelationTable};
use relay_core::{
    agent_channel, to_payload, ChatterOutput, EntityIdType, Envelope, HumanInput, LlmError,
    MessageKind, RelayError, RelayResult, StatusReport, TaskAssignment, TaskId, AGENT_STATUS,
    HUMAN_INPUT,
};
use relay_llm::{ChatMessage, ChatProvider, ContentBlock};
use relay_store::{spawn_activity, spawn_log, ActivityRecord, ActivityStore, LogLevel, LogRecord};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The conversational coordinator agent.
pub struct Orchestrator {
    bus: Arc<dyn Bus>,
    provider: Arc<dyn ChatProvider>,
    store: Arc<dyn ActivityStore>,
    conversations: ConversationStore,
    pending: CorrelationTable,
    statuses: Arc<StatusRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        bus: Arc<dyn Bus>,
        provider: Arc<dyn ChatProvider>,
        store: Arc<dyn ActivityStore>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            provider,
            store,
            conversations: ConversationStore::new(config.history_cap, config.idle_timeout),
            pending: CorrelationTable::new(),
            statuses: Arc::new(StatusRegistry::new(config.status_expiry)),
            config,
        })
    }

    /// Number of turns currently held for a user. Exposed for tests and
    /// the status tool.
    pub fn turn_count(&self, user_id: &str) -> usize {
        self.conversations.turn_count(user_id)
    }

    /// Subscribe every channel and start the background workers. Returns
    /// once the subscriptions are registered; turns run on their own
    /// tasks from then on.
    pub async fn start(self: &Arc<Self>) -> RelayResult<()> {
        // Human input feeds a queue; the handler must not block.
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Envelope>();
        self.bus
            .subscribe(
                HUMAN_INPUT,
                Arc::new(move |envelope| {
                    let _ = input_tx.send(envelope);
                }),
            )
            .await?;

        // Responses arrive on the consulted agent's own channel.
        for sibling in SIBLING_AGENTS {
            let pending = self.pending.clone();
            self.bus
                .subscribe(
                    &agent_channel(sibling),
                    Arc::new(move |envelope| {
                        if envelope.kind != MessageKind::Response {
                            // Requests addressed to the sibling; not ours.
                            return;
                        }
                        match envelope.in_response_to {
                            Some(request_id) => {
                                pending.deliver(request_id, envelope.payload);
                            }
                            None => warn!(id = %envelope.id, "response without correlation id"),
                        }
                    }),
                )
                .await?;
        }

        // Worker heartbeats feed the status registry.
        let statuses = Arc::clone(&self.statuses);
        self.bus
            .subscribe(
                AGENT_STATUS,
                Arc::new(move |envelope| match envelope.payload_as::<StatusReport>() {
                    Ok(report) => statuses.observe(&envelope.from, report),
                    Err(e) => debug!(%e, "ignoring malformed status report"),
                }),
            )
            .await?;

        // Periodic sweep of conversations, stale correlation entries,
        // and expired status entries.
        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweeper.config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                sweeper.conversations.sweep();
                sweeper.pending.sweep();
                sweeper.statuses.sweep();
            }
        });

        // Turn dispatcher: each inbound message runs on its own task so
        // one slow turn never blocks the queue.
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(envelope) = input_rx.recv().await {
                let orchestrator = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    orchestrator.handle_input(envelope).await;
                });
            }
        });

        info!("orchestrator started");
        Ok(())
    }

    /// Validate and run one inbound envelope as a turn; failures become
    /// a user-visible apology, never a crash.
    async fn handle_input(self: Arc<Self>, envelope: Envelope) {
        let input: HumanInput = match envelope.payload_as() {
            Ok(input) => input,
            Err(e) => {
                warn!(id = %envelope.id, %e, "discarding malformed human input");
                return;
            }
        };

        info!(user_id = %input.user_id, "turn started");
        if let Err(e) = self.run_turn(&envelope, &input).await {
            error!(user_id = %input.user_id, error = %e, "turn failed");
            self.publish_output(
                &envelope,
                &input.user_id,
                &format!("I encountered an error: {e}"),
                true,
            )
            .await;
        }
    }

    /// The turn loop proper.
    async fn run_turn(&self, request: &Envelope, input: &HumanInput) -> RelayResult<()> {
        let user_id = &input.user_id;
        self.conversations
            .append(user_id, ChatMessage::user_text(&input.content));

        let tools = catalog();
        for round in 0..self.config.max_tool_iterations {
            let history = self.conversations.snapshot(user_id);
            let response = self.provider.chat(SYSTEM_PROMPT, &history, &tools).await?;

            let tool_uses: Vec<(String, String, JsonValue)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, tool_input)| {
                    (id.to_string(), name.to_string(), tool_input.clone())
                })
                .collect();

            if tool_uses.is_empty() {
                // Terminal reply: publish and exit the loop.
                let text = response.text();
                let reply = if text.trim().is_empty() {
                    "(no response)".to_string()
                } else {
                    text
                };
                self.conversations
                    .append(user_id, ChatMessage::assistant_text(&reply));
                self.publish_output(request, user_id, &reply, false).await;
                info!(user_id = %user_id, rounds = round, "turn finished");
                return Ok(());
            }

            // The assistant message carrying its tool_use blocks, then a
            // user message carrying the results, per the vendor protocol.
            self.conversations
                .append(user_id, ChatMessage::assistant(response.content.clone()));

            let mut results = Vec::with_capacity(tool_uses.len());
            for (tool_use_id, name, tool_input) in tool_uses {
                debug!(user_id = %user_id, tool = %name, "executing tool call");
                let (content, is_error) = match self.execute_tool(&name, &tool_input).await {
                    Ok(content) => (content, false),
                    Err(message) => {
                        warn!(user_id = %user_id, tool = %name, %message, "tool call failed");
                        (message, true)
                    }
                };
                results.push(ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                });
            }
            self.conversations
                .append(user_id, ChatMessage::tool_results(results));
        }

        Err(RelayError::Llm(LlmError::InvalidResponse {
            provider: self.provider.model().to_string(),
            reason: format!(
                "tool loop exceeded {} rounds without a terminal reply",
                self.config.max_tool_iterations
            ),
        }))
    }

    /// Dispatch one tool call. `Err` carries the message returned to the
    /// model as an error-flagged tool result.
    async fn execute_tool(&self, name: &str, input: &JsonValue) -> Result<String, String> {
        match name {
            TOOL_CONSULT_PLANNER => self.consult("planner", input).await,
            TOOL_CONSULT_RESEARCHER => self.consult("researcher", input).await,
            TOOL_ASSIGN_TASK => self.assign_task(input).await,
            TOOL_CHECK_AGENT_STATUS => {
                let args: CheckAgentStatusInput =
                    serde_json::from_value(input.clone()).map_err(|e| e.to_string())?;
                Ok(self.statuses.render(&args.agent))
            }
            TOOL_ESCALATE_TO_HUMAN => {
                let args: EscalateInput =
                    serde_json::from_value(input.clone()).map_err(|e| e.to_string())?;
                Ok(format_escalation(&args))
            }
            unknown => Err(format!("Unknown tool: {unknown}")),
        }
    }

    /// Correlated request against a sibling agent, bounded by the
    /// per-tool timeout.
    async fn consult(&self, target: &str, input: &JsonValue) -> Result<String, String> {
        if input.get("question").and_then(JsonValue::as_str).is_none() {
            return Err("tool input is missing required field 'question'".to_string());
        }

        let envelope = Envelope::question(CHATTER_AGENT, target, input.clone());
        // Track before publish: a response cannot race the registration.
        let pending = self
            .pending
            .track(envelope.id, target, self.config.tool_timeout);

        self.bus
            .publish(&agent_channel(target), &envelope)
            .await
            .map_err(|e| e.to_string())?;

        match pending.wait().await {
            Ok(payload) => Ok(serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|_| payload.to_string())),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Fire-and-forget task handoff; the acknowledgement goes straight
    /// back to the model.
    async fn assign_task(&self, input: &JsonValue) -> Result<String, String> {
        let args: AssignTaskInput =
            serde_json::from_value(input.clone()).map_err(|e| e.to_string())?;
        if !WORKER_AGENTS.contains(&args.agent.as_str()) {
            return Err(format!(
                "Unknown worker '{}'; tasks go to frontend or backend",
                args.agent
            ));
        }

        let task_id = TaskId::random();
        let assignment = TaskAssignment {
            task_id,
            command_file: args.command_file,
            timeout_ms: Some(self.config.task_timeout.as_millis() as i64),
            priority: args.priority,
            estimated_duration: args.estimated_duration,
        };
        let envelope = Envelope::task(CHATTER_AGENT, &args.agent, to_payload(&assignment));

        self.bus
            .publish(&agent_channel(&args.agent), &envelope)
            .await
            .map_err(|e| e.to_string())?;

        spawn_activity(
            &self.store,
            ActivityRecord::new(
                CHATTER_AGENT,
                args.agent.clone(),
                MessageKind::Task,
                envelope.payload.clone(),
            ),
        );

        Ok(format!(
            "Task {task_id} assigned to {}. It runs in the background; progress \
             streams on the bus and completion will be reported when the worker \
             finishes.",
            args.agent
        ))
    }

    /// Publish the user-visible reply (or apology) and its log row.
    async fn publish_output(&self, request: &Envelope, user_id: &str, content: &str, error: bool) {
        let output = ChatterOutput {
            user_id: user_id.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            error: error.then_some(true),
        };
        let envelope = Envelope::reply(
            CHATTER_AGENT,
            HUMAN_AGENT,
            request.id,
            to_payload(&output),
        );

        if let Err(e) = self
            .bus
            .publish(relay_core::CHATTER_OUTPUT, &envelope)
            .await
        {
            // Nothing further to do: the user simply does not hear back.
            error!(%user_id, error = %e, "failed to publish turn output");
            return;
        }

        spawn_activity(
            &self.store,
            ActivityRecord::new(
                CHATTER_AGENT,
                HUMAN_AGENT,
                MessageKind::Response,
                envelope.payload.clone(),
            ),
        );
        if error {
            spawn_log(
                &self.store,
                LogRecord::new(CHATTER_AGENT, LogLevel::Error, content),
            );
        }
    }
}
