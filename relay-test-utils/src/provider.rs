//! Scripted chat provider
//!
//! Replays a queue of canned responses and records every request, so
//! turn-loop tests can both steer the conversation and assert on what
//! the model was shown.

use async_trait::async_trait;
use relay_core::LlmError;
use relay_llm::{
    ChatMessage, ChatProvider, ChatResponse, ContentBlock, StopReason, ToolDefinition,
};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One request the provider received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

/// Chat provider double replaying queued responses.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a terminal text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push_response(ChatResponse {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: Some(StopReason::EndTurn),
            usage: None,
        });
    }

    /// Queue a reply requesting a single tool call.
    pub fn push_tool_use(&self, id: impl Into<String>, name: impl Into<String>, input: JsonValue) {
        self.push_response(ChatResponse {
            content: vec![ContentBlock::ToolUse {
                id: id.into(),
                name: name.into(),
                input,
            }],
            stop_reason: Some(StopReason::ToolUse),
            usage: None,
        });
    }

    /// Queue an arbitrary response.
    pub fn push_response(&self, response: ChatResponse) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Ok(response));
    }

    /// Queue a provider failure.
    pub fn push_error(&self, error: LlmError) {
        self.script.lock().expect("script lock").push_back(Err(error));
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Number of responses still queued.
    pub fn remaining(&self) -> usize {
        self.script.lock().expect("script lock").len()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            system: system.to_string(),
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });

        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    message: "script exhausted".to_string(),
                })
            })
    }

    fn model(&self) -> &str {
        "scripted-test-model"
    }
}
