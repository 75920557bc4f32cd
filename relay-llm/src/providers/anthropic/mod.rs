//! Anthropic Messages provider with tool use

mod client;
mod types;

pub use client::AnthropicClient;

use crate::{
    ChatMessage, ChatProvider, ChatResponse, ContentBlock, LlmConfig, StopReason, TokenUsage,
    ToolDefinition,
};
use async_trait::async_trait;
use relay_core::LlmError;
use tracing::debug;
use types::{ApiMessage, ApiTool, MessagesRequest, MessagesResponse};

/// Chat provider backed by the Anthropic Messages API.
pub struct AnthropicProvider {
    client: AnthropicClient,
    model: String,
    max_tokens: i32,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: AnthropicClient::new(config.api_key.clone(), config.requests_per_minute),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn build_request(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: messages.iter().map(ApiMessage::from).collect(),
            system: (!system.is_empty()).then(|| system.to_string()),
            tools: (!tools.is_empty()).then(|| tools.iter().map(ApiTool::from).collect()),
        }
    }
}

fn parse_stop_reason(raw: Option<&str>) -> Option<StopReason> {
    match raw {
        Some("end_turn") => Some(StopReason::EndTurn),
        Some("tool_use") => Some(StopReason::ToolUse),
        Some("max_tokens") => Some(StopReason::MaxTokens),
        Some("stop_sequence") => Some(StopReason::StopSequence),
        _ => None,
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        let request = self.build_request(system, messages, tools);
        debug!(model = %self.model, messages = messages.len(), "sending chat request");

        let response: MessagesResponse = self.client.request("messages", request).await?;

        debug!(
            response_id = %response.id,
            stop_reason = ?response.stop_reason,
            output_tokens = response.usage.output_tokens,
            "chat response received"
        );

        Ok(ChatResponse {
            content: response.content.into_iter().map(ContentBlock::from).collect(),
            stop_reason: parse_stop_reason(response.stop_reason.as_deref()),
            usage: Some(TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            }),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
