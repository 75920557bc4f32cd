//! RELAY LLM - Chat Provider Abstraction
//!
//! The orchestrator drives a tool-calling conversation loop against a
//! [`ChatProvider`]. The production implementation talks to the Anthropic
//! Messages API; tests use the scripted provider from relay-test-utils.

pub mod providers;

pub use providers::anthropic::AnthropicProvider;

use async_trait::async_trait;
use relay_core::{env_parse, env_string, ConfigError, LlmError, RequiredVars};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ============================================================================
// MESSAGE TYPES
// ============================================================================

/// Conversation roles. Tool results travel in `user`-role messages, per
/// the Anthropic tool-use protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content block of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },
    /// The model requests a tool invocation.
    ToolUse {
        id: String,
        name: String,
        input: JsonValue,
    },
    /// The result of a tool invocation, echoed back to the model.
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    /// A plain-text user message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// A plain-text assistant message.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// An assistant message carrying the model's reply blocks verbatim.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A user message carrying tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }

    /// Concatenated text blocks of this message.
    pub fn text(&self) -> String {
        collect_text(&self.content)
    }
}

/// Concatenate the text segments of a block sequence.
pub fn collect_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// One model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// The tool-use blocks of this reply, in source order.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &JsonValue)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    /// Whether the model requested any tools.
    pub fn wants_tools(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse) || !self.tool_uses().is_empty()
    }

    /// Concatenated text segments of the reply.
    pub fn text(&self) -> String {
        collect_text(&self.content)
    }
}

// ============================================================================
// TOOLS
// ============================================================================

/// One entry of the tool catalog handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's input object.
    pub input_schema: JsonValue,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: JsonValue,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// A chat model with tool calling.
#[async_trait]
pub trait ChatProvider: Send + Sync + 'static {
    /// One model invocation over the full conversation.
    async fn chat(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError>;

    /// The model identifier in use.
    fn model(&self) -> &str;
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// LLM provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Anthropic API key. Required.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Completion cap per call.
    pub max_tokens: i32,
    /// Client-side rate limit, requests per minute.
    pub requests_per_minute: u32,
}

impl LlmConfig {
    /// Create from environment variables.
    ///
    /// - `RELAY_ANTHROPIC_API_KEY`: provider credentials (required)
    /// - `RELAY_MODEL`: model identifier (default: claude-sonnet-4-20250514)
    /// - `RELAY_MAX_TOKENS`: completion cap (default: 4096)
    /// - `RELAY_LLM_RPM`: client-side rate limit (default: 50)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut required = RequiredVars::new();
        let api_key = required.take("RELAY_ANTHROPIC_API_KEY");
        required.finish()?;

        Ok(Self {
            api_key,
            model: env_string("RELAY_MODEL", "claude-sonnet-4-20250514"),
            max_tokens: env_parse("RELAY_MAX_TOKENS", 4096),
            requests_per_minute: env_parse("RELAY_LLM_RPM", 50),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
