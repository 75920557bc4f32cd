//! The tool catalog
//!
//! The five tools the model may choose among are part of the observable
//! contract; names, required inputs, and schemas live here, along with
//! the typed input structs and the escalation formatter.

use relay_llm::ToolDefinition;
use serde::Deserialize;
use serde_json::json;

// ============================================================================
// TOOL NAMES
// ============================================================================

pub const TOOL_CONSULT_PLANNER: &str = "consult-planner";
pub const TOOL_CONSULT_RESEARCHER: &str = "consult-researcher";
pub const TOOL_ASSIGN_TASK: &str = "assign-task";
pub const TOOL_CHECK_AGENT_STATUS: &str = "check-agent-status";
pub const TOOL_ESCALATE_TO_HUMAN: &str = "escalate-to-human";

// ============================================================================
// CATALOG
// ============================================================================

/// The fixed catalog handed to the model on every call.
pub fn catalog() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            TOOL_CONSULT_PLANNER,
            "Ask the planner agent for strategic breakdown and coordination of work.",
            json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to put to the planner"
                    },
                    "context": {
                        "type": "string",
                        "description": "Relevant background for the question"
                    },
                    "priority": {
                        "type": "string",
                        "enum": ["low", "medium", "high"]
                    }
                },
                "required": ["question"]
            }),
        ),
        ToolDefinition::new(
            TOOL_CONSULT_RESEARCHER,
            "Ask the researcher agent to analyze existing code snapshots.",
            json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The analysis question"
                    },
                    "repos": {
                        "type": "string",
                        "enum": ["frontend", "backend", "both"],
                        "description": "Which repositories to analyze"
                    },
                    "focus_areas": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Specific areas to focus the analysis on"
                    }
                },
                "required": ["question", "repos"]
            }),
        ),
        ToolDefinition::new(
            TOOL_ASSIGN_TASK,
            "Hand off an implementation job to a worker agent. Returns immediately; \
             the worker streams progress and reports completion on the bus.",
            json!({
                "type": "object",
                "properties": {
                    "agent": {
                        "type": "string",
                        "enum": ["frontend", "backend"],
                        "description": "Which worker executes the task"
                    },
                    "command_file": {
                        "type": "string",
                        "description": "Full markdown command payload for the worker"
                    },
                    "priority": {
                        "type": "string",
                        "enum": ["low", "medium", "high"]
                    },
                    "estimated_duration": {
                        "type": "string",
                        "description": "Rough expected duration, e.g. '20m'"
                    }
                },
                "required": ["agent", "command_file"]
            }),
        ),
        ToolDefinition::new(
            TOOL_CHECK_AGENT_STATUS,
            "Check whether an agent is alive and what it is doing.",
            json!({
                "type": "object",
                "properties": {
                    "agent": {
                        "type": "string",
                        "description": "Agent name to query"
                    }
                },
                "required": ["agent"]
            }),
        ),
        ToolDefinition::new(
            TOOL_ESCALATE_TO_HUMAN,
            "Ask the human operator to decide something you cannot or should not \
             decide yourself.",
            json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The decision needed"
                    },
                    "context": {
                        "type": "string",
                        "description": "What led to this escalation"
                    },
                    "options": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Choices to present"
                    },
                    "recommendation": {
                        "type": "string",
                        "description": "Your recommended choice, if any"
                    }
                },
                "required": ["question", "context"]
            }),
        ),
    ]
}

// ============================================================================
// TOOL INPUTS
// ============================================================================

/// Input of `assign-task`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignTaskInput {
    pub agent: String,
    pub command_file: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<String>,
}

/// Input of `check-agent-status`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckAgentStatusInput {
    pub agent: String,
}

/// Input of `escalate-to-human`.
#[derive(Debug, Clone, Deserialize)]
pub struct EscalateInput {
    pub question: String,
    pub context: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Format an escalation into the structured string returned as the tool
/// result; the model folds it into its next draft.
pub fn format_escalation(input: &EscalateInput) -> String {
    let mut sections = vec![
        format!("DECISION NEEDED: {}", input.question),
        format!("Context: {}", input.context),
    ];
    if let Some(options) = &input.options {
        if !options.is_empty() {
            let listed = options
                .iter()
                .enumerate()
                .map(|(n, option)| format!("  {}. {}", n + 1, option))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Options:\n{listed}"));
        }
    }
    if let Some(recommendation) = &input.recommendation {
        sections.push(format!("Recommendation: {recommendation}"));
    }
    sections.join("\n")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_complete_and_fixed() {
        let tools = catalog();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "consult-planner",
                "consult-researcher",
                "assign-task",
                "check-agent-status",
                "escalate-to-human",
            ]
        );
    }

    #[test]
    fn test_required_inputs_match_contract() {
        let tools = catalog();
        let required = |name: &str| -> Vec<String> {
            let tool = tools.iter().find(|t| t.name == name).expect("tool exists");
            tool.input_schema["required"]
                .as_array()
                .expect("required list")
                .iter()
                .map(|v| v.as_str().expect("string").to_string())
                .collect()
        };

        assert_eq!(required("consult-planner"), vec!["question"]);
        assert_eq!(required("consult-researcher"), vec!["question", "repos"]);
        assert_eq!(required("assign-task"), vec!["agent", "command_file"]);
        assert_eq!(required("check-agent-status"), vec!["agent"]);
        assert_eq!(required("escalate-to-human"), vec!["question", "context"]);
    }

    #[test]
    fn test_format_escalation_full() {
        let input = EscalateInput {
            question: "Which database?".to_string(),
            context: "Two candidates fit".to_string(),
            options: Some(vec!["Postgres".to_string(), "SQLite".to_string()]),
            recommendation: Some("Postgres".to_string()),
        };
        let rendered = format_escalation(&input);
        assert!(rendered.starts_with("DECISION NEEDED: Which database?"));
        assert!(rendered.contains("Context: Two candidates fit"));
        assert!(rendered.contains("1. Postgres"));
        assert!(rendered.contains("2. SQLite"));
        assert!(rendered.contains("Recommendation: Postgres"));
    }

    #[test]
    fn test_format_escalation_minimal() {
        let input = EscalateInput {
            question: "Proceed?".to_string(),
            context: "Risky migration".to_string(),
            options: None,
            recommendation: None,
        };
        let rendered = format_escalation(&input);
        assert!(!rendered.contains("Options:"));
        assert!(!rendered.contains("Recommendation:"));
    }
}
