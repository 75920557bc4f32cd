//! Row shapes for the two log tables

use relay_core::MessageKind;
use serde_json::Value as JsonValue;
use std::fmt;

/// One row of the `activities` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub from_agent: String,
    pub to_agent: String,
    pub kind: MessageKind,
    pub payload: JsonValue,
}

impl ActivityRecord {
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        kind: MessageKind,
        payload: JsonValue,
    ) -> Self {
        Self {
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            kind,
            payload,
        }
    }
}

/// Log severities accepted by the `logs` table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `logs` table.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub agent: String,
    pub level: LogLevel,
    pub message: String,
    pub metadata: Option<JsonValue>,
}

impl LogRecord {
    pub fn new(agent: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            level,
            message: message.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_level_names_match_constraint() {
        for (level, name) in [
            (LogLevel::Debug, "debug"),
            (LogLevel::Info, "info"),
            (LogLevel::Warn, "warn"),
            (LogLevel::Error, "error"),
            (LogLevel::Fatal, "fatal"),
        ] {
            assert_eq!(level.as_str(), name);
        }
    }

    #[test]
    fn test_log_record_builder() {
        let record = LogRecord::new("frontend", LogLevel::Warn, "stderr line")
            .with_metadata(json!({"task_id": "t-1"}));
        assert_eq!(record.agent, "frontend");
        assert_eq!(record.level, LogLevel::Warn);
        assert!(record.metadata.is_some());
    }
}
