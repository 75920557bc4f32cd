//! Bus channel names
//!
//! Channels are plain strings on the transport; the constants here are the
//! complete set of well-known names so no agent ever typos one.

/// Gateway -> orchestrator: stamped human messages.
pub const HUMAN_INPUT: &str = "human-input";

/// Orchestrator -> gateway: user-visible replies.
pub const CHATTER_OUTPUT: &str = "chatter-output";

/// System announcements forwarded to browsers.
pub const SYSTEM: &str = "system";

/// Supervisors -> anyone: periodic worker state.
pub const AGENT_STATUS: &str = "agent:status";

/// Supervisors -> anyone: streamed subprocess output.
pub const AGENT_PROGRESS: &str = "agent:progress";

/// Anyone -> all agents: system commands such as shutdown.
pub const BROADCAST: &str = "broadcast";

/// The per-agent request channel: `agent:<name>`.
///
/// Requests for an agent and the responses it sends both travel on its
/// own channel; correlation is by `in_response_to`, not by channel.
pub fn agent_channel(name: &str) -> String {
    format!("agent:{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_channel_format() {
        assert_eq!(agent_channel("researcher"), "agent:researcher");
        assert_eq!(agent_channel("frontend"), "agent:frontend");
    }

    #[test]
    fn test_well_known_names() {
        assert_eq!(HUMAN_INPUT, "human-input");
        assert_eq!(CHATTER_OUTPUT, "chatter-output");
        assert_eq!(AGENT_STATUS, "agent:status");
        assert_eq!(AGENT_PROGRESS, "agent:progress");
        assert_eq!(BROADCAST, "broadcast");
    }
}
