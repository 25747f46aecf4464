// ABOUTME: Progress events broadcast by runners and the coordinator during a swarm run.
// ABOUTME: Consumers (the CLI) subscribe to render live status; nothing depends on them being read.

use serde::{Deserialize, Serialize};
use tierswarm_core::AgentRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwarmEvent {
    SwarmStarted {
        agents: usize,
    },
    AgentStarted {
        agent_id: String,
        role: AgentRole,
    },
    ToolRequested {
        agent_id: String,
        tool: String,
        summary: String,
    },
    ToolDenied {
        agent_id: String,
        tool: String,
        reason: String,
    },
    ToolCompleted {
        agent_id: String,
        tool: String,
        success: bool,
    },
    AgentFinished {
        agent_id: String,
        role: AgentRole,
        succeeded: bool,
        detail: String,
    },
    VerifierStarted,
    SwarmCancelled,
}
