// ABOUTME: Terminal approval boundary: asks the user on stderr and reads y/n/d lines from stdin.
// ABOUTME: Also renders swarm progress events as one-line status updates.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use tierswarm_agent::SwarmEvent;
use tierswarm_core::{ApprovalBoundary, ToolCallRequest, ToolDecision};
use tokio::sync::{Mutex, mpsc};

/// Prompts on the controlling terminal. Answers come from one long-lived
/// line reader, so an abandoned prompt never holds on to the user's next
/// line. The gate serializes prompts; only one question is on screen.
pub struct TerminalApproval {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl TerminalApproval {
    /// Answer prompts from `lines`, one answer per line.
    pub fn new(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
        }
    }

    /// Read answers from stdin on a detached thread. The thread is not a
    /// runtime blocking task, so a pending read never holds up shutdown.
    pub fn stdin() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("tierswarm-stdin".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self::new(rx))
    }
}

#[async_trait]
impl ApprovalBoundary for TerminalApproval {
    async fn request_approval(&self, request: &ToolCallRequest) -> ToolDecision {
        let mut lines = self.lines.lock().await;

        // Typed while no prompt was open, or meant for one that timed out.
        let mut stale = 0usize;
        while lines.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            tracing::debug!(stale, "discarded input typed outside a prompt");
        }

        let prompt = format!(
            "\n[approval] {} wants to run {}:\n{}\nAllow? [y]es / [n]o / [d]eny and switch to read-only: ",
            request.requested_by, request.tool, request.summary
        );
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(prompt.as_bytes());
        let _ = stderr.flush();

        match lines.recv().await {
            Some(line) => parse_answer(&line),
            None => {
                tracing::warn!(tool = %request.tool, "input closed, denying");
                ToolDecision::Deny
            }
        }
    }
}

/// Anything other than an explicit yes or downgrade denies.
pub fn parse_answer(line: &str) -> ToolDecision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ToolDecision::Allow,
        "d" | "downgrade" => ToolDecision::DenyAndDowngrade,
        _ => ToolDecision::Deny,
    }
}

pub fn render_event(event: &SwarmEvent) -> String {
    match event {
        SwarmEvent::SwarmStarted { agents } => format!("swarm started with {agents} agents"),
        SwarmEvent::AgentStarted { agent_id, role } => format!("[{agent_id}] {role} started"),
        SwarmEvent::ToolRequested { agent_id, tool, .. } => format!("[{agent_id}] requests {tool}"),
        SwarmEvent::ToolDenied {
            agent_id,
            tool,
            reason,
        } => format!("[{agent_id}] {tool} refused: {reason}"),
        SwarmEvent::ToolCompleted {
            agent_id,
            tool,
            success,
        } => {
            let status = if *success { "ok" } else { "failed" };
            format!("[{agent_id}] {tool} {status}")
        }
        SwarmEvent::AgentFinished {
            agent_id,
            succeeded,
            detail,
            ..
        } => {
            let status = if *succeeded { "done" } else { "failed" };
            format!("[{agent_id}] {status} ({detail})")
        }
        SwarmEvent::VerifierStarted => "all agents finished, verifying...".to_string(),
        SwarmEvent::SwarmCancelled => "swarm cancelled".to_string(),
    }
}
