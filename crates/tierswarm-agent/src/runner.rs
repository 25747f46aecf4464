// ABOUTME: AgentRunner drives one specialist agent: model call, gated tool calls, repeat until an answer.
// ABOUTME: Every fault becomes a terminal RunOutcome on the AgentRun; nothing propagates to siblings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tierswarm_core::{AgentSpec, Authorization, Credential, SafetyGate, Task, ToolCallRequest};
use tierswarm_tools::{ToolError, ToolLog, ToolRegistry};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::events::SwarmEvent;
use crate::model::{Message, ModelClient, ModelReply, ToolCall};
use crate::prompt;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Why a run ended without an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Transport(String),
    Timeout(String),
    /// The turn budget ran out before the model produced a final answer.
    TurnLimit { turns: usize },
    Cancelled,
}

impl FailureReason {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FailureReason::TurnLimit { .. })
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(msg) => write!(f, "API error: {msg}"),
            FailureReason::Timeout(msg) => write!(f, "timed out: {msg}"),
            FailureReason::TurnLimit { turns } => {
                write!(f, "turn limit exceeded after {turns} turns (incomplete)")
            }
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Pending,
    Succeeded(String),
    Failed(FailureReason),
}

/// Lifecycle phases of a run, used in trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Drafting,
    AwaitingModel,
    ToolRequested,
    Gating,
    ToolResult,
    Done,
    Failed,
}

/// State of one agent invocation. Owned by its runner until it finishes.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub id: String,
    pub spec: AgentSpec,
    pub history: Vec<Message>,
    pub outcome: RunOutcome,
}

impl AgentRun {
    pub fn new(spec: AgentSpec) -> Self {
        Self {
            id: format!("{}-{}", spec.role.label(), Ulid::new()),
            spec,
            history: Vec::new(),
            outcome: RunOutcome::Pending,
        }
    }

    /// A run that never got to execute.
    pub fn failed(spec: AgentSpec, reason: FailureReason) -> Self {
        let mut run = Self::new(spec);
        run.outcome = RunOutcome::Failed(reason);
        run
    }

    pub fn final_text(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Succeeded(text) => Some(text),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            RunOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Pending)
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Bound on each model call.
    pub request_timeout: Duration,
    /// Bound on each tool execution.
    pub tool_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

/// Executes agent runs against a model, resolving tool calls through the
/// gate and the registry. Cheap to clone; one clone per concurrent run.
#[derive(Clone)]
pub struct AgentRunner {
    client: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    gate: SafetyGate,
    config: RunnerConfig,
    events: Option<broadcast::Sender<SwarmEvent>>,
    tool_log: Option<Arc<ToolLog>>,
}

impl AgentRunner {
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        gate: SafetyGate,
        config: RunnerConfig,
    ) -> Self {
        Self {
            client,
            registry,
            gate,
            config,
            events: None,
            tool_log: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<SwarmEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_tool_log(mut self, log: Arc<ToolLog>) -> Self {
        self.tool_log = Some(log);
        self
    }

    /// Run one agent to completion or failure.
    pub async fn run(
        &self,
        spec: AgentSpec,
        task: Arc<Task>,
        credential: Credential,
        cancel: CancellationToken,
    ) -> AgentRun {
        let mut run = AgentRun::new(spec);
        trace_phase(&run, RunPhase::Drafting);
        run.history = prompt::initial_messages(&run.spec, &task);
        let tools = self.registry.describe_all();

        tracing::info!(agent = %run.id, credential = %credential, model = %task.model, "agent starting");
        self.emit(SwarmEvent::AgentStarted {
            agent_id: run.id.clone(),
            role: run.spec.role,
        });

        for turn in 0..run.spec.max_turns {
            trace_phase(&run, RunPhase::AwaitingModel);
            let call = self
                .client
                .complete(&credential, &task.model, &run.history, &tools);
            let reply = tokio::select! {
                _ = cancel.cancelled() => None,
                result = tokio::time::timeout(self.config.request_timeout, call) => Some(result),
            };

            let reply = match reply {
                None => return self.finish(run, RunOutcome::Failed(FailureReason::Cancelled)),
                Some(Err(_)) => {
                    let reason = FailureReason::Timeout(format!(
                        "model call exceeded {}s",
                        self.config.request_timeout.as_secs()
                    ));
                    return self.finish(run, RunOutcome::Failed(reason));
                }
                Some(Ok(Err(e))) => {
                    return self.finish(run, RunOutcome::Failed(FailureReason::Transport(e.to_string())));
                }
                Some(Ok(Ok(reply))) => reply,
            };

            match reply {
                ModelReply::FinalAnswer(text) => {
                    run.history.push(Message::assistant(text.clone()));
                    return self.finish(run, RunOutcome::Succeeded(text));
                }
                ModelReply::ToolCalls { content, calls } => {
                    tracing::debug!(agent = %run.id, turn, calls = calls.len(), "model requested tools");
                    run.history.push(Message::Assistant {
                        content,
                        tool_calls: calls.clone(),
                    });
                    for call in calls {
                        trace_phase(&run, RunPhase::ToolRequested);
                        let result = match self.resolve(&run.id, &call, &cancel).await {
                            Ok(result) => result,
                            Err(reason) => return self.finish(run, RunOutcome::Failed(reason)),
                        };
                        trace_phase(&run, RunPhase::ToolResult);
                        run.history.push(Message::tool_result(call.id, result));
                    }
                }
            }
        }

        let turns = run.spec.max_turns;
        self.finish(run, RunOutcome::Failed(FailureReason::TurnLimit { turns }))
    }

    /// Turn one requested call into the text fed back to the model. Only
    /// cancellation and tool timeouts end the run.
    async fn resolve(
        &self,
        agent_id: &str,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<String, FailureReason> {
        let args = match parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                let err = ToolError::invalid_args(&call.name, e);
                return Ok(self.tool_failed(agent_id, call, &Value::Null, &err));
            }
        };

        let screening = match self.registry.screen(&call.name, &args) {
            Ok(screening) => screening,
            Err(err) => return Ok(self.tool_failed(agent_id, call, &args, &err)),
        };

        self.emit(SwarmEvent::ToolRequested {
            agent_id: agent_id.to_string(),
            tool: call.name.clone(),
            summary: screening.summary.clone(),
        });

        let request = ToolCallRequest {
            call_id: call.id.clone(),
            requested_by: agent_id.to_string(),
            tool: call.name.clone(),
            arguments: args.clone(),
            summary: screening.summary,
        };
        tracing::debug!(agent = %agent_id, tool = %call.name, phase = ?RunPhase::Gating, "authorizing tool call");
        let verdict = tokio::select! {
            _ = cancel.cancelled() => return Err(FailureReason::Cancelled),
            verdict = self.gate.authorize(request, screening.class) => verdict,
        };

        if let Authorization::Denied(cause) = verdict {
            let reason = cause.as_str();
            self.emit(SwarmEvent::ToolDenied {
                agent_id: agent_id.to_string(),
                tool: call.name.clone(),
                reason: reason.to_string(),
            });
            self.record(agent_id, &call.name, &args, reason, false, true);
            return Ok(json!({
                "success": false,
                "error": format!("{reason}. Continue without this tool call."),
            })
            .to_string());
        }

        let invocation = self.registry.invoke(&call.name, args.clone());
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(FailureReason::Cancelled),
            outcome = tokio::time::timeout(self.config.tool_timeout, invocation) => outcome,
        };

        match outcome {
            Err(_) => {
                let message = format!("tool {} exceeded {:?}", call.name, self.config.tool_timeout);
                self.record(agent_id, &call.name, &args, &message, false, false);
                Err(FailureReason::Timeout(message))
            }
            Ok(Ok(output)) => {
                self.record(agent_id, &call.name, &args, &output, true, false);
                self.emit(SwarmEvent::ToolCompleted {
                    agent_id: agent_id.to_string(),
                    tool: call.name.clone(),
                    success: true,
                });
                Ok(output)
            }
            Ok(Err(err)) => Ok(self.tool_failed(agent_id, call, &args, &err)),
        }
    }

    fn tool_failed(&self, agent_id: &str, call: &ToolCall, args: &Value, err: &ToolError) -> String {
        tracing::info!(agent = %agent_id, tool = %call.name, error = %err, "tool call failed");
        let blocked = matches!(err, ToolError::ExecutionError { message, .. } if message.starts_with("blocked:"));
        self.record(agent_id, &call.name, args, &err.to_string(), false, blocked);
        self.emit(SwarmEvent::ToolCompleted {
            agent_id: agent_id.to_string(),
            tool: call.name.clone(),
            success: false,
        });
        json!({"success": false, "error": err.to_string()}).to_string()
    }

    fn finish(&self, mut run: AgentRun, outcome: RunOutcome) -> AgentRun {
        run.outcome = outcome;
        let (succeeded, detail) = match &run.outcome {
            RunOutcome::Succeeded(text) => (true, format!("{} chars", text.chars().count())),
            RunOutcome::Failed(reason) => (false, reason.to_string()),
            RunOutcome::Pending => (false, "pending".to_string()),
        };
        if succeeded {
            trace_phase(&run, RunPhase::Done);
            tracing::info!(agent = %run.id, detail = %detail, "agent finished");
        } else {
            trace_phase(&run, RunPhase::Failed);
            tracing::warn!(agent = %run.id, reason = %detail, "agent failed");
        }
        self.emit(SwarmEvent::AgentFinished {
            agent_id: run.id.clone(),
            role: run.spec.role,
            succeeded,
            detail,
        });
        run
    }

    fn emit(&self, event: SwarmEvent) {
        if let Some(events) = &self.events {
            // Ignore broadcast errors (no active subscribers is fine)
            let _ = events.send(event);
        }
    }

    fn record(&self, agent: &str, tool: &str, args: &Value, outcome: &str, success: bool, denied: bool) {
        if let Some(log) = &self.tool_log {
            log.record(agent, tool, args, outcome, success, denied);
        }
    }
}

fn trace_phase(run: &AgentRun, phase: RunPhase) {
    tracing::trace!(agent = %run.id, phase = ?phase, "run phase");
}

/// Parse model-produced argument text. Blank means no arguments.
fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {e}"))
}
