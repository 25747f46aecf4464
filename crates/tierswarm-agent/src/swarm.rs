// ABOUTME: SwarmCoordinator runs a tier's roster of agents in parallel, then hands every outcome to the verifier.
// ABOUTME: Owns the per-session SafetyGate, credential assignment, progress events and the tool log.

use std::sync::Arc;

use tierswarm_core::{
    ApprovalBoundary, CredentialRotator, GateConfig, SafetyGate, Task,
};
use tierswarm_tools::{ToolLog, ToolRegistry};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::events::SwarmEvent;
use crate::model::ModelClient;
use crate::prompt;
use crate::runner::{AgentRun, AgentRunner, FailureReason, RunnerConfig};
use crate::verifier::{VerifierStream, spawn_verifier};

pub const DEFAULT_MAX_TURNS: usize = 5;

#[derive(Debug, Clone)]
pub struct SwarmOptions {
    /// Model/tool round trips each agent may take before giving up.
    pub max_turns: usize,
    pub runner: RunnerConfig,
    pub gate: GateConfig,
    /// Replaces the default verifier system prompt.
    pub verifier_prompt: Option<String>,
}

impl Default for SwarmOptions {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            runner: RunnerConfig::default(),
            gate: GateConfig::default(),
            verifier_prompt: None,
        }
    }
}

/// Every run in roster order, plus the verifier's streamed answer.
pub struct SwarmResult {
    pub runs: Vec<AgentRun>,
    pub answer: VerifierStream,
}

pub enum SwarmOutcome {
    Completed(SwarmResult),
    /// The session was cancelled; the verifier never ran.
    Cancelled { runs: Vec<AgentRun> },
}

impl SwarmOutcome {
    pub fn runs(&self) -> &[AgentRun] {
        match self {
            SwarmOutcome::Completed(result) => &result.runs,
            SwarmOutcome::Cancelled { runs } => runs,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SwarmOutcome::Cancelled { .. })
    }
}

pub struct SwarmCoordinator {
    client: Arc<dyn ModelClient>,
    verifier: Option<(Arc<dyn ModelClient>, String)>,
    registry: Arc<ToolRegistry>,
    rotator: Arc<CredentialRotator>,
    approvals: Arc<dyn ApprovalBoundary>,
    options: SwarmOptions,
    events: broadcast::Sender<SwarmEvent>,
    tool_log: Arc<ToolLog>,
}

impl SwarmCoordinator {
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        rotator: Arc<CredentialRotator>,
        approvals: Arc<dyn ApprovalBoundary>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            client,
            verifier: None,
            registry,
            rotator,
            approvals,
            options: SwarmOptions::default(),
            events,
            tool_log: Arc::new(ToolLog::new()),
        }
    }

    /// Run the verifier on a different client and model than the agents.
    pub fn with_verifier(mut self, client: Arc<dyn ModelClient>, model: impl Into<String>) -> Self {
        self.verifier = Some((client, model.into()));
        self
    }

    pub fn with_options(mut self, options: SwarmOptions) -> Self {
        self.options = options;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.events.subscribe()
    }

    pub fn tool_log(&self) -> Arc<ToolLog> {
        Arc::clone(&self.tool_log)
    }

    /// Run every agent of the task's tier to a terminal state, then start
    /// the verifier. A failed agent never stops its siblings; `cancel`
    /// stops all of them and skips verification.
    pub async fn execute(&self, task: Task, cancel: CancellationToken) -> SwarmOutcome {
        let task = Arc::new(task);
        let session = cancel.child_token();
        let gate = SafetyGate::spawn(
            task.safety,
            Arc::clone(&self.approvals),
            self.options.gate.clone(),
            session.clone(),
        );
        let runner = AgentRunner::new(
            Arc::clone(&self.client),
            Arc::clone(&self.registry),
            gate,
            self.options.runner.clone(),
        )
        .with_events(self.events.clone())
        .with_tool_log(Arc::clone(&self.tool_log));

        let roster = task.tier.roster(self.options.max_turns);
        tracing::info!(tier = %task.tier, agents = roster.len(), safety = %task.safety, "swarm starting");
        self.emit(SwarmEvent::SwarmStarted {
            agents: roster.len(),
        });

        let mut set = JoinSet::new();
        for (index, spec) in roster.iter().cloned().enumerate() {
            let credential = self.rotator.next();
            let runner = runner.clone();
            let task = Arc::clone(&task);
            let session = session.clone();
            set.spawn(async move { (index, runner.run(spec, task, credential, session).await) });
        }

        let mut slots: Vec<Option<AgentRun>> = vec![None; roster.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, run)) => slots[index] = Some(run),
                Err(e) => tracing::error!(error = %e, "runner task did not complete"),
            }
        }
        // Shuts down the approval actor.
        session.cancel();

        let runs: Vec<AgentRun> = slots
            .into_iter()
            .zip(roster)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| {
                    AgentRun::failed(
                        spec,
                        FailureReason::Transport("runner task panicked before finishing".to_string()),
                    )
                })
            })
            .collect();

        let succeeded = runs.iter().filter(|r| r.final_text().is_some()).count();
        if cancel.is_cancelled() {
            tracing::warn!(succeeded, total = runs.len(), "swarm cancelled, skipping verifier");
            self.emit(SwarmEvent::SwarmCancelled);
            return SwarmOutcome::Cancelled { runs };
        }

        tracing::info!(succeeded, total = runs.len(), "all agents finished, starting verifier");
        self.emit(SwarmEvent::VerifierStarted);

        let messages = prompt::verifier_messages(&task, &runs, self.options.verifier_prompt.as_deref());
        let (client, model) = match &self.verifier {
            Some((client, model)) => (Arc::clone(client), model.clone()),
            None => (Arc::clone(&self.client), task.model.clone()),
        };
        let answer = spawn_verifier(
            client,
            self.rotator.next(),
            model,
            messages,
            cancel.child_token(),
            self.options.runner.request_timeout,
        );

        SwarmOutcome::Completed(SwarmResult { runs, answer })
    }

    fn emit(&self, event: SwarmEvent) {
        // Ignore broadcast errors (no active subscribers is fine)
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTool, ScriptedModelClient};
    use tierswarm_core::testing::ScriptedApproval;
    use tierswarm_core::{AgentRole, SafetyClass, SafetyLevel, Tier, ToolDecision};

    fn coordinator(client: Arc<ScriptedModelClient>) -> SwarmCoordinator {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(RecordingTool::new("peek", SafetyClass::ReadOnly)))
            .unwrap();
        SwarmCoordinator::new(
            client,
            Arc::new(registry),
            Arc::new(CredentialRotator::new(["k1"]).unwrap()),
            Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
        )
    }

    #[tokio::test]
    async fn runs_come_back_in_roster_order() {
        let client = Arc::new(ScriptedModelClient::answering("ok"));
        let swarm = coordinator(client.clone());
        let task = Task::new("t", Tier::Medium, SafetyLevel::Confirmed, "m");

        let outcome = swarm.execute(task, CancellationToken::new()).await;
        let roles: Vec<AgentRole> = outcome.runs().iter().map(|r| r.spec.role).collect();
        assert_eq!(roles, AgentRole::ALL[..4].to_vec());

        let SwarmOutcome::Completed(result) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(result.answer.collect_text().await.unwrap(), "verified");
        assert_eq!(client.complete_calls(), 4);
        assert_eq!(client.stream_calls(), 1);
    }

    #[tokio::test]
    async fn events_bracket_the_run() {
        let client = Arc::new(ScriptedModelClient::answering("ok"));
        let swarm = coordinator(client);
        let mut events = swarm.subscribe();
        let task = Task::new("t", Tier::Minimum, SafetyLevel::ReadOnly, "m");

        let _ = swarm.execute(task, CancellationToken::new()).await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.first(), Some(&SwarmEvent::SwarmStarted { agents: 2 }));
        assert_eq!(seen.last(), Some(&SwarmEvent::VerifierStarted));
        let finished = seen
            .iter()
            .filter(|e| matches!(e, SwarmEvent::AgentFinished { succeeded: true, .. }))
            .count();
        assert_eq!(finished, 2);
    }

    #[tokio::test]
    async fn separate_verifier_client_is_used() {
        let agents = Arc::new(ScriptedModelClient::answering("ok"));
        let verifier = Arc::new(ScriptedModelClient::answering("unused").with_stream(&["local"]));
        let swarm = coordinator(agents.clone()).with_verifier(verifier.clone(), "qwen3:14b");
        let task = Task::new("t", Tier::Minimum, SafetyLevel::ReadOnly, "m");

        let SwarmOutcome::Completed(result) = swarm.execute(task, CancellationToken::new()).await
        else {
            panic!("expected completion");
        };
        assert_eq!(result.answer.collect_text().await.unwrap(), "local");
        assert_eq!(agents.stream_calls(), 0);
        assert_eq!(verifier.stream_calls(), 1);
    }
}
