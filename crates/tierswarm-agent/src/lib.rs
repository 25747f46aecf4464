// ABOUTME: Agent execution for tierswarm: model clients, per-agent runners, the swarm coordinator and verifier.
// ABOUTME: Runners loop model calls through the SafetyGate and ToolRegistry; the verifier streams the merged answer.

pub mod client;
pub mod context;
pub mod events;
pub mod model;
pub mod prompt;
pub mod providers;
pub mod runner;
pub mod swarm;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod verifier;

pub use client::create_model_client;
pub use events::SwarmEvent;
pub use model::{Message, ModelClient, ModelError, ModelReply, TextStream, ToolCall};
pub use runner::{AgentRun, AgentRunner, FailureReason, RunOutcome, RunnerConfig};
pub use swarm::{SwarmCoordinator, SwarmOptions, SwarmOutcome, SwarmResult};
pub use verifier::VerifierStream;
