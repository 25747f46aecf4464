// ABOUTME: Core domain types for tierswarm: tasks, tiers, rosters, safety policy and credentials.
// ABOUTME: Hosts the SafetyGate approval actor that every side-effecting tool call passes through.

pub mod credentials;
pub mod error;
pub mod gate;
pub mod safety;
pub mod task;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tier;

pub use credentials::{Credential, CredentialRotator, MAX_CREDENTIALS};
pub use error::CoreError;
pub use gate::{ApprovalBoundary, GateConfig, SafetyGate};
pub use safety::{Authorization, DenyCause, SafetyClass, SafetyLevel, ToolCallRequest, ToolDecision};
pub use task::{Attachment, Task};
pub use tier::{AgentRole, AgentSpec, Tier};
