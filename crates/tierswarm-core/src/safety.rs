// ABOUTME: Safety policy vocabulary: session levels, per-tool classes, decisions and requests.
// ABOUTME: Consumed by the SafetyGate and by the approval boundary the user answers through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Session-wide policy governing whether side-effecting tools need approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    /// Side-effecting tools are always refused.
    ReadOnly,
    /// Side-effecting tools wait for an explicit user decision.
    Confirmed,
    /// Everything runs without asking.
    FullAuto,
}

impl SafetyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyLevel::ReadOnly => "read_only",
            SafetyLevel::Confirmed => "confirmed",
            SafetyLevel::FullAuto => "full_auto",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "read_only" | "readonly" => Ok(SafetyLevel::ReadOnly),
            "confirmed" | "confirm" => Ok(SafetyLevel::Confirmed),
            "full_auto" | "fullauto" | "auto" => Ok(SafetyLevel::FullAuto),
            other => Err(CoreError::UnknownSafetyLevel(other.to_string())),
        }
    }
}

/// Static classification of a tool: observation only, or side-effecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyClass {
    ReadOnly,
    Confirmed,
}

/// Outcome of authorizing one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolDecision {
    Allow,
    Deny,
    /// Deny this call and drop the session to `ReadOnly` for the rest of the run.
    DenyAndDowngrade,
}

/// Why the gate refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyCause {
    /// The session level forbids side effects.
    ReadOnly,
    /// The user answered no.
    User,
    /// The user answered no and dropped the session to read-only.
    Downgraded,
    /// Nobody answered before the approval timeout.
    TimedOut,
    /// The approval actor is gone, usually because the session was cancelled.
    Unavailable,
}

impl DenyCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyCause::ReadOnly => "blocked: the session is read-only",
            DenyCause::User => "denied by the user",
            DenyCause::Downgraded => "denied by the user, session switched to read-only",
            DenyCause::TimedOut => "no answer before the approval timed out",
            DenyCause::Unavailable => "approval is no longer available",
        }
    }
}

impl fmt::Display for DenyCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The gate's verdict on one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied(DenyCause),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }
}

/// A tool call emitted by a model, as presented to the gate and the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned id correlating the call with its result message.
    pub call_id: String,
    /// Id of the agent run that asked for the call.
    pub requested_by: String,
    pub tool: String,
    pub arguments: Value,
    /// Human-readable one-liner shown when asking for approval.
    pub summary: String,
}
