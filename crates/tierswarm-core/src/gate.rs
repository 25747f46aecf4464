// ABOUTME: SafetyGate authorizes tool calls against the session safety level.
// ABOUTME: Confirmed-level prompts are serialized through a single approval actor fed by an mpsc queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::safety::{Authorization, DenyCause, SafetyClass, SafetyLevel, ToolCallRequest, ToolDecision};

/// Default time a user has to answer a prompt before it counts as a denial.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(120);

/// The user-facing side of the approval protocol. Implementations block
/// until the user has answered; the gate guarantees at most one call is
/// outstanding at a time.
#[async_trait]
pub trait ApprovalBoundary: Send + Sync {
    async fn request_approval(&self, request: &ToolCallRequest) -> ToolDecision;
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// `None` waits on the user indefinitely.
    pub approval_timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            approval_timeout: Some(DEFAULT_APPROVAL_TIMEOUT),
        }
    }
}

/// A queued approval: the request paired with where to send the answer.
type ApprovalMessage = (ToolCallRequest, oneshot::Sender<Authorization>);

/// Cloneable handle shared by every runner in a session.
#[derive(Clone)]
pub struct SafetyGate {
    level: Arc<RwLock<SafetyLevel>>,
    approval_tx: mpsc::Sender<ApprovalMessage>,
}

impl SafetyGate {
    /// Spawn the approval actor and return a handle to it. The actor exits
    /// when `cancel` fires or every handle has been dropped.
    pub fn spawn(
        initial: SafetyLevel,
        boundary: Arc<dyn ApprovalBoundary>,
        config: GateConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (approval_tx, approval_rx) = mpsc::channel::<ApprovalMessage>(64);
        let level = Arc::new(RwLock::new(initial));

        let actor = ApprovalActor {
            level: Arc::clone(&level),
            approval_rx,
            boundary,
            config,
            cancel,
        };
        tokio::spawn(actor.run());

        Self { level, approval_tx }
    }

    /// Current session level.
    pub async fn level(&self) -> SafetyLevel {
        *self.level.read().await
    }

    /// Decide whether `request` may execute, and if not, why. Never errors:
    /// a gate that can no longer reach its actor denies.
    pub async fn authorize(&self, request: ToolCallRequest, class: SafetyClass) -> Authorization {
        if class == SafetyClass::ReadOnly {
            return Authorization::Allowed;
        }

        match self.level().await {
            SafetyLevel::ReadOnly => {
                tracing::info!(
                    agent = %request.requested_by,
                    tool = %request.tool,
                    "denied: session is read-only"
                );
                Authorization::Denied(DenyCause::ReadOnly)
            }
            SafetyLevel::FullAuto => Authorization::Allowed,
            SafetyLevel::Confirmed => {
                let (tx, rx) = oneshot::channel();
                let agent = request.requested_by.clone();
                let tool = request.tool.clone();
                if self.approval_tx.send((request, tx)).await.is_err() {
                    tracing::warn!(agent = %agent, tool = %tool, "approval actor gone, denying");
                    return Authorization::Denied(DenyCause::Unavailable);
                }
                rx.await.unwrap_or(Authorization::Denied(DenyCause::Unavailable))
            }
        }
    }
}

struct ApprovalActor {
    level: Arc<RwLock<SafetyLevel>>,
    approval_rx: mpsc::Receiver<ApprovalMessage>,
    boundary: Arc<dyn ApprovalBoundary>,
    config: GateConfig,
    cancel: CancellationToken,
}

impl ApprovalActor {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                msg = self.approval_rx.recv() => msg,
            };
            let Some((request, mut reply)) = next else {
                break;
            };

            // The requester was cancelled while queued.
            if reply.is_closed() {
                tracing::debug!(tool = %request.tool, "skipping abandoned approval request");
                continue;
            }

            // Re-read: an earlier answer in the queue may have downgraded the session.
            let level = *self.level.read().await;
            let verdict = match level {
                SafetyLevel::ReadOnly => Authorization::Denied(DenyCause::ReadOnly),
                SafetyLevel::FullAuto => Authorization::Allowed,
                SafetyLevel::Confirmed => {
                    let answer = tokio::select! {
                        answer = self.prompt(&request) => answer,
                        _ = reply.closed() => {
                            tracing::debug!(tool = %request.tool, "requester left during prompt");
                            continue;
                        }
                        _ = self.cancel.cancelled() => break,
                    };
                    match answer {
                        Some(answer) => self.apply(&request, answer).await,
                        None => Authorization::Denied(DenyCause::TimedOut),
                    }
                }
            };

            tracing::info!(
                agent = %request.requested_by,
                tool = %request.tool,
                level = %level,
                verdict = ?verdict,
                "tool call resolved"
            );
            // The requester may have just gone away.
            let _ = reply.send(verdict);
        }
    }

    /// The user's answer, or `None` if the timeout ran out first.
    async fn prompt(&self, request: &ToolCallRequest) -> Option<ToolDecision> {
        let ask = self.boundary.request_approval(request);
        match self.config.approval_timeout {
            Some(limit) => match tokio::time::timeout(limit, ask).await {
                Ok(answer) => Some(answer),
                Err(_) => {
                    tracing::warn!(
                        tool = %request.tool,
                        timeout_secs = limit.as_secs(),
                        "approval timed out, denying"
                    );
                    None
                }
            },
            None => Some(ask.await),
        }
    }

    /// Apply the user's answer. A downgrade flips the level before the
    /// next queued request is looked at.
    async fn apply(&self, request: &ToolCallRequest, answer: ToolDecision) -> Authorization {
        match answer {
            ToolDecision::DenyAndDowngrade => {
                *self.level.write().await = SafetyLevel::ReadOnly;
                tracing::warn!(
                    agent = %request.requested_by,
                    tool = %request.tool,
                    "user denied and downgraded session to read-only"
                );
                Authorization::Denied(DenyCause::Downgraded)
            }
            ToolDecision::Deny => Authorization::Denied(DenyCause::User),
            ToolDecision::Allow => Authorization::Allowed,
        }
    }
}
