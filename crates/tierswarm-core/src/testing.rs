// ABOUTME: Test utilities for tierswarm-core: scripted and channel-driven approval boundaries.
// ABOUTME: Used in gate tests and in end-to-end swarm tests to stand in for a human.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::gate::ApprovalBoundary;
use crate::safety::{ToolCallRequest, ToolDecision};

/// Answers prompts from a script, falling back to a fixed decision once the
/// script runs out. Records every request it sees and how many prompts
/// were ever open at the same time.
pub struct ScriptedApproval {
    script: Mutex<VecDeque<ToolDecision>>,
    fallback: ToolDecision,
    delay: Option<Duration>,
    seen: Mutex<Vec<ToolCallRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedApproval {
    pub fn always(decision: ToolDecision) -> Self {
        Self::scripted(Vec::new(), decision)
    }

    /// Play `decisions` in order, then deny.
    pub fn sequence(decisions: Vec<ToolDecision>) -> Self {
        Self::scripted(decisions, ToolDecision::Deny)
    }

    fn scripted(decisions: Vec<ToolDecision>, fallback: ToolDecision) -> Self {
        Self {
            script: Mutex::new(decisions.into()),
            fallback,
            delay: None,
            seen: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering each prompt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompt_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<ToolCallRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// Highest number of prompts that were open simultaneously.
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApprovalBoundary for ScriptedApproval {
    async fn request_approval(&self, request: &ToolCallRequest) -> ToolDecision {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let decision = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        decision
    }
}

/// A prompt forwarded to the test, with the sender the test answers on.
pub type PendingPrompt = (ToolCallRequest, oneshot::Sender<ToolDecision>);

/// Forwards each prompt to a channel so a test decides when and how to answer.
pub struct ChannelApproval {
    prompts: mpsc::UnboundedSender<PendingPrompt>,
}

impl ChannelApproval {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingPrompt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { prompts: tx }, rx)
    }
}

#[async_trait]
impl ApprovalBoundary for ChannelApproval {
    async fn request_approval(&self, request: &ToolCallRequest) -> ToolDecision {
        let (tx, rx) = oneshot::channel();
        if self.prompts.send((request.clone(), tx)).is_err() {
            return ToolDecision::Deny;
        }
        rx.await.unwrap_or(ToolDecision::Deny)
    }
}
