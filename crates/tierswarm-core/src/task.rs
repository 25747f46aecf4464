// ABOUTME: The immutable Task submitted for one swarm invocation.
// ABOUTME: Bundles the instruction, attached context blobs, tier, safety level and model id.

use serde::{Deserialize, Serialize};

use crate::safety::SafetyLevel;
use crate::tier::Tier;

/// A named blob of context text attached to a task (usually a file's contents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub content: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Input for one swarm run. Built once, then shared read-only (as `Arc<Task>`)
/// by every runner and the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub instruction: String,
    pub attachments: Vec<Attachment>,
    pub tier: Tier,
    pub safety: SafetyLevel,
    pub model: String,
}

impl Task {
    pub fn new(
        instruction: impl Into<String>,
        tier: Tier,
        safety: SafetyLevel,
        model: impl Into<String>,
    ) -> Self {
        Self {
            instruction: instruction.into(),
            attachments: Vec::new(),
            tier,
            safety,
            model: model.into(),
        }
    }

    /// Attach context blobs, preserving their order.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_attachment_order() {
        let task = Task::new("summarize", Tier::Minimum, SafetyLevel::ReadOnly, "grok-3")
            .with_attachments(vec![Attachment::new("b.txt", "B"), Attachment::new("a.txt", "A")]);

        assert_eq!(task.instruction, "summarize");
        assert_eq!(task.attachments[0].name, "b.txt");
        assert_eq!(task.attachments[1].name, "a.txt");
        assert_eq!(task.tier, Tier::Minimum);
    }
}
