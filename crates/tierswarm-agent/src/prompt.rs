// ABOUTME: Builds the message histories that seed each agent run and the verifier call.
// ABOUTME: Role prompts, attachment blocks, and the merged peer-output prompt for verification.

use tierswarm_core::{AgentSpec, Attachment, Task};

use crate::model::Message;
use crate::runner::{AgentRun, RunOutcome};

pub const DEFAULT_VERIFIER_PROMPT: &str = "You are the verifier of a swarm of specialist agents. \
Cross-check every agent's output against the original task. Merge the strongest parts, \
point out contradictions or mistakes you find, and ignore agents that failed. \
Produce one polished, complete final answer.";

/// System prompt for one roster entry.
pub fn agent_system_prompt(spec: &AgentSpec) -> String {
    format!(
        "You are the {title} agent in a swarm of specialists working on the same task in parallel.\n\
         Specialty: {focus}\n\n\
         You may call tools to inspect files, run commands, or operate the desktop. Some tools need \
         approval and may be denied; if a call is denied, continue without it. \
         When you are done, reply with your final answer as plain text and no tool calls.",
        title = spec.role.title(),
        focus = spec.focus,
    )
}

/// Render attachments as one block, or None when there are none.
pub fn attachments_message(attachments: &[Attachment]) -> Option<String> {
    if attachments.is_empty() {
        return None;
    }
    let blocks: Vec<String> = attachments
        .iter()
        .enumerate()
        .map(|(i, a)| format!("──── File {}: {} ────\n{}", i + 1, a.name, a.content))
        .collect();
    Some(format!("Attached context files:\n\n{}", blocks.join("\n\n")))
}

pub fn initial_messages(spec: &AgentSpec, task: &Task) -> Vec<Message> {
    let mut messages = vec![Message::system(agent_system_prompt(spec))];
    if let Some(block) = attachments_message(&task.attachments) {
        messages.push(Message::system(block));
    }
    messages.push(Message::user(task.instruction.clone()));
    messages
}

/// Messages for the verifier: its instructions, then every run in roster
/// order, failures included with their reason.
pub fn verifier_messages(task: &Task, runs: &[AgentRun], custom: Option<&str>) -> Vec<Message> {
    let instructions = custom
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_VERIFIER_PROMPT);

    let sections: Vec<String> = runs
        .iter()
        .map(|run| {
            let title = run.spec.role.title();
            let body = match &run.outcome {
                RunOutcome::Succeeded(text) => text.clone(),
                RunOutcome::Failed(reason) => format!("{title} failed: {reason}"),
                RunOutcome::Pending => format!("{title} produced no output"),
            };
            format!("──── {title} ────\n{body}")
        })
        .collect();

    let mut user = format!(
        "ORIGINAL TASK:\n{}\n\nAGENT OUTPUTS ({} agents):\n\n{}",
        task.instruction,
        runs.len(),
        sections.join("\n\n")
    );
    if let Some(block) = attachments_message(&task.attachments) {
        user.push_str("\n\n");
        user.push_str(&block);
    }

    vec![Message::system(instructions), Message::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::FailureReason;
    use tierswarm_core::{AgentRole, SafetyLevel, Tier};

    fn task() -> Task {
        Task::new("Summarize the repo", Tier::Minimum, SafetyLevel::ReadOnly, "m")
    }

    #[test]
    fn role_prompt_names_title_and_focus() {
        let prompt = agent_system_prompt(&AgentSpec::new(AgentRole::Qa, 5));
        assert!(prompt.contains("QA agent"));
        assert!(prompt.contains(AgentRole::Qa.focus()));
    }

    #[test]
    fn attachments_go_between_system_and_user() {
        let task = task().with_attachments(vec![
            Attachment::new("a.md", "alpha"),
            Attachment::new("b.md", "beta"),
        ]);
        let messages = initial_messages(&AgentSpec::new(AgentRole::Planner, 5), &task);
        assert_eq!(messages.len(), 3);
        let block = messages[1].text().unwrap();
        assert!(block.starts_with("Attached context files:"));
        assert!(block.find("File 1: a.md").unwrap() < block.find("File 2: b.md").unwrap());
        assert_eq!(messages[2], Message::user("Summarize the repo"));

        let plain = initial_messages(&AgentSpec::new(AgentRole::Planner, 5), &self::task());
        assert_eq!(plain.len(), 2);
    }

    #[test]
    fn verifier_sees_every_run_in_order() {
        let mut ok = AgentRun::new(AgentSpec::new(AgentRole::Researcher, 5));
        ok.outcome = RunOutcome::Succeeded("found three modules".into());
        let failed = AgentRun::failed(
            AgentSpec::new(AgentRole::Planner, 5),
            FailureReason::TurnLimit { turns: 5 },
        );

        let messages = verifier_messages(&task(), &[ok, failed], None);
        assert_eq!(messages[0], Message::system(DEFAULT_VERIFIER_PROMPT));
        let user = messages[1].text().unwrap();
        assert!(user.starts_with("ORIGINAL TASK:\nSummarize the repo"));
        assert!(user.contains("AGENT OUTPUTS (2 agents)"));
        assert!(user.find("──── Researcher ────\nfound three modules").unwrap()
            < user.find("Planner failed: turn limit").unwrap());
    }

    #[test]
    fn custom_verifier_prompt_replaces_default() {
        let messages = verifier_messages(&task(), &[], Some("Be brief."));
        assert_eq!(messages[0], Message::system("Be brief."));

        let messages = verifier_messages(&task(), &[], Some("   "));
        assert_eq!(messages[0], Message::system(DEFAULT_VERIFIER_PROMPT));
    }
}
