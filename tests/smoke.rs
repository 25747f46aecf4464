// ABOUTME: End-to-end swarm tests wiring the coordinator, gate, registry and verifier together.
// ABOUTME: Uses scripted model clients and approval boundaries so no network or human is involved.

use std::sync::Arc;
use std::time::Duration;

use tierswarm_agent::testing::{RecordingTool, ScriptedModelClient, tool_call_reply};
use tierswarm_agent::{
    FailureReason, Message, ModelError, ModelReply, RunnerConfig, SwarmCoordinator, SwarmOutcome, SwarmOptions,
};
use tierswarm_core::testing::ScriptedApproval;
use tierswarm_core::{ApprovalBoundary, CredentialRotator, SafetyClass, SafetyLevel, Task, Tier, ToolDecision};
use tierswarm_tools::{ToolRegistry, ToolSettings, standard_registry};
use tokio_util::sync::CancellationToken;

/// Registry with one read-only and one confirmed tool.
fn registry() -> (Arc<ToolRegistry>, Arc<RecordingTool>, Arc<RecordingTool>) {
    let look = Arc::new(RecordingTool::new("look", SafetyClass::ReadOnly));
    let touch = Arc::new(RecordingTool::new("touch", SafetyClass::Confirmed));
    let mut registry = ToolRegistry::new();
    registry.register(look.clone()).unwrap();
    registry.register(touch.clone()).unwrap();
    (Arc::new(registry), look, touch)
}

fn rotator(keys: &[&str]) -> Arc<CredentialRotator> {
    Arc::new(CredentialRotator::new(keys).unwrap())
}

/// Name of the agent role, read from the system prompt at the head of the history.
fn role_of(history: &[Message]) -> String {
    history
        .first()
        .and_then(|m| m.text())
        .and_then(|t| t.strip_prefix("You are the "))
        .and_then(|t| t.split(' ').next())
        .unwrap_or("")
        .to_string()
}

fn tool_results(history: &[Message]) -> usize {
    history.iter().filter(|m| matches!(m, Message::Tool { .. })).count()
}

/// Content of the first tool result in a run's history.
fn first_tool_result(history: &[Message]) -> String {
    history
        .iter()
        .find_map(|m| match m {
            Message::Tool { content, .. } => Some(content.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Each agent calls `tool` once, then answers.
fn calls_tool_once(tool: &'static str) -> ScriptedModelClient {
    ScriptedModelClient::new(move |history| {
        Ok(match tool_results(history) {
            0 => tool_call_reply(&[("c1", tool, "{}")]),
            _ => ModelReply::FinalAnswer(format!("{} done", role_of(history))),
        })
    })
}

async fn completed(outcome: SwarmOutcome) -> (Vec<tierswarm_agent::AgentRun>, String) {
    match outcome {
        SwarmOutcome::Completed(result) => {
            let text = result.answer.collect_text().await.unwrap();
            (result.runs, text)
        }
        SwarmOutcome::Cancelled { .. } => panic!("expected completion"),
    }
}

#[tokio::test]
async fn every_tier_runs_its_roster_before_verifying() {
    for (tier, expected) in [(Tier::Minimum, 2), (Tier::Medium, 4), (Tier::Full, 8)] {
        let client = Arc::new(ScriptedModelClient::answering("answer").with_stream(&["merged"]));
        let (registry, _, _) = registry();
        let swarm = SwarmCoordinator::new(
            client.clone(),
            registry,
            rotator(&["k"]),
            Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
        );

        let task = Task::new("task", tier, SafetyLevel::ReadOnly, "m");
        let (runs, text) = completed(swarm.execute(task, CancellationToken::new()).await).await;

        assert_eq!(runs.len(), expected);
        assert!(runs.iter().all(|r| r.final_text() == Some("answer")));
        assert_eq!(text, "merged");

        let calls = client.calls();
        assert_eq!(calls.len(), expected + 1);
        assert!(calls[..expected].iter().all(|c| !c.streaming));
        assert!(calls[expected].streaming, "verifier must come after every runner");

        let verifier_input = calls[expected].messages[1].text().unwrap().to_string();
        assert!(verifier_input.contains(&format!("AGENT OUTPUTS ({expected} agents)")));
    }
}

#[tokio::test]
async fn read_only_level_denies_confirmed_tools_without_prompting() {
    let client = Arc::new(calls_tool_once("touch"));
    let (registry, _, touch) = registry();
    let approvals = Arc::new(ScriptedApproval::always(ToolDecision::Allow));
    let swarm = SwarmCoordinator::new(client.clone(), registry, rotator(&["k"]), approvals.clone());

    let task = Task::new("task", Tier::Minimum, SafetyLevel::ReadOnly, "m");
    let (runs, _) = completed(swarm.execute(task, CancellationToken::new()).await).await;

    assert_eq!(touch.executions(), 0);
    assert_eq!(approvals.prompt_count(), 0);
    assert!(runs.iter().all(|r| r.final_text().is_some()));
    let refusal = runs[0]
        .history
        .iter()
        .find_map(|m| match m {
            Message::Tool { content, .. } => Some(content.clone()),
            _ => None,
        })
        .unwrap();
    assert!(refusal.contains("read-only"));

    let log = swarm.tool_log().entries();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|e| e.denied));
}

#[tokio::test]
async fn read_only_tools_run_at_every_level() {
    for level in [SafetyLevel::ReadOnly, SafetyLevel::Confirmed, SafetyLevel::FullAuto] {
        let client = Arc::new(calls_tool_once("look"));
        let (registry, look, _) = registry();
        let approvals = Arc::new(ScriptedApproval::always(ToolDecision::Deny));
        let swarm = SwarmCoordinator::new(client, registry, rotator(&["k"]), approvals.clone());

        let task = Task::new("task", Tier::Minimum, level, "m");
        let _ = completed(swarm.execute(task, CancellationToken::new()).await).await;

        assert_eq!(look.executions(), 2, "level {level}");
        assert_eq!(approvals.prompt_count(), 0);
    }
}

#[tokio::test]
async fn full_auto_allows_without_prompting() {
    let client = Arc::new(calls_tool_once("touch"));
    let (registry, _, touch) = registry();
    let approvals = Arc::new(ScriptedApproval::always(ToolDecision::Deny));
    let swarm = SwarmCoordinator::new(client, registry, rotator(&["k"]), approvals.clone());

    let task = Task::new("task", Tier::Medium, SafetyLevel::FullAuto, "m");
    let _ = completed(swarm.execute(task, CancellationToken::new()).await).await;

    assert_eq!(touch.executions(), 4);
    assert_eq!(approvals.prompt_count(), 0);
}

#[tokio::test]
async fn confirmed_level_prompts_and_downgrade_sticks_across_runners() {
    let client = Arc::new(calls_tool_once("touch"));
    let (registry, _, touch) = registry();
    let approvals = Arc::new(ScriptedApproval::sequence(vec![ToolDecision::DenyAndDowngrade]));
    let swarm = SwarmCoordinator::new(client, registry, rotator(&["k"]), approvals.clone());

    let task = Task::new("task", Tier::Full, SafetyLevel::Confirmed, "m");
    let (runs, _) = completed(swarm.execute(task, CancellationToken::new()).await).await;

    assert_eq!(approvals.prompt_count(), 1, "only the first request reaches the user");
    assert_eq!(touch.executions(), 0);
    assert_eq!(runs.len(), 8);
    assert!(runs.iter().all(|r| r.final_text().is_some()));

    let refusals: Vec<String> = runs.iter().map(|r| first_tool_result(&r.history)).collect();
    let answered = refusals
        .iter()
        .filter(|r| r.contains("denied by the user, session switched to read-only"))
        .count();
    let blocked = refusals
        .iter()
        .filter(|r| r.contains("blocked: the session is read-only"))
        .count();
    assert_eq!((answered, blocked), (1, 7));
}

#[tokio::test]
async fn approvals_are_serialized_in_arrival_order() {
    let client = Arc::new(calls_tool_once("touch"));
    let (registry, _, touch) = registry();
    let approvals = Arc::new(
        ScriptedApproval::always(ToolDecision::Allow).with_delay(Duration::from_millis(10)),
    );
    let swarm = SwarmCoordinator::new(client, registry, rotator(&["k"]), approvals.clone());

    let task = Task::new("task", Tier::Medium, SafetyLevel::Confirmed, "m");
    let _ = completed(swarm.execute(task, CancellationToken::new()).await).await;

    assert_eq!(approvals.prompt_count(), 4);
    assert_eq!(approvals.max_concurrent(), 1);
    assert_eq!(touch.executions(), 4);

    let mut requesters: Vec<String> = approvals.seen().into_iter().map(|r| r.requested_by).collect();
    requesters.sort();
    requesters.dedup();
    assert_eq!(requesters.len(), 4, "each runner was prompted once");
}

#[tokio::test]
async fn credentials_rotate_round_robin() {
    for keys in [vec!["only"], vec!["k0", "k1"]] {
        let client = Arc::new(ScriptedModelClient::answering("a"));
        let (registry, _, _) = registry();
        let swarm = SwarmCoordinator::new(
            client.clone(),
            registry,
            rotator(&keys),
            Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
        );

        let task = Task::new("task", Tier::Medium, SafetyLevel::ReadOnly, "m");
        let _ = completed(swarm.execute(task, CancellationToken::new()).await).await;

        let roles = ["Researcher", "Planner", "Coder", "Tester"];
        let calls = client.calls();
        for (i, role) in roles.iter().enumerate() {
            let call = calls
                .iter()
                .find(|c| !c.streaming && role_of(&c.messages) == *role)
                .unwrap();
            assert_eq!(call.credential, keys[i % keys.len()], "{role} with {} keys", keys.len());
        }
        let verifier = calls.iter().find(|c| c.streaming).unwrap();
        assert_eq!(verifier.credential, keys[4 % keys.len()]);
    }
}

#[tokio::test]
async fn one_failing_runner_does_not_stop_the_others() {
    let client = Arc::new(ScriptedModelClient::new(|history| {
        if role_of(history) == "Planner" {
            Err(ModelError::Http {
                status: 500,
                body: "boom".into(),
            })
        } else {
            Ok(ModelReply::FinalAnswer("fine".into()))
        }
    }));
    let (registry, _, _) = registry();
    let swarm = SwarmCoordinator::new(
        client.clone(),
        registry,
        rotator(&["k"]),
        Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
    );

    let task = Task::new("task", Tier::Medium, SafetyLevel::ReadOnly, "m");
    let (runs, _) = completed(swarm.execute(task, CancellationToken::new()).await).await;

    assert!(matches!(runs[1].failure(), Some(FailureReason::Transport(_))));
    assert_eq!(runs.iter().filter(|r| r.final_text().is_some()).count(), 3);

    let verifier = client.calls().into_iter().find(|c| c.streaming).unwrap();
    let input = verifier.messages[1].text().unwrap().to_string();
    assert!(input.contains("Planner failed:"));
    assert!(input.contains("──── Coder ────\nfine"));
}

#[tokio::test]
async fn single_turn_budget_with_endless_tool_calls_is_incomplete() {
    let client = Arc::new(ScriptedModelClient::new(|_| Ok(tool_call_reply(&[("c", "look", "{}")]))));
    let (registry, _, _) = registry();
    let swarm = SwarmCoordinator::new(
        client.clone(),
        registry,
        rotator(&["k"]),
        Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
    )
    .with_options(SwarmOptions {
        max_turns: 1,
        ..SwarmOptions::default()
    });

    let task = Task::new("task", Tier::Minimum, SafetyLevel::ReadOnly, "m");
    let (runs, _) = completed(swarm.execute(task, CancellationToken::new()).await).await;

    for run in &runs {
        assert!(run.failure().is_some_and(FailureReason::is_incomplete));
    }
    assert_eq!(client.stream_calls(), 1, "verifier still runs");
}

#[tokio::test]
async fn cancelling_mid_run_skips_the_verifier() {
    let client = Arc::new(ScriptedModelClient::answering("slow").with_delay(Duration::from_secs(30)));
    let (registry, _, _) = registry();
    let swarm = SwarmCoordinator::new(
        client.clone(),
        registry,
        rotator(&["k"]),
        Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
    );
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let task = Task::new("task", Tier::Medium, SafetyLevel::Confirmed, "m");
    let outcome = swarm.execute(task, cancel).await;

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.runs().len(), 4);
    assert!(
        outcome
            .runs()
            .iter()
            .all(|r| r.failure() == Some(&FailureReason::Cancelled))
    );
    assert_eq!(client.stream_calls(), 0);
}

#[tokio::test]
async fn cancelling_while_waiting_for_approval() {
    let client = Arc::new(calls_tool_once("touch"));
    let (registry, _, touch) = registry();
    let approvals: Arc<dyn ApprovalBoundary> = Arc::new(
        ScriptedApproval::always(ToolDecision::Allow).with_delay(Duration::from_secs(30)),
    );
    let swarm = SwarmCoordinator::new(client.clone(), registry, rotator(&["k"]), approvals);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let task = Task::new("task", Tier::Minimum, SafetyLevel::Confirmed, "m");
    let outcome = swarm.execute(task, cancel).await;

    assert!(outcome.is_cancelled());
    assert_eq!(touch.executions(), 0);
    assert_eq!(client.stream_calls(), 0);
}

#[tokio::test]
async fn standard_tools_are_offered_to_the_model() {
    let client = Arc::new(ScriptedModelClient::new(|history| {
        Ok(match tool_results(history) {
            0 => tool_call_reply(&[("c1", "list_directory", r#"{"path":"."}"#)]),
            _ => ModelReply::FinalAnswer("listed".into()),
        })
    }));
    let registry = Arc::new(standard_registry(ToolSettings::default()).unwrap());
    let swarm = SwarmCoordinator::new(
        client,
        registry,
        rotator(&["k"]),
        Arc::new(ScriptedApproval::always(ToolDecision::Deny)),
    );

    let task = Task::new("task", Tier::Minimum, SafetyLevel::ReadOnly, "m");
    let (runs, _) = completed(swarm.execute(task, CancellationToken::new()).await).await;

    assert!(runs.iter().all(|r| r.final_text() == Some("listed")));
    let entries = swarm.tool_log().entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.success && e.tool == "list_directory"));
}

#[tokio::test]
async fn tool_log_exports_as_json() {
    let client = Arc::new(calls_tool_once("look"));
    let (registry, _, _) = registry();
    let swarm = SwarmCoordinator::new(
        client,
        registry,
        rotator(&["k"]),
        Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
    );

    let task = Task::new("task", Tier::Minimum, SafetyLevel::ReadOnly, "m");
    let _ = completed(swarm.execute(task, CancellationToken::new()).await).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tools.json");
    swarm.tool_log().export(&path).await.unwrap();

    let exported: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let entries = exported.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["tool"], "look");
    assert_eq!(entries[0]["success"], true);
}

#[tokio::test]
async fn slow_tool_fails_its_runner_only() {
    let client = Arc::new(ScriptedModelClient::new(|history| {
        let tool = if role_of(history) == "Researcher" { "slow" } else { "look" };
        Ok(match tool_results(history) {
            0 => tool_call_reply(&[("c1", tool, "{}")]),
            _ => ModelReply::FinalAnswer(format!("{} done", role_of(history))),
        })
    }));
    let look = Arc::new(RecordingTool::new("look", SafetyClass::ReadOnly));
    let slow = Arc::new(RecordingTool::new("slow", SafetyClass::ReadOnly).with_delay(Duration::from_secs(2)));
    let mut registry = ToolRegistry::new();
    registry.register(look.clone()).unwrap();
    registry.register(slow).unwrap();

    let swarm = SwarmCoordinator::new(
        client.clone(),
        Arc::new(registry),
        rotator(&["k"]),
        Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
    )
    .with_options(SwarmOptions {
        runner: RunnerConfig {
            tool_timeout: Duration::from_millis(50),
            ..RunnerConfig::default()
        },
        ..SwarmOptions::default()
    });

    let task = Task::new("task", Tier::Medium, SafetyLevel::ReadOnly, "m");
    let started = std::time::Instant::now();
    let (runs, _) = completed(swarm.execute(task, CancellationToken::new()).await).await;

    assert!(started.elapsed() < Duration::from_secs(1));
    match runs[0].failure() {
        Some(FailureReason::Timeout(msg)) => assert!(msg.contains("slow"), "{msg}"),
        other => panic!("expected the researcher to time out, got {other:?}"),
    }
    for run in &runs[1..] {
        assert_eq!(run.final_text(), Some(format!("{} done", run.spec.role).as_str()));
    }
    assert_eq!(look.executions(), 3);

    let verifier = client.calls().into_iter().find(|c| c.streaming).unwrap();
    let input = verifier.messages[1].text().unwrap().to_string();
    assert!(input.contains("Researcher failed:"));
}

#[tokio::test]
async fn tool_log_exports_as_readable_text() {
    let client = Arc::new(calls_tool_once("touch"));
    let (registry, _, _) = registry();
    let swarm = SwarmCoordinator::new(
        client,
        registry,
        rotator(&["k"]),
        Arc::new(ScriptedApproval::always(ToolDecision::Allow)),
    );

    let task = Task::new("task", Tier::Minimum, SafetyLevel::ReadOnly, "m");
    let _ = completed(swarm.execute(task, CancellationToken::new()).await).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tools.txt");
    swarm.tool_log().export_text(&path).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Tool log: 2 entries\n"));
    assert_eq!(text.matches("BLOCKED").count(), 2);
    assert_eq!(text.matches("reason: blocked: the session is read-only").count(), 2);
    assert!(text.contains("-> touch({})"));
}
