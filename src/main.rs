// ABOUTME: Entry point for the tierswarm binary.
// ABOUTME: Parses CLI arguments, loads .env configuration, runs the swarm and streams the verified answer.

mod config;
mod terminal;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tierswarm_agent::context::load_attachments;
use tierswarm_agent::providers::ollama::OllamaClient;
use tierswarm_agent::providers::openai::KNOWN_XAI_MODELS;
use tierswarm_agent::swarm::SwarmOptions;
use tierswarm_agent::{RunnerConfig, SwarmCoordinator, SwarmOutcome, create_model_client};
use tierswarm_core::{GateConfig, SafetyLevel, Task, Tier};
use tierswarm_tools::{ToolSettings, standard_registry};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::config::{SwarmConfig, VerifierBackend};
use crate::terminal::{TerminalApproval, render_event};

#[derive(Debug, Parser)]
#[command(name = "tierswarm", version, about = "Run a tiered swarm of specialist AI agents on one task")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the swarm on a task and stream the verified answer")]
    Run {
        task: String,
        /// Context file to attach (repeatable)
        #[arg(long = "attach", short = 'a')]
        attach: Vec<PathBuf>,
        /// minimum (2), medium (4) or full (8)
        #[arg(long)]
        tier: Option<Tier>,
        /// read_only, confirmed or full_auto
        #[arg(long)]
        safety: Option<SafetyLevel>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_turns: Option<usize>,
        /// Replace the default verifier instructions
        #[arg(long)]
        verifier_prompt: Option<String>,
        /// Write every tool call to this file when the run ends
        #[arg(long)]
        tool_log: Option<PathBuf>,
        /// Format of the --tool-log file
        #[arg(long, value_enum, default_value_t = ToolLogFormat::Json, requires = "tool_log")]
        tool_log_format: ToolLogFormat,
    },
    #[command(about = "List models offered by the configured provider")]
    Models,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToolLogFormat {
    /// Pretty JSON array of entries
    Json,
    /// Readable transcript, one block per call
    Text,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tierswarm=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = SwarmConfig::from_env().context("invalid configuration")?;

    match cli.command {
        Command::Models => list_models(&config).await,
        Command::Run {
            task,
            attach,
            tier,
            safety,
            model,
            max_turns,
            verifier_prompt,
            tool_log,
            tool_log_format,
        } => {
            let request = RunRequest {
                instruction: task,
                attach,
                tier: tier.unwrap_or(config.tier),
                safety: safety.unwrap_or(config.safety),
                model: model.or_else(|| config.model.clone()),
                max_turns: max_turns.unwrap_or(config.max_turns),
                verifier_prompt,
                tool_log: tool_log.map(|path| (path, tool_log_format)),
            };
            run(&config, request).await
        }
    }
}

struct RunRequest {
    instruction: String,
    attach: Vec<PathBuf>,
    tier: Tier,
    safety: SafetyLevel,
    model: Option<String>,
    max_turns: usize,
    verifier_prompt: Option<String>,
    tool_log: Option<(PathBuf, ToolLogFormat)>,
}

async fn run(config: &SwarmConfig, request: RunRequest) -> anyhow::Result<()> {
    if request.max_turns == 0 {
        anyhow::bail!("--max-turns must be at least 1");
    }

    let rotator = Arc::new(config.rotator()?);
    let (client, model) = create_model_client(
        &config.provider,
        config.base_url.as_deref(),
        request.model.as_deref(),
    )?;
    let registry = Arc::new(standard_registry(ToolSettings::default()).context("failed to build tool registry")?);

    let attachments = load_attachments(&request.attach).await;
    let task = Task::new(request.instruction, request.tier, request.safety, model)
        .with_attachments(attachments);

    let options = SwarmOptions {
        max_turns: request.max_turns,
        runner: RunnerConfig {
            request_timeout: config.request_timeout,
            tool_timeout: config.tool_timeout,
        },
        gate: GateConfig {
            approval_timeout: config.approval_timeout,
        },
        verifier_prompt: request.verifier_prompt,
    };
    let approval = TerminalApproval::stdin().context("failed to start the stdin reader")?;
    let mut swarm = SwarmCoordinator::new(client, registry, rotator, Arc::new(approval)).with_options(options);
    if let VerifierBackend::Ollama { url, model } = &config.verifier {
        tracing::info!(url = %url, model = %model, "verifying with local ollama");
        swarm = swarm.with_verifier(Arc::new(OllamaClient::new(url.clone())), model.clone());
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ncancelling...");
                cancel.cancel();
            }
        }
    });

    let mut events = swarm.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => eprintln!("{}", render_event(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress display fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = swarm.execute(task, cancel).await;

    let result = match outcome {
        SwarmOutcome::Cancelled { runs } => {
            let finished = runs.iter().filter(|r| r.final_text().is_some()).count();
            Err(anyhow::anyhow!(
                "cancelled after {finished} of {} agents finished",
                runs.len()
            ))
        }
        SwarmOutcome::Completed(result) => {
            for run in &result.runs {
                if let Some(reason) = run.failure() {
                    eprintln!("{} failed: {reason}", run.spec.role);
                }
            }
            eprintln!();
            stream_answer(result.answer).await
        }
    };

    if let Some((path, format)) = &request.tool_log {
        let log = swarm.tool_log();
        let written = match format {
            ToolLogFormat::Json => log.export(path).await,
            ToolLogFormat::Text => log.export_text(path).await,
        };
        written
            .with_context(|| format!("failed to write tool log to {}", path.display()))?;
        eprintln!("tool log ({} calls) written to {}", log.len(), path.display());
    }

    result
}

async fn stream_answer(mut answer: tierswarm_agent::VerifierStream) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    while let Some(chunk) = answer.next().await {
        let chunk = chunk.context("verifier failed")?;
        stdout.write_all(chunk.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

async fn list_models(config: &SwarmConfig) -> anyhow::Result<()> {
    let (client, default) = create_model_client(&config.provider, config.base_url.as_deref(), config.model.as_deref())?;

    let listed = match config.rotator() {
        Ok(rotator) => client.list_models(&rotator.next()).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not list models");
            Vec::new()
        }),
        Err(e) => {
            tracing::warn!(error = %e, "no credentials, showing known models");
            Vec::new()
        }
    };

    let models: Vec<String> = if listed.is_empty() && config.provider == "xai" {
        KNOWN_XAI_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        listed
    };

    for model in models {
        let marker = if model == default { " (default)" } else { "" };
        println!("{model}{marker}");
    }
    Ok(())
}
