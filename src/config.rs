// ABOUTME: Configuration loading for the tierswarm binary.
// ABOUTME: Reads TIERSWARM_* environment variables (after .env) into a validated SwarmConfig.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tierswarm_core::{CoreError, CredentialRotator, SafetyLevel, Tier};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TIERSWARM_API_KEYS: {0}")]
    Credentials(#[from] CoreError),

    #[error("{var} is not valid: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("TIERSWARM_VERIFIER_BACKEND must be 'api' or 'ollama', got '{0}'")]
    UnknownVerifierBackend(String),
}

/// Where the verifier runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierBackend {
    /// Same provider and model as the agents.
    Api,
    /// A local Ollama server.
    Ollama { url: String, model: String },
}

#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub api_keys: Vec<String>,
    pub provider: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub tier: Tier,
    pub safety: SafetyLevel,
    pub max_turns: usize,
    pub request_timeout: Duration,
    pub tool_timeout: Duration,
    /// None waits for the user indefinitely.
    pub approval_timeout: Option<Duration>,
    pub verifier: VerifierBackend,
}

impl SwarmConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// Environment variables:
    /// - TIERSWARM_API_KEYS: comma-separated keys, 1 to 8 (required for `run`)
    /// - TIERSWARM_PROVIDER: xai, openai or ollama (default: xai)
    /// - TIERSWARM_BASE_URL: override the provider endpoint (optional)
    /// - TIERSWARM_MODEL: model id (default: provider default)
    /// - TIERSWARM_TIER: minimum, medium or full (default: medium)
    /// - TIERSWARM_SAFETY: read_only, confirmed or full_auto (default: confirmed)
    /// - TIERSWARM_MAX_TOOL_TURNS: turn budget per agent (default: 5)
    /// - TIERSWARM_REQUEST_TIMEOUT_SECS: per model call (default: 180)
    /// - TIERSWARM_TOOL_TIMEOUT_SECS: per tool execution (default: 60)
    /// - TIERSWARM_APPROVAL_TIMEOUT_SECS: per prompt, 0 disables (default: 120)
    /// - TIERSWARM_VERIFIER_BACKEND: api or ollama (default: api)
    /// - OLLAMA_URL / OLLAMA_MODEL: local verifier endpoint and model
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_keys: Vec<String> = var("TIERSWARM_API_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let provider = var("TIERSWARM_PROVIDER")
            .map(|p| p.to_ascii_lowercase())
            .unwrap_or_else(|| "xai".to_string());

        let tier = parse_or("TIERSWARM_TIER", Tier::Medium)?;
        let safety = parse_or("TIERSWARM_SAFETY", SafetyLevel::Confirmed)?;

        let max_turns: usize = parse_or("TIERSWARM_MAX_TOOL_TURNS", 5)?;
        if max_turns == 0 {
            return Err(ConfigError::Invalid {
                var: "TIERSWARM_MAX_TOOL_TURNS",
                value: "0".to_string(),
            });
        }

        let request_timeout = Duration::from_secs(parse_or("TIERSWARM_REQUEST_TIMEOUT_SECS", 180)?);
        let tool_timeout = Duration::from_secs(parse_or("TIERSWARM_TOOL_TIMEOUT_SECS", 60)?);
        let approval_secs: u64 = parse_or("TIERSWARM_APPROVAL_TIMEOUT_SECS", 120)?;
        let approval_timeout = (approval_secs > 0).then(|| Duration::from_secs(approval_secs));

        let verifier = match var("TIERSWARM_VERIFIER_BACKEND").as_deref() {
            None | Some("api") => VerifierBackend::Api,
            Some("ollama") => VerifierBackend::Ollama {
                url: var("OLLAMA_URL").unwrap_or_else(|| "http://localhost:11434".to_string()),
                model: var("OLLAMA_MODEL").unwrap_or_else(|| "qwen3:14b".to_string()),
            },
            Some(other) => return Err(ConfigError::UnknownVerifierBackend(other.to_string())),
        };

        Ok(Self {
            api_keys,
            provider,
            base_url: var("TIERSWARM_BASE_URL"),
            model: var("TIERSWARM_MODEL"),
            tier,
            safety,
            max_turns,
            request_timeout,
            tool_timeout,
            approval_timeout,
            verifier,
        })
    }

    /// Build the rotator from the configured keys. Local providers need no
    /// key, so a placeholder is used when none is configured.
    pub fn rotator(&self) -> Result<CredentialRotator, ConfigError> {
        if self.api_keys.is_empty() && self.provider == "ollama" {
            return Ok(CredentialRotator::new(["local"])?);
        }
        Ok(CredentialRotator::new(&self.api_keys)?)
    }
}

/// A set, non-blank environment variable.
fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { var: name, value: raw }),
    }
}
