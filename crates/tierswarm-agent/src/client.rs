// ABOUTME: Factory for model clients by provider name.
// ABOUTME: Resolves provider + optional base URL and model into a configured (Arc<dyn ModelClient>, model) pair.

use std::sync::Arc;

use crate::model::ModelClient;
use crate::providers::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, OllamaClient};
use crate::providers::openai::{
    DEFAULT_XAI_MODEL, OPENAI_BASE_URL, OpenAiCompatibleClient, XAI_BASE_URL,
};

/// Default model for a provider when none is configured.
pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "xai" => Some(DEFAULT_XAI_MODEL),
        "openai" => Some("gpt-4o"),
        "ollama" => Some(DEFAULT_OLLAMA_MODEL),
        _ => None,
    }
}

/// Create a model client for the given provider name.
///
/// Returns a tuple of (client, resolved_model). The base URL and model fall
/// back to provider defaults when not given.
pub fn create_model_client(
    provider: &str,
    base_url: Option<&str>,
    model: Option<&str>,
) -> Result<(Arc<dyn ModelClient>, String), anyhow::Error> {
    let provider = provider.trim().to_ascii_lowercase();
    let resolved_model = match model.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_string(),
        None => default_model(&provider)
            .ok_or_else(|| anyhow::anyhow!("unsupported model provider: {}", provider))?
            .to_string(),
    };

    let client: Arc<dyn ModelClient> = match provider.as_str() {
        "xai" => Arc::new(OpenAiCompatibleClient::new(
            "xai",
            base_url.unwrap_or(XAI_BASE_URL),
        )),
        "openai" => Arc::new(OpenAiCompatibleClient::new(
            "openai",
            base_url.unwrap_or(OPENAI_BASE_URL),
        )),
        "ollama" => Arc::new(OllamaClient::new(base_url.unwrap_or(DEFAULT_OLLAMA_URL))),
        unknown => return Err(anyhow::anyhow!("unsupported model provider: {}", unknown)),
    };

    tracing::debug!(provider = %provider, model = %resolved_model, "model client created");
    Ok((client, resolved_model))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Uses match instead of unwrap_err() because Arc<dyn ModelClient> doesn't impl Debug.
    fn expect_err(result: Result<(Arc<dyn ModelClient>, String), anyhow::Error>) -> String {
        match result {
            Err(e) => e.to_string(),
            Ok((_client, model)) => panic!("expected error, got Ok with model: {}", model),
        }
    }

    #[test]
    fn xai_defaults() {
        let (client, model) = create_model_client("xai", None, None).unwrap();
        assert_eq!(client.provider_name(), "xai");
        assert_eq!(model, "grok-4-0709");
    }

    #[test]
    fn explicit_model_wins() {
        let (_, model) = create_model_client("XAI", None, Some("grok-3-mini")).unwrap();
        assert_eq!(model, "grok-3-mini");

        let (_, model) = create_model_client("openai", None, Some("  ")).unwrap();
        assert_eq!(model, "gpt-4o");
    }

    #[test]
    fn ollama_with_custom_url() {
        let (client, model) =
            create_model_client("ollama", Some("http://gpu-box:11434"), None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(model, DEFAULT_OLLAMA_MODEL);
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = expect_err(create_model_client("gemini", None, Some("x")));
        assert!(err.contains("unsupported model provider"));
        assert!(err.contains("gemini"));

        let err = expect_err(create_model_client("nope", None, None));
        assert!(err.contains("nope"));
    }
}
