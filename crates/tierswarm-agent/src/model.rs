// ABOUTME: Defines the ModelClient trait that every chat-completion provider adapter implements.
// ABOUTME: Also defines conversation messages, tool calls, model replies and ModelError.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tierswarm_core::Credential;

/// A tool invocation requested by the model. `arguments` is the raw JSON
/// text the model produced and may not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One role-tagged entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Text content, if the message carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Tool { content, .. } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
        }
    }
}

/// What a single non-streaming model call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    FinalAnswer(String),
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
}

/// Errors that can occur talking to a model provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("rate limited")]
    RateLimited,

    #[error("unauthorized: check the API key")]
    Unauthorized,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,
}

/// Lazily produced text increments from a streaming call.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send + 'static>>;

/// Trait that all model provider adapters implement.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One chat-completion call with tool schemas attached.
    async fn complete(
        &self,
        credential: &Credential,
        model: &str,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<ModelReply, ModelError>;

    /// Streaming call without tools, yielding text as it arrives.
    async fn complete_streaming(
        &self,
        credential: &Credential,
        model: &str,
        messages: &[Message],
    ) -> Result<TextStream, ModelError>;

    /// Model ids offered by the provider.
    async fn list_models(&self, _credential: &Credential) -> Result<Vec<String>, ModelError> {
        Ok(Vec::new())
    }

    /// Provider name for logging and display (e.g. "xai", "ollama").
    fn provider_name(&self) -> &str;
}
