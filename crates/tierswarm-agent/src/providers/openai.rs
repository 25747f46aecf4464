// ABOUTME: OpenAI-compatible chat-completions adapter implementing ModelClient (xAI by default).
// ABOUTME: Builds function-calling request bodies, parses tool calls, and decodes SSE streaming deltas.

use async_trait::async_trait;
use serde_json::{Value, json};
use tierswarm_core::Credential;

use crate::model::{Message, ModelClient, ModelError, ModelReply, TextStream, ToolCall};
use crate::providers::{LineEvent, check_status, decode_lines, transport};

pub const XAI_BASE_URL: &str = "https://api.x.ai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_XAI_MODEL: &str = "grok-4-0709";
const MAX_TOKENS: u32 = 8192;

/// Models offered when the provider's listing endpoint is unreachable.
pub const KNOWN_XAI_MODELS: &[&str] = &[
    "grok-4-0709",
    "grok-4-fast-reasoning",
    "grok-4-fast-non-reasoning",
    "grok-4-1-fast-reasoning",
    "grok-4-1-fast-non-reasoning",
    "grok-3",
    "grok-3-mini",
    "grok-code-fast-1",
];

/// Adapter for any endpoint speaking the Chat Completions protocol.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    provider: String,
}

impl OpenAiCompatibleClient {
    pub fn new(provider: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider: provider.into(),
        }
    }

    pub fn xai() -> Self {
        Self::new("xai", XAI_BASE_URL)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the JSON request body for a chat-completions call.
    pub fn build_request_body(model: &str, messages: &[Message], tools: &[Value], stream: bool) -> Value {
        let mut body = json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "messages": messages.iter().map(message_json).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
            body["tool_choice"] = json!("auto");
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    /// Parse a chat-completions response into a ModelReply.
    pub fn parse_response(response_body: &Value) -> Result<ModelReply, ModelError> {
        let choice = response_body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("missing choices in response".to_string()))?;

        let message = choice
            .get("message")
            .ok_or_else(|| ModelError::InvalidResponse("missing message in choice".to_string()))?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        if let Some(raw_calls) = message.get("tool_calls").and_then(|t| t.as_array())
            && !raw_calls.is_empty()
        {
            let calls = raw_calls
                .iter()
                .map(parse_tool_call)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ModelReply::ToolCalls { content, calls });
        }

        Ok(ModelReply::FinalAnswer(content.unwrap_or_default()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post(&self, credential: &Credential, body: &Value) -> Result<reqwest::Response, ModelError> {
        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(credential.expose())
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await
    }
}

/// Convert a history message to the wire format.
fn message_json(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({"role": "system", "content": content}),
        Message::User { content } => json!({"role": "user", "content": content}),
        Message::Assistant { content, tool_calls } => {
            let mut value = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                value["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {"name": call.name, "arguments": call.arguments}
                        })
                    })
                    .collect();
            }
            value
        }
        Message::Tool {
            tool_call_id,
            content,
        } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
    }
}

fn parse_tool_call(raw: &Value) -> Result<ToolCall, ModelError> {
    let function = raw
        .get("function")
        .ok_or_else(|| ModelError::InvalidResponse("tool_call missing function".to_string()))?;

    let name = function
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| ModelError::InvalidResponse("function missing name".to_string()))?;

    // Some compatible servers send arguments as an object instead of a string.
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "{}".to_string(),
        Some(other) => other.to_string(),
    };

    let id = raw
        .get("id")
        .and_then(|i| i.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", ulid::Ulid::new()));

    Ok(ToolCall {
        id,
        name: name.to_string(),
        arguments,
    })
}

/// Decode one Server-Sent Events line of a streaming completion.
pub(crate) fn parse_sse_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return LineEvent::Skip;
    }
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        return LineEvent::Skip;
    };
    if data == "[DONE]" {
        return LineEvent::Done;
    }
    let Ok(chunk) = serde_json::from_str::<Value>(data) else {
        tracing::debug!(line = %data, "ignoring undecodable stream line");
        return LineEvent::Skip;
    };
    if let Some(error) = chunk.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return LineEvent::Fail(ModelError::InvalidResponse(message));
    }
    match chunk
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
    {
        Some(text) if !text.is_empty() => LineEvent::Text(text.to_string()),
        _ => LineEvent::Skip,
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        credential: &Credential,
        model: &str,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<ModelReply, ModelError> {
        let body = Self::build_request_body(model, messages, tools, false);
        let response = self.post(credential, &body).await?;
        let json: Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Self::parse_response(&json)
    }

    async fn complete_streaming(
        &self,
        credential: &Credential,
        model: &str,
        messages: &[Message],
    ) -> Result<TextStream, ModelError> {
        let body = Self::build_request_body(model, messages, &[], true);
        let response = self.post(credential, &body).await?;
        Ok(decode_lines(response.bytes_stream(), parse_sse_line))
    }

    async fn list_models(&self, credential: &Credential) -> Result<Vec<String>, ModelError> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(transport)?;
        let json: Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let mut ids: Vec<String> = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ModelError::InvalidResponse("missing data array".to_string()))?
            .iter()
            .filter_map(|m| m.get("id").and_then(|i| i.as_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }
}
