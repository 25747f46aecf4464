// ABOUTME: Ollama adapter implementing ModelClient against a local /api/chat endpoint.
// ABOUTME: Used mainly as a local verifier backend; streams newline-delimited JSON.

use async_trait::async_trait;
use serde_json::{Value, json};
use tierswarm_core::Credential;

use crate::model::{Message, ModelClient, ModelError, ModelReply, TextStream, ToolCall};
use crate::providers::{LineEvent, check_status, decode_lines, transport};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3:14b";

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn build_request_body(model: &str, messages: &[Message], tools: &[Value], stream: bool) -> Value {
        let mut body = json!({
            "model": model,
            "messages": messages.iter().map(message_json).collect::<Vec<_>>(),
            "stream": stream,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }
        body
    }

    pub fn parse_response(response_body: &Value) -> Result<ModelReply, ModelError> {
        if let Some(error) = response_body.get("error").and_then(|e| e.as_str()) {
            return Err(ModelError::InvalidResponse(error.to_string()));
        }
        let message = response_body
            .get("message")
            .ok_or_else(|| ModelError::InvalidResponse("missing message".to_string()))?;

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
                .enumerate()
                .map(|(i, raw)| {
                    let function = raw.get("function").ok_or_else(|| {
                        ModelError::InvalidResponse("tool_call missing function".to_string())
                    })?;
                    let name = function.get("name").and_then(|n| n.as_str()).ok_or_else(|| {
                        ModelError::InvalidResponse("function missing name".to_string())
                    })?;
                    Ok::<_, ModelError>(ToolCall {
                        id: format!("call_{i}"),
                        name: name.to_string(),
                        arguments: function
                            .get("arguments")
                            .map(|a| a.to_string())
                            .unwrap_or_else(|| "{}".to_string()),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ModelReply::ToolCalls { content, calls });
        }

        Ok(ModelReply::FinalAnswer(content.unwrap_or_default()))
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, ModelError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await
    }
}

fn message_json(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({"role": "system", "content": content}),
        Message::User { content } => json!({"role": "user", "content": content}),
        Message::Assistant { content, tool_calls } => {
            let calls: Vec<Value> = tool_calls
                .iter()
                .map(|call| {
                    let arguments = serde_json::from_str::<Value>(&call.arguments)
                        .unwrap_or_else(|_| Value::String(call.arguments.clone()));
                    json!({"function": {"name": call.name, "arguments": arguments}})
                })
                .collect();
            json!({
                "role": "assistant",
                "content": content.as_deref().unwrap_or(""),
                "tool_calls": calls,
            })
        }
        Message::Tool { content, .. } => json!({"role": "tool", "content": content}),
    }
}

/// Decode one NDJSON line of a streaming chat response.
pub(crate) fn parse_ndjson_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }
    let Ok(chunk) = serde_json::from_str::<Value>(line) else {
        tracing::debug!(line = %line, "ignoring undecodable stream line");
        return LineEvent::Skip;
    };
    if let Some(error) = chunk.get("error").and_then(|e| e.as_str()) {
        return LineEvent::Fail(ModelError::InvalidResponse(error.to_string()));
    }
    match chunk.pointer("/message/content").and_then(|c| c.as_str()) {
        Some(text) if !text.is_empty() => LineEvent::Text(text.to_string()),
        _ if chunk.get("done").and_then(|d| d.as_bool()) == Some(true) => LineEvent::Done,
        _ => LineEvent::Skip,
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn complete(
        &self,
        _credential: &Credential,
        model: &str,
        messages: &[Message],
        tools: &[Value],
    ) -> Result<ModelReply, ModelError> {
        let body = Self::build_request_body(model, messages, tools, false);
        let json: Value = self
            .post(&body)
            .await?
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Self::parse_response(&json)
    }

    async fn complete_streaming(
        &self,
        _credential: &Credential,
        model: &str,
        messages: &[Message],
    ) -> Result<TextStream, ModelError> {
        let body = Self::build_request_body(model, messages, &[], true);
        let response = self.post(&body).await?;
        Ok(decode_lines(response.bytes_stream(), parse_ndjson_line))
    }

    async fn list_models(&self, _credential: &Credential) -> Result<Vec<String>, ModelError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(transport)?;
        let json: Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(|n| n.as_str()).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};

    #[test]
    fn tool_arguments_sent_as_objects() {
        let messages = vec![Message::Assistant {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_0".into(),
                name: "read_file".into(),
                arguments: r#"{"path":"a.txt"}"#.into(),
            }],
        }];
        let body = OllamaClient::build_request_body("llama3", &messages, &[], false);
        let call = &body["messages"][0]["tool_calls"][0]["function"];
        assert_eq!(call["arguments"]["path"], "a.txt");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn parses_tool_calls_with_generated_ids() {
        let response = json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "list_directory", "arguments": {"path": "."}}}]
            },
            "done": true
        });
        match OllamaClient::parse_response(&response).unwrap() {
            ModelReply::ToolCalls { content, calls } => {
                assert!(content.is_none());
                assert_eq!(calls[0].id, "call_0");
                assert_eq!(calls[0].arguments, r#"{"path":"."}"#);
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ndjson_stream_ends_on_done() {
        let lines = vec![
            Ok::<_, std::io::Error>("{\"message\":{\"content\":\"Mer\"},\"done\":false}\n"),
            Ok("{\"message\":{\"content\":\"ged\"},\"done\":false}\n{\"message\":{\"content\":\"\"},\"done\":true}\n"),
        ];
        let chunks: Vec<String> = decode_lines(stream::iter(lines), parse_ndjson_line)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), "Merged");
    }

    #[test]
    fn ndjson_error_fails() {
        assert!(matches!(
            parse_ndjson_line(r#"{"error":"model not found"}"#),
            LineEvent::Fail(ModelError::InvalidResponse(m)) if m == "model not found"
        ));
    }
}
