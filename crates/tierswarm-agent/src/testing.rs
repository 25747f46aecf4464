// ABOUTME: Test doubles for the agent crate: a scripted model client and a recording tool.
// ABOUTME: Shared by unit tests here and by the end-to-end swarm tests at the workspace root.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::{Value, json};
use tierswarm_core::{Credential, SafetyClass};
use tierswarm_tools::{Tool, ToolError};

use crate::model::{Message, ModelClient, ModelError, ModelReply, TextStream, ToolCall};

type Script = dyn Fn(&[Message]) -> Result<ModelReply, ModelError> + Send + Sync;

/// One call observed by a ScriptedModelClient.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub streaming: bool,
    pub credential: String,
    pub messages: Vec<Message>,
}

/// A ModelClient whose non-streaming replies come from a closure over the
/// history, and whose streaming reply is a fixed list of chunks.
pub struct ScriptedModelClient {
    script: Box<Script>,
    stream_chunks: Vec<String>,
    stream_error: Option<ModelError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModelClient {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&[Message]) -> Result<ModelReply, ModelError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            stream_chunks: vec!["verified".to_string()],
            stream_error: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `text` and never asks for tools.
    pub fn answering(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(ModelReply::FinalAnswer(text.clone())))
    }

    pub fn with_stream(mut self, chunks: &[&str]) -> Self {
        self.stream_chunks = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Fail streaming calls before any chunk is produced.
    pub fn with_stream_error(mut self, error: ModelError) -> Self {
        self.stream_error = Some(error);
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn complete_calls(&self) -> usize {
        self.calls().iter().filter(|c| !c.streaming).count()
    }

    pub fn stream_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.streaming).count()
    }

    fn observe(&self, streaming: bool, credential: &Credential, messages: &[Message]) {
        self.calls.lock().unwrap().push(RecordedCall {
            streaming,
            credential: credential.expose().to_string(),
            messages: messages.to_vec(),
        });
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(
        &self,
        credential: &Credential,
        _model: &str,
        messages: &[Message],
        _tools: &[Value],
    ) -> Result<ModelReply, ModelError> {
        self.observe(false, credential, messages);
        self.pause().await;
        (self.script)(messages)
    }

    async fn complete_streaming(
        &self,
        credential: &Credential,
        _model: &str,
        messages: &[Message],
    ) -> Result<TextStream, ModelError> {
        self.observe(true, credential, messages);
        self.pause().await;
        if let Some(error) = &self.stream_error {
            return Err(error.clone());
        }
        let chunks: Vec<Result<String, ModelError>> =
            self.stream_chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Build a ToolCalls reply from (id, tool, raw arguments) triples.
pub fn tool_call_reply(calls: &[(&str, &str, &str)]) -> ModelReply {
    ModelReply::ToolCalls {
        content: None,
        calls: calls
            .iter()
            .map(|(id, name, arguments)| ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            })
            .collect(),
    }
}

/// A tool of a chosen class that accepts any object and counts executions.
pub struct RecordingTool {
    name: &'static str,
    class: SafetyClass,
    delay: Option<Duration>,
    executions: AtomicUsize,
}

impl RecordingTool {
    pub fn new(name: &'static str, class: SafetyClass) -> Self {
        Self {
            name,
            class,
            delay: None,
            executions: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "Records that it ran"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    fn safety_class(&self) -> SafetyClass {
        self.class
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({"success": true, "run": n, "echo": args}))
    }
}
