// ABOUTME: ToolRegistry maps tool names to executors with compiled JSON-schema validators.
// ABOUTME: Exposes schemas for model calls, pre-gate screening, and validated dispatch by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::{Value, json};
use tierswarm_core::SafetyClass;

use crate::error::ToolError;
use crate::tool::Tool;

/// What the gate needs to know about a call that passed screening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screening {
    pub class: SafetyClass,
    pub summary: String,
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    validator: Validator,
}

/// Registry of invocable tools. Built once per session, then shared read-only.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, compiling its schema. Replaces any tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let schema = tool.parameters();
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| ToolError::InvalidSchema {
                tool: tool.name().to_string(),
                reason: e.to_string(),
            })?;
        self.tools
            .insert(tool.name().to_string(), RegisteredTool { tool, validator });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn safety_class(&self, name: &str) -> Option<SafetyClass> {
        self.tools.get(name).map(|entry| entry.tool.safety_class())
    }

    /// Every tool's schema in chat-completions function format, sorted by name.
    pub fn describe_all(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|entry| {
                json!({
                    "type": "function",
                    "function": {
                        "name": entry.tool.name(),
                        "description": entry.tool.description(),
                        "parameters": entry.tool.parameters(),
                    }
                })
            })
            .collect()
    }

    /// Check a call without running it: the tool exists, its arguments fit
    /// the schema, and its own precheck passes.
    pub fn screen(&self, name: &str, args: &Value) -> Result<Screening, ToolError> {
        let entry = self.lookup(name)?;
        check(entry, args)?;
        Ok(Screening {
            class: entry.tool.safety_class(),
            summary: entry.tool.summarize(args),
        })
    }

    /// Validate and run a call, returning its result as JSON text.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let entry = self.lookup(name)?;
        check(entry, &args)?;
        let output = entry.tool.execute(args).await?;
        Ok(match output {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    fn lookup(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }
}

fn check(entry: &RegisteredTool, args: &Value) -> Result<(), ToolError> {
    let name = entry.tool.name();
    let reasons: Vec<String> = entry
        .validator
        .iter_errors(args)
        .take(3)
        .map(|e| e.to_string())
        .collect();
    if !reasons.is_empty() {
        return Err(ToolError::invalid_args(name, reasons.join("; ")));
    }
    entry
        .tool
        .precheck(args)
        .map_err(|reason| ToolError::execution(name, format!("blocked: {reason}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "Echo the message back."
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            })
        }
        fn safety_class(&self) -> SafetyClass {
            SafetyClass::Confirmed
        }
        fn precheck(&self, args: &Value) -> Result<(), String> {
            match args["message"].as_str() {
                Some("forbidden") => Err("message is forbidden".to_string()),
                _ => Ok(()),
            }
        }
        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"echo": args["message"]}))
        }
    }

    fn registry() -> (ToolRegistry, Arc<Echo>) {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let mut registry = ToolRegistry::new();
        registry.register(echo.clone()).unwrap();
        (registry, echo)
    }

    #[test]
    fn describe_all_uses_function_format() {
        let (registry, _) = registry();
        let described = registry.describe_all();
        assert_eq!(described.len(), 1);
        assert_eq!(described[0]["type"], "function");
        assert_eq!(described[0]["function"]["name"], "echo");
        assert_eq!(described[0]["function"]["parameters"]["required"][0], "message");
    }

    #[tokio::test]
    async fn invoke_runs_valid_call() {
        let (registry, echo) = registry();
        let out = registry.invoke("echo", json!({"message": "hi"})).await.unwrap();
        assert_eq!(out, r#"{"echo":"hi"}"#);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_tool_rejected() {
        let (registry, _) = registry();
        let err = registry.invoke("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(ref n) if n == "nope"));
    }

    #[tokio::test]
    async fn schema_violation_never_executes() {
        let (registry, echo) = registry();
        let err = registry.invoke("echo", json!({"message": 5})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let err = registry.invoke("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn screen_reports_class_and_precheck() {
        let (registry, _) = registry();
        let screening = registry.screen("echo", &json!({"message": "hi"})).unwrap();
        assert_eq!(screening.class, SafetyClass::Confirmed);
        assert!(screening.summary.starts_with("echo"));

        let err = registry
            .screen("echo", &json!({"message": "forbidden"}))
            .unwrap_err();
        assert!(err.to_string().contains("blocked: message is forbidden"));
    }

    #[test]
    fn malformed_schema_rejected_at_registration() {
        struct Broken;
        #[async_trait]
        impl Tool for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }
            fn description(&self) -> &'static str {
                ""
            }
            fn parameters(&self) -> Value {
                json!({"type": 12})
            }
            fn safety_class(&self) -> SafetyClass {
                SafetyClass::ReadOnly
            }
            async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
                Ok(Value::Null)
            }
        }

        let mut registry = ToolRegistry::new();
        let err = registry.register(Arc::new(Broken)).unwrap_err();
        assert!(matches!(err, ToolError::InvalidSchema { .. }));
        assert!(registry.is_empty());
    }
}
