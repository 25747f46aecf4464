// ABOUTME: The Tool trait every invocable tool implements, plus small argument helpers.
// ABOUTME: Tools are stateless executors; safety decisions happen outside them.

use async_trait::async_trait;
use serde_json::Value;
use tierswarm_core::SafetyClass;

use crate::error::ToolError;

/// A locally executed capability a model can request by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema for the arguments object.
    fn parameters(&self) -> Value;

    fn safety_class(&self) -> SafetyClass;

    /// One line describing what a call would do, shown when asking for approval.
    fn summarize(&self, args: &Value) -> String {
        format!("{} {}", self.name(), args)
    }

    /// Hard refusals that apply at every safety level. Runs before the
    /// gate so a refused call never reaches the user.
    fn precheck(&self, _args: &Value) -> Result<(), String> {
        Ok(())
    }

    /// Run the tool. Arguments have already been validated against `parameters()`.
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Cut `text` to at most `max_chars` characters. Returns whether anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    let mut iter = text.chars();
    let kept: String = iter.by_ref().take(max_chars).collect();
    let truncated = iter.next().is_some();
    (kept, truncated)
}

pub(crate) fn str_arg<'a>(tool: &str, args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_args(tool, format!("'{key}' must be a string")))
}

pub(crate) fn int_arg(args: &Value, key: &str, default: i64) -> i64 {
    args.get(key).and_then(Value::as_i64).unwrap_or(default)
}
