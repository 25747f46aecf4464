// ABOUTME: Errors produced by tool lookup, argument validation and execution.
// ABOUTME: Their Display text is fed back to the model as the tool result.

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{tool} failed: {message}")]
    ExecutionError { tool: String, message: String },

    #[error("tool {tool} declares an invalid schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

impl ToolError {
    pub fn execution(tool: &str, message: impl Display) -> Self {
        ToolError::ExecutionError {
            tool: tool.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_args(tool: &str, reason: impl Display) -> Self {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.to_string(),
        }
    }
}
