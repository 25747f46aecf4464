// ABOUTME: run_shell tool: executes a command through the platform shell with a timeout.
// ABOUTME: A hard blocklist refuses destructive system commands at every safety level.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tierswarm_core::SafetyClass;

use crate::error::ToolError;
use crate::tool::{Tool, str_arg, truncate_chars};

pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_STDOUT_CHARS: usize = 10_000;
pub const MAX_STDERR_CHARS: usize = 5_000;

/// Substrings that are never allowed, with the reason reported back.
/// Matched against the lowercased command, and again with `/` read as `\`.
const BLOCKLIST: &[(&str, &str)] = &[
    ("uninstall", "cannot uninstall software"),
    ("remove-appxpackage", "cannot remove Windows apps"),
    ("remove-windowsfeature", "cannot remove Windows features"),
    ("remove-windowsoptionalfeature", "cannot remove Windows features"),
    ("format-volume", "cannot format drives"),
    ("format c:", "cannot format drives"),
    ("format d:", "cannot format drives"),
    ("stop-computer", "cannot shut down the computer"),
    ("restart-computer", "cannot restart the computer"),
    ("shutdown", "cannot shut down the computer"),
    ("reboot", "cannot restart the computer"),
    ("poweroff", "cannot shut down the computer"),
    ("clear-recyclebin", "cannot clear the recycle bin"),
    ("bcdedit", "cannot modify boot configuration"),
    ("diskpart", "cannot modify disk partitions"),
    ("mkfs", "cannot format drives"),
    ("dd if=", "cannot write raw devices"),
    ("reg delete", "cannot delete registry keys"),
    ("set-executionpolicy unrestricted", "cannot change execution policy"),
    ("remove-item c:\\windows", "cannot delete Windows system files"),
    ("remove-item c:\\program", "cannot delete Program Files"),
    ("remove-item -recurse c:\\", "cannot recursively delete the C: drive"),
    ("del \\s c:\\windows", "cannot delete Windows system files"),
    ("rmdir \\s c:\\windows", "cannot delete Windows system folders"),
    ("rm -rf /", "cannot recursively delete from the filesystem root"),
    ("rm -rf ~", "cannot recursively delete the home directory"),
    (":(){", "fork bombs are not allowed"),
    ("system32", "cannot touch System32"),
    ("new-service", "cannot create services"),
    ("remove-service", "cannot remove services"),
];

/// Reason `command` is refused, if it matches the blocklist.
pub fn blocked_reason(command: &str) -> Option<&'static str> {
    let lower = command.trim().to_lowercase();
    let backslashed = lower.replace('/', "\\");
    BLOCKLIST
        .iter()
        .find(|(pattern, _)| lower.contains(pattern) || backslashed.contains(pattern))
        .map(|(_, reason)| *reason)
}

pub struct RunShell {
    timeout: Duration,
}

impl RunShell {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(command: &str) -> tokio::process::Command {
        if cfg!(target_os = "windows") {
            let mut c = tokio::process::Command::new("powershell");
            c.args(["-NoProfile", "-Command", command]);
            c
        } else {
            let mut c = tokio::process::Command::new("sh");
            c.args(["-c", command]);
            c
        }
    }
}

#[async_trait]
impl Tool for RunShell {
    fn name(&self) -> &'static str {
        "run_shell"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command (PowerShell on Windows, sh elsewhere) and return stdout, stderr and exit code."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line to run"}
            },
            "required": ["command"]
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        format!("Run shell command:\n{}", args["command"].as_str().unwrap_or(""))
    }

    fn precheck(&self, args: &Value) -> Result<(), String> {
        match args["command"].as_str().and_then(blocked_reason) {
            Some(reason) => Err(reason.to_string()),
            None => Ok(()),
        }
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let command = str_arg(self.name(), &args, "command")?;
        let child = Self::command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::execution(self.name(), e))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ToolError::execution(self.name(), e))?,
            Err(_) => {
                return Err(ToolError::execution(
                    self.name(),
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        let (stdout, _) = truncate_chars(&String::from_utf8_lossy(&output.stdout), MAX_STDOUT_CHARS);
        let (stderr, _) = truncate_chars(&String::from_utf8_lossy(&output.stderr), MAX_STDERR_CHARS);
        tracing::debug!(exit_code = ?output.status.code(), "shell command finished");

        Ok(json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": output.status.code(),
        }))
    }
}
