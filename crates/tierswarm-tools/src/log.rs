// ABOUTME: In-memory activity log of every resolved tool call in a session.
// ABOUTME: Entries carry timestamps and truncated payloads; exports as JSON or a readable transcript.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::truncate_chars;

const MAX_LOGGED_CHARS: usize = 500;
/// Argument and error excerpts in the readable transcript.
const MAX_LINE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Seconds since the log was created.
    pub elapsed_secs: f64,
    pub agent: String,
    pub tool: String,
    pub arguments: String,
    pub outcome: String,
    pub success: bool,
    /// Refused by the safety gate or a tool's own precheck.
    pub denied: bool,
}

impl ToolLogEntry {
    fn status(&self) -> &'static str {
        if self.success {
            "OK"
        } else if self.denied {
            "BLOCKED"
        } else {
            "FAILED"
        }
    }

    /// One transcript entry: a headline, plus the refusal or error on a
    /// second line when the call did not succeed.
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "[+{:.1}s] {} {} -> {}({})",
            self.elapsed_secs,
            self.status(),
            self.agent,
            self.tool,
            clip_to(&self.arguments, MAX_LINE_CHARS)
        );
        if !self.success {
            let label = if self.denied { "reason" } else { "error" };
            line.push_str(&format!("\n    {label}: {}", clip_to(&self.outcome, MAX_LINE_CHARS)));
        }
        line
    }
}

#[derive(Debug)]
pub struct ToolLog {
    started: DateTime<Utc>,
    entries: Mutex<Vec<ToolLogEntry>>,
}

impl Default for ToolLog {
    fn default() -> Self {
        Self {
            started: Utc::now(),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl ToolLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn record(
        &self,
        agent: &str,
        tool: &str,
        arguments: &Value,
        outcome: &str,
        success: bool,
        denied: bool,
    ) {
        let now = Utc::now();
        let elapsed_ms = (now - self.started).num_milliseconds().max(0);
        let entry = ToolLogEntry {
            timestamp: now,
            elapsed_secs: elapsed_ms as f64 / 1000.0,
            agent: agent.to_string(),
            tool: tool.to_string(),
            arguments: clip(&arguments.to_string()),
            outcome: clip(outcome),
            success,
            denied,
        };
        self.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<ToolLogEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&*self.lock())
    }

    /// Write the log as pretty JSON to `path`.
    pub async fn export(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        tokio::fs::write(path, json).await
    }

    /// Human-readable transcript: a header, then one block per call.
    pub fn to_text(&self) -> String {
        let entries = self.lock();
        let mut lines = vec![
            format!("Tool log: {} entries", entries.len()),
            format!("Session start: {}", self.started.format("%Y-%m-%d %H:%M:%S UTC")),
            "=".repeat(70),
            String::new(),
        ];
        for entry in entries.iter() {
            lines.push(entry.format_line());
            lines.push(String::new());
        }
        lines.join("\n")
    }

    pub async fn export_text(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, self.to_text()).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ToolLogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn clip(text: &str) -> String {
    clip_to(text, MAX_LOGGED_CHARS)
}

fn clip_to(text: &str, max: usize) -> String {
    match truncate_chars(text, max) {
        (kept, true) => format!("{kept}..."),
        (kept, false) => kept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_and_truncates() {
        let log = ToolLog::new();
        let long = "x".repeat(2000);
        log.record("coder-1", "write_file", &json!({"content": long}), "ok", true, false);
        log.record("tester-1", "run_shell", &json!({"command": "ls"}), "denied", false, true);

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].arguments.ends_with("..."));
        assert!(entries[0].arguments.chars().count() <= MAX_LOGGED_CHARS + 3);
        assert!(entries[1].denied);
        assert!(!entries[1].success);
    }

    #[tokio::test]
    async fn exports_json_array() {
        let log = ToolLog::new();
        log.record("qa-1", "read_file", &json!({"path": "a"}), "{}", true, false);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        log.export(&path).await.unwrap();

        let parsed: Vec<ToolLogEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].tool, "read_file");
    }

    #[test]
    fn readable_lines_follow_outcome() {
        let log = ToolLog::new();
        log.record("coder-1", "read_file", &json!({"path": "a.txt"}), "{}", true, false);
        log.record("qa-1", "run_shell", &json!({"command": "shutdown"}), "blocked: system shutdown", false, true);
        log.record("tester-1", "write_file", &json!({"path": "/x"}), "permission denied", false, false);

        let entries = log.entries();
        let ok = entries[0].format_line();
        assert!(ok.starts_with("[+"));
        assert!(ok.contains("OK coder-1 -> read_file({\"path\":\"a.txt\"})"));
        assert!(!ok.contains('\n'));

        let blocked = entries[1].format_line();
        assert!(blocked.contains("BLOCKED qa-1 -> run_shell"));
        assert!(blocked.ends_with("\n    reason: blocked: system shutdown"));

        let failed = entries[2].format_line();
        assert!(failed.contains("FAILED tester-1 -> write_file"));
        assert!(failed.ends_with("\n    error: permission denied"));
    }

    #[tokio::test]
    async fn exports_readable_transcript() {
        let log = ToolLog::new();
        log.record("qa-1", "read_file", &json!({"path": "a"}), "{}", true, false);
        log.record("qa-1", "list_directory", &json!({"path": "."}), "{}", true, false);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.txt");
        log.export_text(&path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Tool log: 2 entries");
        assert!(lines[1].starts_with("Session start: "));
        assert_eq!(lines[2], "=".repeat(70));
        assert!(lines[4].contains("-> read_file("));
        assert!(lines[6].contains("-> list_directory("));
    }

    #[test]
    fn long_arguments_are_shortened_in_transcript() {
        let log = ToolLog::new();
        log.record("coder-1", "write_file", &json!({"content": "y".repeat(400)}), "ok", true, false);
        let line = log.entries()[0].format_line();
        assert!(line.contains("..."));
        assert!(line.chars().count() < 300);
    }
}
