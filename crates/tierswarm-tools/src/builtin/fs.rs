// ABOUTME: Filesystem tools: read_file, list_directory, write_file and append_file.
// ABOUTME: Reads are read-only class; writes create parent directories and need confirmation.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Value, json};
use tierswarm_core::SafetyClass;
use tokio::io::AsyncWriteExt;

use crate::error::ToolError;
use crate::tool::{Tool, str_arg, truncate_chars};

pub const MAX_READ_CHARS: usize = 50_000;
const PREVIEW_CHARS: usize = 300;

/// Expand a leading `~` to the user's home directory.
pub fn expand_path(raw: &str) -> PathBuf {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match (raw.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            let mut path = PathBuf::from(home);
            let rest = rest.trim_start_matches(['/', '\\']);
            if !rest.is_empty() {
                path.push(rest);
            }
            path
        }
        _ => PathBuf::from(raw),
    }
}

fn preview(content: &str) -> String {
    match truncate_chars(content, PREVIEW_CHARS) {
        (kept, true) => format!("{kept}..."),
        (kept, false) => kept,
    }
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {"path": {"type": "string", "description": description}},
        "required": ["path"]
    })
}

fn write_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": "File path to write to"},
            "content": {"type": "string", "description": "Text content to write"}
        },
        "required": ["path", "content"]
    })
}

pub struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the text contents of a file."
    }

    fn parameters(&self) -> Value {
        path_schema("Absolute or relative file path")
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::ReadOnly
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = expand_path(str_arg(self.name(), &args, "path")?);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ToolError::execution(self.name(), format!("{}: {e}", path.display())))?;
        let text = String::from_utf8_lossy(&bytes);
        let (content, truncated) = truncate_chars(&text, MAX_READ_CHARS);
        Ok(json!({
            "content": content,
            "length": text.chars().count(),
            "truncated": truncated,
        }))
    }
}

pub struct ListDirectory;

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "List files and sub-directories in a folder."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory path (default '.')"}
            },
            "required": []
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::ReadOnly
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let raw = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let path = expand_path(raw);
        let fail = |e: std::io::Error| ToolError::execution("list_directory", format!("{raw}: {e}"));

        let mut reader = tokio::fs::read_dir(&path).await.map_err(fail)?;
        let mut directories = Vec::new();
        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(fail)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => directories.push(format!("{name}/")),
                Ok(_) => files.push(name),
                Err(e) => tracing::debug!(entry = %name, error = %e, "skipping unreadable entry"),
            }
        }
        directories.sort();
        files.sort();

        Ok(json!({"directories": directories, "files": files}))
    }
}

pub struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write text content to a file, replacing it. Creates parent directories if needed."
    }

    fn parameters(&self) -> Value {
        write_schema()
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        let path = args["path"].as_str().unwrap_or("?");
        let content = args["content"].as_str().unwrap_or("");
        format!("Write file {path}\nPreview:\n{}", preview(content))
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = expand_path(str_arg(self.name(), &args, "path")?);
        let content = str_arg(self.name(), &args, "content")?;
        let fail = |e: std::io::Error| ToolError::execution("write_file", format!("{}: {e}", path.display()));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }
        tokio::fs::write(&path, content).await.map_err(fail)?;

        Ok(json!({
            "message": format!("Wrote {} chars to {}", content.chars().count(), path.display())
        }))
    }
}

pub struct AppendFile;

#[async_trait]
impl Tool for AppendFile {
    fn name(&self) -> &'static str {
        "append_file"
    }

    fn description(&self) -> &'static str {
        "Append text content to the end of a file, creating it if missing."
    }

    fn parameters(&self) -> Value {
        write_schema()
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        let path = args["path"].as_str().unwrap_or("?");
        let content = args["content"].as_str().unwrap_or("");
        format!("Append to file {path}\nPreview:\n{}", preview(content))
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = expand_path(str_arg(self.name(), &args, "path")?);
        let content = str_arg(self.name(), &args, "content")?;
        let fail = |e: std::io::Error| ToolError::execution("append_file", format!("{}: {e}", path.display()));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(fail)?;
        file.write_all(content.as_bytes()).await.map_err(fail)?;
        file.flush().await.map_err(fail)?;

        Ok(json!({
            "message": format!("Appended {} chars to {}", content.chars().count(), path.display())
        }))
    }
}
