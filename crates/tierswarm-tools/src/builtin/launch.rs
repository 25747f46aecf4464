// ABOUTME: Launcher tools: open_url and open_in_editor.
// ABOUTME: URLs are limited to http(s); both tools need confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tierswarm_core::SafetyClass;

use crate::capability::Launcher;
use crate::error::ToolError;
use crate::tool::{Tool, str_arg};

pub struct OpenUrl(pub Arc<dyn Launcher>);

#[async_trait]
impl Tool for OpenUrl {
    fn name(&self) -> &'static str {
        "open_url"
    }

    fn description(&self) -> &'static str {
        "Open a URL in the default web browser, e.g. a search or documentation page."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Full http(s) URL to open"}
            },
            "required": ["url"]
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        format!("Open URL in browser:\n{}", args["url"].as_str().unwrap_or(""))
    }

    fn precheck(&self, args: &Value) -> Result<(), String> {
        let url = args["url"].as_str().unwrap_or("").trim().to_ascii_lowercase();
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(())
        } else {
            Err("only http and https URLs can be opened".to_string())
        }
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let url = str_arg(self.name(), &args, "url")?.trim();
        self.0
            .open_url(url)
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;
        Ok(json!({"message": format!("Opened {url}")}))
    }
}

pub struct OpenInEditor(pub Arc<dyn Launcher>);

#[async_trait]
impl Tool for OpenInEditor {
    fn name(&self) -> &'static str {
        "open_in_editor"
    }

    fn description(&self) -> &'static str {
        "Open a file or folder in the code editor."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File or folder path"}
            },
            "required": ["path"]
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        format!("Open in editor:\n{}", args["path"].as_str().unwrap_or(""))
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = str_arg(self.name(), &args, "path")?;
        self.0
            .open_in_editor(path)
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;
        Ok(json!({"message": format!("Opened {path} in editor")}))
    }
}
