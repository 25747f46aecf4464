// ABOUTME: Desktop tools: screen capture, OCR, clipboard, keyboard and mouse, plus wait.
// ABOUTME: Each tool delegates to the injected DesktopDriver capability.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tierswarm_core::SafetyClass;

use crate::capability::{CapabilityError, DesktopDriver, MouseButton, ScreenRegion};
use crate::error::ToolError;
use crate::tool::{Tool, int_arg, str_arg, truncate_chars};

pub const MAX_OCR_CHARS: usize = 15_000;
pub const MAX_CLIPBOARD_CHARS: usize = 10_000;
pub const MAX_WAIT_SECS: f64 = 30.0;

fn no_args() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

fn xy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "x": {"type": "integer", "description": "X coordinate"},
            "y": {"type": "integer", "description": "Y coordinate"}
        },
        "required": ["x", "y"]
    })
}

fn driver_err(tool: &str) -> impl Fn(CapabilityError) -> ToolError + '_ {
    move |e| ToolError::execution(tool, e)
}

pub struct TakeScreenshot(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for TakeScreenshot {
    fn name(&self) -> &'static str {
        "take_screenshot"
    }

    fn description(&self) -> &'static str {
        "Take a screenshot of the entire screen."
    }

    fn parameters(&self) -> Value {
        no_args()
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::ReadOnly
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let (w, h) = self.0.screenshot().await.map_err(driver_err(self.name()))?;
        Ok(json!({"message": format!("Screenshot captured ({w}x{h})")}))
    }
}

pub struct OcrScreenshot(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for OcrScreenshot {
    fn name(&self) -> &'static str {
        "ocr_screenshot"
    }

    fn description(&self) -> &'static str {
        "Screenshot the screen and extract all visible text via OCR."
    }

    fn parameters(&self) -> Value {
        no_args()
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::ReadOnly
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let text = self.0.ocr(None).await.map_err(driver_err(self.name()))?;
        let (text, _) = truncate_chars(text.trim(), MAX_OCR_CHARS);
        Ok(json!({"text": text}))
    }
}

pub struct ScreenshotRegion(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for ScreenshotRegion {
    fn name(&self) -> &'static str {
        "screenshot_region"
    }

    fn description(&self) -> &'static str {
        "Capture a rectangular region of the screen and OCR its text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": {"type": "integer", "description": "Left edge"},
                "y": {"type": "integer", "description": "Top edge"},
                "width": {"type": "integer", "minimum": 1, "description": "Width in pixels"},
                "height": {"type": "integer", "minimum": 1, "description": "Height in pixels"}
            },
            "required": ["x", "y", "width", "height"]
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::ReadOnly
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let region = ScreenRegion {
            x: int_arg(&args, "x", 0),
            y: int_arg(&args, "y", 0),
            width: int_arg(&args, "width", 800),
            height: int_arg(&args, "height", 600),
        };
        let text = self.0.ocr(Some(region)).await.map_err(driver_err(self.name()))?;
        let (text, _) = truncate_chars(text.trim(), MAX_OCR_CHARS);
        Ok(json!({
            "text": text,
            "region": format!("{},{} {}x{}", region.x, region.y, region.width, region.height),
        }))
    }
}

pub struct GetClipboard(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for GetClipboard {
    fn name(&self) -> &'static str {
        "get_clipboard"
    }

    fn description(&self) -> &'static str {
        "Get the current clipboard text."
    }

    fn parameters(&self) -> Value {
        no_args()
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::ReadOnly
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let text = self.0.clipboard_text().await.map_err(driver_err(self.name()))?;
        let (text, _) = truncate_chars(&text, MAX_CLIPBOARD_CHARS);
        Ok(json!({"text": text}))
    }
}

pub struct TypeText(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for TypeText {
    fn name(&self) -> &'static str {
        "type_text"
    }

    fn description(&self) -> &'static str {
        "Simulate keyboard typing into the currently focused window."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string", "description": "Text to type"}},
            "required": ["text"]
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        let (text, _) = truncate_chars(args["text"].as_str().unwrap_or(""), 300);
        format!("Type text into focused window:\n{text}")
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let text = str_arg(self.name(), &args, "text")?;
        self.0.type_text(text).await.map_err(driver_err(self.name()))?;
        Ok(json!({"message": format!("Typed {} chars", text.chars().count())}))
    }
}

/// Split "ctrl, s" into ["ctrl", "s"].
fn key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

pub struct PressKeys(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for PressKeys {
    fn name(&self) -> &'static str {
        "press_keys"
    }

    fn description(&self) -> &'static str {
        "Press a keyboard shortcut, e.g. 'ctrl,s' or 'alt,tab'."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"keys": {"type": "string", "description": "Comma-separated key names"}},
            "required": ["keys"]
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        format!("Press keys: {}", key_list(args["keys"].as_str().unwrap_or("")).join("+"))
    }

    fn precheck(&self, args: &Value) -> Result<(), String> {
        if key_list(args["keys"].as_str().unwrap_or("")).is_empty() {
            return Err("no keys given".to_string());
        }
        Ok(())
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let keys = key_list(str_arg(self.name(), &args, "keys")?);
        self.0.press_keys(&keys).await.map_err(driver_err(self.name()))?;
        Ok(json!({"message": format!("Pressed {}", keys.join("+"))}))
    }
}

pub struct Click(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for Click {
    fn name(&self) -> &'static str {
        "click"
    }

    fn description(&self) -> &'static str {
        "Click at specific screen coordinates."
    }

    fn parameters(&self) -> Value {
        let mut schema = xy_schema();
        schema["properties"]["button"] = json!({
            "type": "string",
            "enum": ["left", "right", "middle"],
            "description": "Mouse button (default left)"
        });
        schema
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        format!(
            "Mouse click at ({}, {}) [{}]",
            args["x"],
            args["y"],
            args["button"].as_str().unwrap_or("left")
        )
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let (x, y) = (int_arg(&args, "x", 0), int_arg(&args, "y", 0));
        let button = match args.get("button").and_then(Value::as_str).unwrap_or("left") {
            "right" => MouseButton::Right,
            "middle" => MouseButton::Middle,
            _ => MouseButton::Left,
        };
        self.0.click(x, y, button).await.map_err(driver_err(self.name()))?;
        Ok(json!({"message": format!("Clicked ({x}, {y})")}))
    }
}

pub struct Scroll(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for Scroll {
    fn name(&self) -> &'static str {
        "scroll"
    }

    fn description(&self) -> &'static str {
        "Scroll the mouse wheel up or down on the current window."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "direction": {"type": "string", "enum": ["up", "down"], "description": "Scroll direction (default down)"},
                "amount": {"type": "integer", "minimum": 1, "maximum": 20, "description": "Number of scroll clicks (default 5)"}
            },
            "required": []
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        format!(
            "Scroll {} {} clicks",
            args["direction"].as_str().unwrap_or("down"),
            int_arg(args, "amount", 5)
        )
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let direction = args.get("direction").and_then(Value::as_str).unwrap_or("down");
        let amount = int_arg(&args, "amount", 5).abs();
        let clicks = if direction == "up" { amount } else { -amount };
        self.0.scroll(clicks).await.map_err(driver_err(self.name()))?;
        Ok(json!({"message": format!("Scrolled {direction} {amount} clicks")}))
    }
}

pub struct MouseMove(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for MouseMove {
    fn name(&self) -> &'static str {
        "mouse_move"
    }

    fn description(&self) -> &'static str {
        "Move the mouse cursor to screen coordinates without clicking."
    }

    fn parameters(&self) -> Value {
        xy_schema()
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, args: &Value) -> String {
        format!("Move mouse to ({}, {})", args["x"], args["y"])
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let (x, y) = (int_arg(&args, "x", 0), int_arg(&args, "y", 0));
        self.0.move_mouse(x, y).await.map_err(driver_err(self.name()))?;
        Ok(json!({"message": format!("Moved mouse to ({x}, {y})")}))
    }
}

pub struct CloseBrowserTab(pub Arc<dyn DesktopDriver>);

#[async_trait]
impl Tool for CloseBrowserTab {
    fn name(&self) -> &'static str {
        "close_browser_tab"
    }

    fn description(&self) -> &'static str {
        "Close the current browser tab (Ctrl+W)."
    }

    fn parameters(&self) -> Value {
        no_args()
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::Confirmed
    }

    fn summarize(&self, _args: &Value) -> String {
        "Close the current browser tab".to_string()
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let keys = vec!["ctrl".to_string(), "w".to_string()];
        self.0.press_keys(&keys).await.map_err(driver_err(self.name()))?;
        Ok(json!({"message": "Closed current browser tab"}))
    }
}

fn wait_seconds(args: &Value) -> f64 {
    args.get("seconds")
        .and_then(Value::as_f64)
        .unwrap_or(2.0)
        .clamp(0.0, MAX_WAIT_SECS)
}

pub struct Wait;

#[async_trait]
impl Tool for Wait {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn description(&self) -> &'static str {
        "Pause for a number of seconds, e.g. to let a page load. Capped at 30."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "seconds": {"type": "number", "minimum": 0, "description": "Seconds to wait (default 2, max 30)"}
            },
            "required": []
        })
    }

    fn safety_class(&self) -> SafetyClass {
        SafetyClass::ReadOnly
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let secs = wait_seconds(&args);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        Ok(json!({"message": format!("Waited {secs:.1}s")}))
    }
}
