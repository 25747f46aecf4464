// ABOUTME: Capability traits for desktop input/capture and for launching external apps.
// ABOUTME: Ships an UnavailableDesktop default and a SystemLauncher backed by the platform opener.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0} is unavailable: no desktop driver configured")]
    Unavailable(&'static str),

    #[error("{0}")]
    Failed(String),
}

/// A rectangle on screen, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Screen capture, OCR, clipboard and synthetic input.
#[async_trait]
pub trait DesktopDriver: Send + Sync {
    /// Capture the screen and return its dimensions.
    async fn screenshot(&self) -> Result<(u32, u32), CapabilityError>;

    async fn ocr(&self, region: Option<ScreenRegion>) -> Result<String, CapabilityError>;

    async fn clipboard_text(&self) -> Result<String, CapabilityError>;

    async fn type_text(&self, text: &str) -> Result<(), CapabilityError>;

    async fn press_keys(&self, keys: &[String]) -> Result<(), CapabilityError>;

    async fn click(&self, x: i64, y: i64, button: MouseButton) -> Result<(), CapabilityError>;

    /// Positive scrolls up, negative scrolls down.
    async fn scroll(&self, clicks: i64) -> Result<(), CapabilityError>;

    async fn move_mouse(&self, x: i64, y: i64) -> Result<(), CapabilityError>;
}

/// Driver used when no desktop integration is wired in. Every call fails
/// with a message the model can read.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDesktop;

#[async_trait]
impl DesktopDriver for UnavailableDesktop {
    async fn screenshot(&self) -> Result<(u32, u32), CapabilityError> {
        Err(CapabilityError::Unavailable("screen capture"))
    }

    async fn ocr(&self, _region: Option<ScreenRegion>) -> Result<String, CapabilityError> {
        Err(CapabilityError::Unavailable("OCR"))
    }

    async fn clipboard_text(&self) -> Result<String, CapabilityError> {
        Err(CapabilityError::Unavailable("clipboard"))
    }

    async fn type_text(&self, _text: &str) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("keyboard input"))
    }

    async fn press_keys(&self, _keys: &[String]) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("keyboard input"))
    }

    async fn click(&self, _x: i64, _y: i64, _button: MouseButton) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("mouse input"))
    }

    async fn scroll(&self, _clicks: i64) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("mouse input"))
    }

    async fn move_mouse(&self, _x: i64, _y: i64) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("mouse input"))
    }
}

/// Opens URLs and files in external applications.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn open_url(&self, url: &str) -> Result<(), CapabilityError>;

    async fn open_in_editor(&self, path: &str) -> Result<(), CapabilityError>;
}

/// Launcher that spawns the platform opener and an editor command, detached.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    editor: String,
}

impl SystemLauncher {
    pub fn new(editor: impl Into<String>) -> Self {
        Self {
            editor: editor.into(),
        }
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new("code")
    }
}

#[async_trait]
impl Launcher for SystemLauncher {
    async fn open_url(&self, url: &str) -> Result<(), CapabilityError> {
        let mut command = if cfg!(target_os = "windows") {
            let mut c = tokio::process::Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else if cfg!(target_os = "macos") {
            tokio::process::Command::new("open")
        } else {
            tokio::process::Command::new("xdg-open")
        };
        spawn_detached(command.arg(url))
    }

    async fn open_in_editor(&self, path: &str) -> Result<(), CapabilityError> {
        spawn_detached(tokio::process::Command::new(&self.editor).arg(path))
    }
}

fn spawn_detached(command: &mut tokio::process::Command) -> Result<(), CapabilityError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_child| ())
        .map_err(|e| CapabilityError::Failed(e.to_string()))
}
