// ABOUTME: Built-in tool set and the factory that registers it.
// ABOUTME: Filesystem, shell, desktop and launcher tools, wired to injectable capabilities.

pub mod desktop;
pub mod fs;
pub mod launch;
pub mod shell;

use std::sync::Arc;
use std::time::Duration;

use crate::capability::{DesktopDriver, Launcher, SystemLauncher, UnavailableDesktop};
use crate::error::ToolError;
use crate::registry::ToolRegistry;

/// Knobs and capabilities for the built-in tools.
#[derive(Clone)]
pub struct ToolSettings {
    pub shell_timeout: Duration,
    pub desktop: Arc<dyn DesktopDriver>,
    pub launcher: Arc<dyn Launcher>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            shell_timeout: shell::DEFAULT_SHELL_TIMEOUT,
            desktop: Arc::new(UnavailableDesktop),
            launcher: Arc::new(SystemLauncher::default()),
        }
    }
}

/// Registry holding every built-in tool.
pub fn standard_registry(settings: ToolSettings) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(fs::ReadFile))?;
    registry.register(Arc::new(fs::ListDirectory))?;
    registry.register(Arc::new(fs::WriteFile))?;
    registry.register(Arc::new(fs::AppendFile))?;

    registry.register(Arc::new(shell::RunShell::new(settings.shell_timeout)))?;

    let d = &settings.desktop;
    registry.register(Arc::new(desktop::TakeScreenshot(d.clone())))?;
    registry.register(Arc::new(desktop::OcrScreenshot(d.clone())))?;
    registry.register(Arc::new(desktop::ScreenshotRegion(d.clone())))?;
    registry.register(Arc::new(desktop::GetClipboard(d.clone())))?;
    registry.register(Arc::new(desktop::TypeText(d.clone())))?;
    registry.register(Arc::new(desktop::PressKeys(d.clone())))?;
    registry.register(Arc::new(desktop::Click(d.clone())))?;
    registry.register(Arc::new(desktop::Scroll(d.clone())))?;
    registry.register(Arc::new(desktop::MouseMove(d.clone())))?;
    registry.register(Arc::new(desktop::CloseBrowserTab(d.clone())))?;
    registry.register(Arc::new(desktop::Wait))?;

    registry.register(Arc::new(launch::OpenUrl(settings.launcher.clone())))?;
    registry.register(Arc::new(launch::OpenInEditor(settings.launcher.clone())))?;

    Ok(registry)
}
