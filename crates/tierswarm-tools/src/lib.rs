// ABOUTME: Tool registry and built-in local tools that swarm agents can invoke.
// ABOUTME: Tools declare a JSON schema and a safety class; the registry validates and dispatches by name.

pub mod builtin;
pub mod capability;
pub mod error;
pub mod log;
pub mod registry;
pub mod tool;

pub use builtin::{ToolSettings, standard_registry};
pub use capability::{
    CapabilityError, DesktopDriver, Launcher, MouseButton, ScreenRegion, SystemLauncher,
    UnavailableDesktop,
};
pub use error::ToolError;
pub use log::{ToolLog, ToolLogEntry};
pub use registry::{Screening, ToolRegistry};
pub use tool::Tool;
