// src/display/mod.rs
//! Message-based display system with Strategy Pattern.
//!
//! - DisplayDriver: Surface-specific primitives (headless, console)
//! - DisplayManager: Common logic and framebuffer ownership
//! - Messages: Request/Response protocol for communication

pub mod driver;
pub mod drivers;
pub mod manager;
pub mod messages;

pub use driver::DisplayDriver;
pub use manager::{DisplayManager, DisplayMetrics};
pub use messages::{DisplayError, DisplayEvent, DriverConfig, DriverRequest, DriverResponse};
