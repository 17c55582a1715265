// src/display/messages.rs
//! Message types for communication between DisplayManager and DisplayDriver.
//!
//! All communication happens via ownership transfer - no shared state. The
//! framebuffer travels manager → driver in `Present` and comes back in
//! `PresentComplete`, so there is exactly one buffer in flight.

use std::fmt;
use std::path::PathBuf;

/// Parameters a driver needs before it can open a surface.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Preferred surface width. Drivers with a fixed size may ignore it.
    pub width_px: u32,
    /// Preferred surface height.
    pub height_px: u32,
    pub title: String,
}

/// Requests sent from DisplayManager to DisplayDriver.
#[derive(Debug, Clone)]
pub enum DriverRequest {
    /// Open the surface and report its metrics.
    /// Driver responds with InitComplete.
    Init,

    /// Request pending native events from the platform.
    /// Driver responds with Events containing any queued events.
    PollEvents,

    /// Request ownership of the framebuffer for rendering.
    /// Driver responds with Framebuffer containing Box<[u8]>.
    RequestFramebuffer,

    /// Display the framebuffer. Driver takes ownership, displays it, and
    /// responds with PresentComplete.
    Present(Box<[u8]>),

    /// Set the window title.
    SetTitle(String),

    /// Write the last presented frame to an image file.
    SaveSnapshot(PathBuf),
}

/// Responses sent from DisplayDriver to DisplayManager.
#[derive(Debug)]
pub enum DriverResponse {
    /// Initialization complete with discovered metrics.
    InitComplete { width_px: u32, height_px: u32 },

    /// Native events that occurred.
    Events(Vec<DisplayEvent>),

    /// Framebuffer ownership transferred to manager for rendering.
    Framebuffer(Box<[u8]>),

    /// Frame presentation complete, framebuffer ownership returned to manager for reuse.
    PresentComplete(Box<[u8]>),

    /// Window title was set.
    TitleSet,

    /// Snapshot written.
    SnapshotSaved,
}

/// Platform-agnostic display events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// Surface resize. Any framebuffer held by the manager is stale.
    Resize { width_px: u32, height_px: u32 },

    /// User requested the surface be closed.
    CloseRequested,
}

/// Errors returned by a DisplayDriver.
///
/// A failed `Present` hands the buffer back so the manager is never left
/// without a framebuffer.
#[derive(Debug)]
pub enum DisplayError {
    PresentationFailed { buffer: Box<[u8]>, reason: String },
    Unsupported(&'static str),
    Failed(anyhow::Error),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::PresentationFailed { reason, .. } => {
                write!(f, "presentation failed: {}", reason)
            }
            DisplayError::Unsupported(what) => write!(f, "unsupported by this driver: {}", what),
            DisplayError::Failed(e) => write!(f, "{:#}", e),
        }
    }
}

impl std::error::Error for DisplayError {}

impl From<anyhow::Error> for DisplayError {
    fn from(e: anyhow::Error) -> Self {
        DisplayError::Failed(e)
    }
}
