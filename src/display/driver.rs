// src/display/driver.rs
//! DisplayDriver trait - minimal interface for surface-specific primitives.
//!
//! ## Lifecycle
//! 1. `new()` - Pure initialization, no surface yet
//! 2. `handle_request(Init)` - Open the surface, discover metrics
//! 3. Request/response loop - All operations via messages
//! 4. `Drop` - Cleanup (no explicit shutdown message)

use crate::display::messages::{DisplayError, DriverConfig, DriverRequest, DriverResponse};
use anyhow::Result;

/// Minimal surface-specific display driver interface.
///
/// Implementations provide only the primitives needed for their surface.
/// All common logic lives in DisplayManager.
pub trait DisplayDriver {
    fn new(config: &DriverConfig) -> Result<Self>
    where
        Self: Sized;

    /// Handle a request from DisplayManager, returning a response.
    ///
    /// ## Request/Response Pairs
    /// - `Init` → `InitComplete`
    /// - `PollEvents` → `Events`
    /// - `RequestFramebuffer` → `Framebuffer`
    /// - `Present(buf)` → `PresentComplete(buf)`
    /// - `SetTitle(s)` → `TitleSet`
    /// - `SaveSnapshot(path)` → `SnapshotSaved`
    fn handle_request(&mut self, request: DriverRequest) -> Result<DriverResponse, DisplayError>;
}
