// src/display/manager.rs
//! DisplayManager - Synchronous wrapper around DisplayDriver.

use crate::display::driver::DisplayDriver;
use crate::display::messages::{DisplayError, DisplayEvent, DriverRequest, DriverResponse};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Display metrics discovered during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMetrics {
    pub width_px: u32,
    pub height_px: u32,
}

/// DisplayManager owns the driver and tracks surface state.
pub struct DisplayManager {
    driver: Box<dyn DisplayDriver>,
    metrics: DisplayMetrics,
}

impl DisplayManager {
    /// Initializes `driver` and records the metrics it reports.
    pub fn new(mut driver: Box<dyn DisplayDriver>) -> Result<Self> {
        info!("DisplayManager: Initializing driver...");
        let response = driver
            .handle_request(DriverRequest::Init)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to initialize display driver")?;

        let metrics = match response {
            DriverResponse::InitComplete {
                width_px,
                height_px,
            } => {
                info!("DisplayManager: Initialized - {}x{} px", width_px, height_px);
                DisplayMetrics {
                    width_px,
                    height_px,
                }
            }
            other => {
                return Err(anyhow::anyhow!(
                    "Expected InitComplete response, got {:?}",
                    other
                ));
            }
        };

        Ok(Self { driver, metrics })
    }

    /// Drains pending platform events. Resize events update the metrics
    /// before they are handed to the caller.
    pub fn poll_events(&mut self) -> Result<Vec<DisplayEvent>> {
        let events = match self.call(DriverRequest::PollEvents)? {
            DriverResponse::Events(events) => events,
            other => return Err(anyhow::anyhow!("Expected Events, got {:?}", other)),
        };
        for event in &events {
            if let DisplayEvent::Resize {
                width_px,
                height_px,
            } = *event
            {
                debug!("DisplayManager: resize to {}x{}", width_px, height_px);
                self.metrics = DisplayMetrics {
                    width_px,
                    height_px,
                };
            }
        }
        Ok(events)
    }

    /// Takes ownership of the driver's framebuffer.
    pub fn request_framebuffer(&mut self) -> Result<Box<[u8]>> {
        match self.call(DriverRequest::RequestFramebuffer)? {
            DriverResponse::Framebuffer(buffer) => Ok(buffer),
            other => Err(anyhow::anyhow!("Expected Framebuffer, got {:?}", other)),
        }
    }

    /// Presents `buffer` and returns it for reuse.
    ///
    /// A failed presentation is logged and the buffer is returned anyway, so
    /// a single dropped frame never stalls the loop.
    pub fn present(&mut self, buffer: Box<[u8]>) -> Result<Box<[u8]>> {
        match self.driver.handle_request(DriverRequest::Present(buffer)) {
            Ok(DriverResponse::PresentComplete(buffer)) => Ok(buffer),
            Ok(other) => Err(anyhow::anyhow!("Expected PresentComplete, got {:?}", other)),
            Err(DisplayError::PresentationFailed { buffer, reason }) => {
                warn!("DisplayManager: frame dropped: {}", reason);
                Ok(buffer)
            }
            Err(e) => Err(anyhow::anyhow!(e).context("Present failed")),
        }
    }

    pub fn set_title(&mut self, title: &str) -> Result<()> {
        match self.call(DriverRequest::SetTitle(title.to_string()))? {
            DriverResponse::TitleSet => Ok(()),
            other => Err(anyhow::anyhow!("Expected TitleSet, got {:?}", other)),
        }
    }

    /// Asks the driver to write the last presented frame to `path`.
    pub fn save_snapshot(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.call(DriverRequest::SaveSnapshot(path.clone()))
            .with_context(|| format!("Failed to save snapshot to {}", path.display()))?;
        Ok(())
    }

    /// Get current display metrics.
    pub fn metrics(&self) -> DisplayMetrics {
        self.metrics
    }

    fn call(&mut self, request: DriverRequest) -> Result<DriverResponse> {
        self.driver
            .handle_request(request)
            .map_err(|e| anyhow::anyhow!(e))
    }
}
