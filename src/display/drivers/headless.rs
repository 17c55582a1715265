//! Headless display driver: an in-memory surface that remembers the last
//! presented frame and can write it out as a PNG.

use crate::display::driver::DisplayDriver;
use crate::display::messages::{
    DisplayError, DisplayEvent, DriverConfig, DriverRequest, DriverResponse,
};
use anyhow::{Context, Result};
use log::{info, trace};
use std::collections::VecDeque;
use std::path::Path;

pub struct HeadlessDisplayDriver {
    width_px: u32,
    height_px: u32,
    framebuffer: Option<Box<[u8]>>,
    last_frame: Option<Vec<u8>>,
    frames_presented: u64,
    title: String,
    pending_events: VecDeque<DisplayEvent>,
}

impl HeadlessDisplayDriver {
    /// The most recently presented frame, if any.
    pub fn last_frame(&self) -> Option<&[u8]> {
        self.last_frame.as_deref()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Queues an event for the next `PollEvents`.
    pub fn push_event(&mut self, event: DisplayEvent) {
        if let DisplayEvent::Resize {
            width_px,
            height_px,
        } = event
        {
            self.width_px = width_px;
            self.height_px = height_px;
            self.framebuffer = Some(vec![0u8; self.buffer_len()].into_boxed_slice());
            self.last_frame = None;
        }
        self.pending_events.push_back(event);
    }

    fn save_png(&self, path: &Path) -> Result<()> {
        let frame = self
            .last_frame
            .as_ref()
            .context("No frame has been presented yet")?;
        image::save_buffer(
            path,
            frame,
            self.width_px,
            self.height_px,
            image::ExtendedColorType::Rgba8,
        )
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        info!("HeadlessDisplayDriver: snapshot written to {}", path.display());
        Ok(())
    }

    fn buffer_len(&self) -> usize {
        self.width_px as usize * self.height_px as usize * 4
    }
}

impl DisplayDriver for HeadlessDisplayDriver {
    fn new(config: &DriverConfig) -> Result<Self> {
        info!(
            "HeadlessDisplayDriver::new() {}x{}",
            config.width_px, config.height_px
        );
        Ok(Self {
            width_px: config.width_px,
            height_px: config.height_px,
            framebuffer: None,
            last_frame: None,
            frames_presented: 0,
            title: config.title.clone(),
            pending_events: VecDeque::new(),
        })
    }

    fn handle_request(&mut self, request: DriverRequest) -> Result<DriverResponse, DisplayError> {
        match request {
            DriverRequest::Init => {
                info!("HeadlessDisplayDriver: Init '{}' - returning metrics", self.title);
                self.framebuffer = Some(vec![0u8; self.buffer_len()].into_boxed_slice());
                Ok(DriverResponse::InitComplete {
                    width_px: self.width_px,
                    height_px: self.height_px,
                })
            }
            DriverRequest::PollEvents => Ok(DriverResponse::Events(
                self.pending_events.drain(..).collect(),
            )),
            DriverRequest::RequestFramebuffer => {
                let wanted = self.buffer_len();
                let buffer = match self.framebuffer.take() {
                    Some(buffer) if buffer.len() == wanted => buffer,
                    Some(_) => vec![0u8; wanted].into_boxed_slice(),
                    None => {
                        return Err(anyhow::anyhow!(
                            "Framebuffer already transferred or not initialized"
                        )
                        .into())
                    }
                };
                Ok(DriverResponse::Framebuffer(buffer))
            }
            DriverRequest::Present(buffer) => {
                if buffer.len() != self.buffer_len() {
                    return Err(DisplayError::PresentationFailed {
                        reason: format!(
                            "buffer holds {} bytes, surface needs {}",
                            buffer.len(),
                            self.buffer_len()
                        ),
                        buffer,
                    });
                }
                trace!("HeadlessDisplayDriver: Present");
                match self.last_frame.as_mut() {
                    Some(last) if last.len() == buffer.len() => last.copy_from_slice(&buffer),
                    _ => self.last_frame = Some(buffer.to_vec()),
                }
                self.frames_presented += 1;
                Ok(DriverResponse::PresentComplete(buffer))
            }
            DriverRequest::SetTitle(title) => {
                info!("HeadlessDisplayDriver: SetTitle '{}'", title);
                self.title = title;
                Ok(DriverResponse::TitleSet)
            }
            DriverRequest::SaveSnapshot(path) => {
                self.save_png(&path)?;
                Ok(DriverResponse::SnapshotSaved)
            }
        }
    }
}
