// src/orchestrator.rs
//! Orchestrates the frame loop, coordinating between the ROM loader, the text
//! buffer, the blinking cursor, the render context, and the display manager.
//!
//! One call to `process_frame` is one tick: drain surface events, pick up the
//! ROM if it has arrived, advance the cursor, redraw if anything changed, and
//! present.

use crate::config::Config;
use crate::cursor::BlinkingCursor;
use crate::display::{DisplayEvent, DisplayManager};
use crate::loader::{LoadStatus, RomLoader};
use crate::renderer::{FrameKind, RenderContext};
use crate::screen::{TextBuffer, CURSOR_CODE, SPACE, WELCOME_CURSOR};

use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use std::path::Path;
use std::time::{Duration, Instant};

/// Represents the status of the orchestrator after one frame.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OrchestratorStatus {
    /// The frame was handled and the loop should continue.
    Running,
    /// The surface asked to close.
    Shutdown,
}

pub struct ScreenOrchestrator {
    text: TextBuffer,
    context: RenderContext,
    display: DisplayManager,
    loader: RomLoader,
    cursor: BlinkingCursor,
    /// The framebuffer between frames. `None` until first requested, and
    /// again after a resize makes the old one stale.
    framebuffer: Option<Box<[u8]>>,
    last_kind: Option<FrameKind>,
    needs_redraw: bool,
    frame_duration: Duration,
    frames_presented: u64,
}

impl ScreenOrchestrator {
    /// Builds the boot screen and a render context sized to `display`.
    pub fn new(config: &Config, display: DisplayManager, loader: RomLoader) -> Result<Self> {
        let mut text = TextBuffer::new();
        text.write_welcome_message();

        let cursor = BlinkingCursor::from_config(&config.cursor, &config.performance);
        if cursor.position() != WELCOME_CURSOR {
            let (row, column) = cursor.position();
            text.set(WELCOME_CURSOR.0, WELCOME_CURSOR.1, SPACE)
                .context("Failed to clear the boot cursor")?;
            text.set(row, column, CURSOR_CODE)
                .with_context(|| format!("Cursor position ({}, {}) is off screen", row, column))?;
        }

        let metrics = display.metrics();
        let context = RenderContext::new(config, metrics.width_px, metrics.height_px);
        info!(
            "ScreenOrchestrator: {}x{} surface, ROM from {}",
            metrics.width_px,
            metrics.height_px,
            loader.source()
        );

        Ok(Self {
            text,
            context,
            display,
            loader,
            cursor,
            framebuffer: None,
            last_kind: None,
            needs_redraw: true,
            frame_duration: config.performance.frame_duration(),
            frames_presented: 0,
        })
    }

    pub fn text(&self) -> &TextBuffer {
        &self.text
    }

    /// Mutable access to the screen. Changes are picked up by the next frame.
    pub fn text_mut(&mut self) -> &mut TextBuffer {
        &mut self.text
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Blocks for up to `timeout` for the ROM and installs it. Returns whether
    /// the ROM is ready afterwards.
    pub fn wait_for_rom(&mut self, timeout: Duration) -> Result<bool> {
        if self.context.is_ready() {
            return Ok(true);
        }
        let status = self.loader.wait(timeout);
        self.apply_load_status(status)?;
        Ok(self.context.is_ready())
    }

    /// Runs one tick of the frame loop.
    pub fn process_frame(&mut self) -> Result<OrchestratorStatus> {
        for event in self.display.poll_events()? {
            debug!("ScreenOrchestrator: Handling DisplayEvent: {:?}", event);
            match event {
                DisplayEvent::CloseRequested => {
                    info!("ScreenOrchestrator: CloseRequested received. Signaling shutdown.");
                    return Ok(OrchestratorStatus::Shutdown);
                }
                DisplayEvent::Resize {
                    width_px,
                    height_px,
                } => {
                    self.context.resize(width_px, height_px);
                    self.framebuffer = None;
                    self.needs_redraw = true;
                }
            }
        }

        let status = self.loader.poll();
        self.apply_load_status(status)?;

        self.cursor.tick(&mut self.text)?;

        let mut buffer = match self.framebuffer.take() {
            Some(buffer) => buffer,
            None => {
                self.needs_redraw = true;
                self.display.request_framebuffer()?
            }
        };

        let text_changed = self.text.take_dirty();
        if text_changed || self.needs_redraw {
            let kind = self.context.draw(&self.text, &mut buffer);
            if self.last_kind != Some(kind) {
                debug!("ScreenOrchestrator: now drawing {:?} frames", kind);
            }
            self.last_kind = Some(kind);
            self.needs_redraw = false;
        } else {
            trace!("ScreenOrchestrator: nothing changed, re-presenting last frame");
        }

        self.framebuffer = Some(self.display.present(buffer)?);
        self.frames_presented += 1;
        Ok(OrchestratorStatus::Running)
    }

    /// Runs frames at the configured rate until the surface closes or
    /// `max_frames` have been presented.
    pub fn run(&mut self, max_frames: Option<u64>) -> Result<()> {
        info!("Starting frame loop...");
        loop {
            if max_frames.is_some_and(|max| self.frames_presented >= max) {
                info!("Frame limit of {} reached.", self.frames_presented);
                return Ok(());
            }
            let started = Instant::now();
            match self.process_frame() {
                Ok(OrchestratorStatus::Running) => {
                    std::thread::sleep(self.frame_duration.saturating_sub(started.elapsed()));
                }
                Ok(OrchestratorStatus::Shutdown) => {
                    info!("Orchestrator requested shutdown. Exiting frame loop.");
                    return Ok(());
                }
                Err(e) => {
                    error!("Error in frame loop: {:#}. Exiting.", e);
                    return Err(e);
                }
            }
        }
    }

    /// Writes the last presented frame to `path`.
    pub fn save_snapshot(&mut self, path: &Path) -> Result<()> {
        if self.frames_presented == 0 {
            warn!("ScreenOrchestrator: snapshot requested before any frame was presented");
        }
        self.display.save_snapshot(path)
    }

    fn apply_load_status(&mut self, status: LoadStatus) -> Result<()> {
        match status {
            LoadStatus::Pending => Ok(()),
            LoadStatus::Loaded(rom) => {
                self.context.install_rom(rom);
                self.needs_redraw = true;
                Ok(())
            }
            LoadStatus::Failed(e) => {
                error!(
                    "Failed to load character ROM from {}: {}",
                    self.loader.source(),
                    e
                );
                Err(anyhow::Error::new(e).context(format!(
                    "Failed to load character ROM from {}",
                    self.loader.source()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::HeadlessDisplayDriver;
    use crate::display::{DisplayDriver, DriverConfig};
    use crate::glyph::{CharacterRom, ROM_SIZE};
    use test_log::test;

    fn headless_display(w: u32, h: u32) -> DisplayManager {
        let config = DriverConfig {
            width_px: w,
            height_px: h,
            title: "test".to_string(),
        };
        DisplayManager::new(Box::new(HeadlessDisplayDriver::new(&config).unwrap())).unwrap()
    }

    fn solid_rom() -> CharacterRom {
        CharacterRom::from_bytes(&[0xFFu8; ROM_SIZE]).unwrap()
    }

    #[test]
    fn test_boot_screen_has_cursor() {
        let config = Config::default();
        let orch = ScreenOrchestrator::new(
            &config,
            headless_display(384, 264),
            RomLoader::ready(solid_rom()),
        )
        .unwrap();
        assert_eq!(orch.text().get(6, 0), Some(CURSOR_CODE));
    }

    #[test]
    fn test_configured_cursor_moves_boot_cursor() {
        let mut config = Config::default();
        config.cursor.row = 10;
        config.cursor.column = 5;
        let orch = ScreenOrchestrator::new(
            &config,
            headless_display(384, 264),
            RomLoader::ready(solid_rom()),
        )
        .unwrap();
        assert_eq!(orch.text().get(6, 0), Some(SPACE));
        assert_eq!(orch.text().get(10, 5), Some(CURSOR_CODE));
    }

    #[test]
    fn test_off_screen_cursor_is_rejected() {
        let mut config = Config::default();
        config.cursor.row = 25;
        assert!(ScreenOrchestrator::new(
            &config,
            headless_display(384, 264),
            RomLoader::ready(solid_rom()),
        )
        .is_err());
    }

    #[test]
    fn test_first_frame_installs_rom() {
        let config = Config::default();
        let mut orch = ScreenOrchestrator::new(
            &config,
            headless_display(384, 264),
            RomLoader::ready(solid_rom()),
        )
        .unwrap();
        assert!(!orch.context().is_ready());
        assert_eq!(orch.process_frame().unwrap(), OrchestratorStatus::Running);
        assert!(orch.context().is_ready());
        assert_eq!(orch.frames_presented(), 1);
    }

    #[test]
    fn test_missing_rom_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RomLoader::spawn(dir.path().join("missing.bin")).unwrap();
        let mut orch =
            ScreenOrchestrator::new(&Config::default(), headless_display(8, 8), loader).unwrap();
        let err = orch.wait_for_rom(Duration::from_secs(5)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load character ROM"));
    }

    #[test]
    fn test_run_stops_at_frame_limit() {
        let mut config = Config::default();
        config.performance.target_fps = 1000;
        let mut orch = ScreenOrchestrator::new(
            &config,
            headless_display(40, 25),
            RomLoader::ready(solid_rom()),
        )
        .unwrap();
        orch.run(Some(3)).unwrap();
        assert_eq!(orch.frames_presented(), 3);
    }
}
