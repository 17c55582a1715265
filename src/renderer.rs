// src/renderer.rs

//! This module defines the `RenderContext`.
//!
//! The `RenderContext` owns everything a frame needs apart from the text
//! itself: the resolved palette, the character ROM (once it has arrived), the
//! rasterizer with its glyph cache, and the viewport of the current surface.
//! It is created once at startup and handed to the frame loop, which passes
//! the text buffer in on every draw.

use crate::config::Config;
use crate::glyph::{CharacterRom, GLYPH_SIZE};
use crate::rasterizer::{Palette, Rgba, SoftwareRasterizer, Viewport};
use crate::screen::{TextBuffer, COLUMNS, ROWS};

use log::{debug, info, trace, warn};

/// Glyphs dumped to the trace log when a ROM is installed.
const TRACED_GLYPHS: usize = 27;

/// Whether the character ROM is usable yet.
#[derive(Debug)]
pub enum RomState {
    /// The ROM is still being fetched. Frames are drawn without glyphs.
    Loading,
    Ready(CharacterRom),
}

/// What a call to `RenderContext::draw` produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Text rendered through the character ROM.
    Text,
    /// Background and border only; the ROM has not arrived.
    Placeholder,
}

/// Owns per-surface render state.
pub struct RenderContext {
    palette: Palette,
    rom: RomState,
    rasterizer: SoftwareRasterizer,
    viewport: Viewport,
    border_c64_px: u32,
}

impl RenderContext {
    /// Creates a context for a surface of `width_px` x `height_px`.
    pub fn new(config: &Config, width_px: u32, height_px: u32) -> Self {
        let palette = Palette {
            foreground: Rgba::from(config.colors.foreground),
            background: Rgba::from(config.colors.background),
            border: Rgba::from(config.colors.border),
        };
        let border_c64_px = config.display.border_px;
        let viewport = viewport_for_surface(width_px, height_px, border_c64_px);
        debug!("RenderContext: viewport {:?}, palette {:?}", viewport, palette);
        Self {
            palette,
            rom: RomState::Loading,
            rasterizer: SoftwareRasterizer::new(),
            viewport,
            border_c64_px,
        }
    }

    /// Installs the character ROM. Replacing an existing ROM drops the glyph
    /// cache so the next frame rebuilds it.
    pub fn install_rom(&mut self, rom: CharacterRom) {
        if matches!(self.rom, RomState::Ready(_)) {
            warn!("RenderContext: replacing an already installed character ROM");
        }
        info!("RenderContext: character ROM installed");
        rom.trace_glyphs(TRACED_GLYPHS);
        self.rasterizer.invalidate();
        self.rom = RomState::Ready(rom);
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.rom, RomState::Ready(_))
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Adapts to a new surface size.
    pub fn resize(&mut self, width_px: u32, height_px: u32) {
        self.viewport = viewport_for_surface(width_px, height_px, self.border_c64_px);
        debug!("RenderContext: resized to {:?}", self.viewport);
    }

    /// Bytes an RGBA framebuffer for the current viewport must hold.
    pub fn framebuffer_len(&self) -> usize {
        self.viewport.width_px * self.viewport.height_px * 4
    }

    /// Draws one frame of `text` into `framebuffer`.
    pub fn draw(&self, text: &TextBuffer, framebuffer: &mut [u8]) -> FrameKind {
        if framebuffer.len() < self.framebuffer_len() {
            warn!(
                "RenderContext: framebuffer holds {} bytes, viewport needs {}",
                framebuffer.len(),
                self.framebuffer_len()
            );
        }
        match &self.rom {
            RomState::Ready(rom) => {
                trace!("RenderContext: drawing text frame");
                self.rasterizer
                    .rasterize(framebuffer, self.viewport, text, rom, &self.palette);
                FrameKind::Text
            }
            RomState::Loading => {
                trace!("RenderContext: ROM pending, drawing placeholder");
                self.rasterizer
                    .clear(framebuffer, self.viewport, &self.palette);
                FrameKind::Placeholder
            }
        }
    }
}

/// Scales the C64 border to whatever surface we were given, keeping the same
/// proportion of border to text area as the real machine.
pub fn viewport_for_surface(width_px: u32, height_px: u32, border_c64_px: u32) -> Viewport {
    let native_w = (COLUMNS * GLYPH_SIZE) as u64 + 2 * border_c64_px as u64;
    let native_h = (ROWS * GLYPH_SIZE) as u64 + 2 * border_c64_px as u64;
    let border_x = width_px as u64 * border_c64_px as u64 / native_w;
    let border_y = height_px as u64 * border_c64_px as u64 / native_h;
    Viewport {
        width_px: width_px as usize,
        height_px: height_px as usize,
        border_x_px: border_x as usize,
        border_y_px: border_y as usize,
    }
}
