// src/rasterizer.rs

//! Software implementation of the character-cell text mode.
//!
//! Every output pixel is resolved independently, exactly like a fragment
//! shader running over a full-screen quad:
//!
//! ```text
//! (u, v) in [0,1)²  ──scale by (40, 25)──▶  cell (col, row) + fraction
//!                                           fraction × 8 ──▶ pixel (px, py)
//! code  = text[col, row]
//! byte  = rom[code][py]
//! fg?   = bit (7 - px) of byte
//! ```
//!
//! `sample_cell` and `is_foreground` are the reference decode. The frame
//! path (`SoftwareRasterizer::rasterize`) goes through a pre-expanded
//! `GlyphAtlas` for speed and must produce identical pixels.

use crate::color::Color;
use crate::glyph::{CharacterRom, GLYPH_COUNT, GLYPH_SIZE};
use crate::screen::{TextBuffer, COLUMNS, ROWS};
use log::trace;
use once_cell::unsync::OnceCell;

/// RGBA color in 32-bit format (8 bits per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Convert to RGBA byte array
    pub fn to_bytes(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<Color> for Rgba {
    fn from(color: Color) -> Self {
        let (r, g, b) = color.rgb();
        Rgba::opaque(r, g, b)
    }
}

/// The foreground/background pair used for glyph pixels, plus the border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub foreground: Rgba,
    pub background: Rgba,
    pub border: Rgba,
}

/// Where a screen coordinate lands in the text grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSample {
    pub column: usize,
    pub row: usize,
    /// Bit index inside the glyph row, 0 = leftmost pixel.
    pub pixel_x: usize,
    /// Glyph row, 0 = top.
    pub pixel_y: usize,
}

/// Resolves a normalized text-area coordinate to a cell and a glyph pixel.
///
/// Values on a boundary belong to the following cell or pixel. Coordinates
/// outside [0,1) are clamped to the edge cells.
pub fn sample_cell(u: f32, v: f32) -> CellSample {
    let (column, pixel_x) = split_axis(u, COLUMNS);
    let (row, pixel_y) = split_axis(v, ROWS);
    CellSample {
        column,
        row,
        pixel_x,
        pixel_y,
    }
}

fn split_axis(t: f32, cells: usize) -> (usize, usize) {
    let scaled = (t * cells as f32).max(0.0);
    let cell = scaled.floor();
    let pixel = ((scaled - cell) * GLYPH_SIZE as f32).floor();
    let cell = cell as usize;
    if cell >= cells {
        return (cells - 1, GLYPH_SIZE - 1);
    }
    (cell, (pixel as usize).min(GLYPH_SIZE - 1))
}

/// Returns whether pixel `bit` (0 = leftmost) of a glyph row is lit.
#[inline]
pub fn is_foreground(byte: u8, bit: usize) -> bool {
    (byte >> (7 - bit)) & 1 == 1
}

/// The same test as `is_foreground`, written the way the fragment shader has
/// to do it on hardware without integer bit operations: the row byte arrives
/// as a float and each bit is isolated with `mod`.
pub fn bit_is_set_modulo(byte: f32, bit: usize) -> bool {
    let weight = (1u32 << (7 - bit)) as f32;
    glsl_mod(byte, weight * 2.0) >= weight
}

/// GLSL `mod`: `x - y * floor(x / y)`.
fn glsl_mod(x: f32, y: f32) -> f32 {
    x - y * (x / y).floor()
}

/// Shades one pixel of the text area. This is the whole algorithm in one
/// function and doubles as the reference for the fast path.
pub fn shade(u: f32, v: f32, text: &TextBuffer, rom: &CharacterRom, palette: &Palette) -> Rgba {
    let cell = sample_cell(u, v);
    let code = text.char_at(cell.column, cell.row);
    let byte = rom.glyph_row(code, cell.pixel_y);
    if is_foreground(byte, cell.pixel_x) {
        palette.foreground
    } else {
        palette.background
    }
}

/// Every glyph expanded to one bool per pixel.
pub struct GlyphAtlas {
    lit: Vec<bool>,
}

impl GlyphAtlas {
    const PIXELS_PER_GLYPH: usize = GLYPH_SIZE * GLYPH_SIZE;

    pub fn build(rom: &CharacterRom) -> Self {
        let mut lit = Vec::with_capacity(GLYPH_COUNT * Self::PIXELS_PER_GLYPH);
        for code in 0..GLYPH_COUNT {
            for &byte in rom.glyph(code as u8) {
                lit.extend((0..GLYPH_SIZE).map(|bit| is_foreground(byte, bit)));
            }
        }
        Self { lit }
    }

    #[inline]
    pub fn is_lit(&self, code: u8, pixel_x: usize, pixel_y: usize) -> bool {
        self.lit[code as usize * Self::PIXELS_PER_GLYPH + pixel_y * GLYPH_SIZE + pixel_x]
    }
}

/// Placement of the text area inside the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width_px: usize,
    pub height_px: usize,
    /// Border thickness on every side, in surface pixels.
    pub border_x_px: usize,
    pub border_y_px: usize,
}

impl Viewport {
    /// A viewport with no border: the text area fills the surface.
    pub fn full(width_px: usize, height_px: usize) -> Self {
        Self {
            width_px,
            height_px,
            border_x_px: 0,
            border_y_px: 0,
        }
    }

    /// The text area size in surface pixels.
    pub fn text_area(&self) -> (usize, usize) {
        (
            self.width_px.saturating_sub(2 * self.border_x_px),
            self.height_px.saturating_sub(2 * self.border_y_px),
        )
    }
}

/// Rasterizes text frames into RGBA framebuffers.
///
/// The glyph atlas is built the first time a frame is drawn after a ROM
/// change; `invalidate` drops it when a new ROM is installed.
pub struct SoftwareRasterizer {
    atlas: OnceCell<GlyphAtlas>,
}

impl SoftwareRasterizer {
    pub fn new() -> Self {
        Self {
            atlas: OnceCell::new(),
        }
    }

    /// Returns the atlas for `rom`, building it on first use. Repeated calls
    /// return the same atlas until `invalidate` is called.
    pub fn atlas(&self, rom: &CharacterRom) -> &GlyphAtlas {
        self.atlas.get_or_init(|| {
            trace!("SoftwareRasterizer: building glyph atlas");
            GlyphAtlas::build(rom)
        })
    }

    /// Forgets the cached atlas.
    pub fn invalidate(&mut self) {
        self.atlas = OnceCell::new();
    }

    /// Draws `text` into `framebuffer` (row-major RGBA, 4 bytes per pixel).
    ///
    /// Pixels are sampled at their centers, matching how the GPU
    /// interpolates texture coordinates across the quad.
    pub fn rasterize(
        &self,
        framebuffer: &mut [u8],
        viewport: Viewport,
        text: &TextBuffer,
        rom: &CharacterRom,
        palette: &Palette,
    ) {
        if viewport.width_px == 0 {
            return;
        }
        let atlas = self.atlas(rom);
        let (area_w, area_h) = viewport.text_area();
        let fg = palette.foreground.to_bytes();
        let bg = palette.background.to_bytes();
        let border = palette.border.to_bytes();

        // Column lookup is identical on every row.
        let columns: Vec<Option<(usize, usize)>> = (0..viewport.width_px)
            .map(|x| {
                let local = x.checked_sub(viewport.border_x_px)?;
                if local >= area_w {
                    return None;
                }
                let u = (local as f32 + 0.5) / area_w as f32;
                Some(split_axis(u, COLUMNS))
            })
            .collect();

        for (y, line) in framebuffer
            .chunks_exact_mut(viewport.width_px * 4)
            .take(viewport.height_px)
            .enumerate()
        {
            let row = y
                .checked_sub(viewport.border_y_px)
                .filter(|local| *local < area_h)
                .map(|local| split_axis((local as f32 + 0.5) / area_h as f32, ROWS));

            for (pixel, column) in line.chunks_exact_mut(4).zip(&columns) {
                let color = match (row, column) {
                    (Some((row, pixel_y)), Some((column, pixel_x))) => {
                        let code = text.char_at(*column, row);
                        if atlas.is_lit(code, *pixel_x, pixel_y) {
                            &fg
                        } else {
                            &bg
                        }
                    }
                    _ => &border,
                };
                pixel.copy_from_slice(color);
            }
        }
    }

    /// Fills the text area with the background color and leaves the border.
    /// Drawn while no ROM is available.
    pub fn clear(&self, framebuffer: &mut [u8], viewport: Viewport, palette: &Palette) {
        if viewport.width_px == 0 {
            return;
        }
        let (area_w, area_h) = viewport.text_area();
        let bg = palette.background.to_bytes();
        let border = palette.border.to_bytes();
        for (y, line) in framebuffer
            .chunks_exact_mut(viewport.width_px * 4)
            .take(viewport.height_px)
            .enumerate()
        {
            let inside_y = y >= viewport.border_y_px && y - viewport.border_y_px < area_h;
            for (x, pixel) in line.chunks_exact_mut(4).enumerate() {
                let inside_x = x >= viewport.border_x_px && x - viewport.border_x_px < area_w;
                pixel.copy_from_slice(if inside_x && inside_y { &bg } else { &border });
            }
        }
    }
}

impl Default for SoftwareRasterizer {
    fn default() -> Self {
        Self::new()
    }
}
