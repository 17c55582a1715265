// src/shader.rs

//! GLSL ES 1.0 program for drawing the text screen on the GPU.
//!
//! The fragment shader runs the same per-pixel decode as
//! `rasterizer::shade`, except the glyph byte arrives as a normalized float,
//! so each bit is isolated with `mod` the way `rasterizer::bit_is_set_modulo`
//! does on the CPU.
//!
//! Textures:
//! - text: 40x25 `LUMINANCE`, one screen code per texel.
//! - character ROM: 8x256 `LUMINANCE`, glyph `n` on row `n`, one byte per
//!   texel.

use crate::glyph::{GLYPH_COUNT, GLYPH_SIZE};
use crate::screen::{COLUMNS, ROWS};

pub const ATTR_VERTEX_POSITION: &str = "aVertexPosition";
pub const ATTR_CHARACTER_ROM_COORD: &str = "aCharacterRomCoord";
pub const UNIFORM_CHAR_SAMPLER: &str = "uCharSampler";
pub const UNIFORM_TEXT_SAMPLER: &str = "uTextSampler";
pub const UNIFORM_FOREGROUND: &str = "uForegroundColor";
pub const UNIFORM_BACKGROUND: &str = "uBackgroundColor";

/// Texture unit of the character ROM.
pub const CHAR_TEXTURE_UNIT: u32 = 0;
/// Texture unit of the text buffer.
pub const TEXT_TEXTURE_UNIT: u32 = 1;

/// Text texture size in texels.
pub const TEXT_TEXTURE_SIZE: (usize, usize) = (COLUMNS, ROWS);
/// Character ROM texture size in texels.
pub const ROM_TEXTURE_SIZE: (usize, usize) = (GLYPH_SIZE, GLYPH_COUNT);

pub const VERTEX_SHADER: &str = r#"
attribute vec4 aVertexPosition;
attribute vec2 aCharacterRomCoord;

varying highp vec2 vCharacterRomCoord;

void main() {
    gl_Position = aVertexPosition;
    vCharacterRomCoord = aCharacterRomCoord;
}
"#;

pub const FRAGMENT_SHADER: &str = r#"
precision highp float;

varying highp vec2 vCharacterRomCoord;

uniform sampler2D uCharSampler;
uniform sampler2D uTextSampler;

uniform lowp vec3 uBackgroundColor;
uniform lowp vec3 uForegroundColor;

void main() {
    // Clamp so the far edge stays in the last cell.
    vec2 coord = clamp(vCharacterRomCoord, vec2(0.0), vec2(39.9999, 24.9999));
    vec2 cell = floor(coord);
    vec2 pixel = floor(fract(coord) * 8.0);

    float code = floor(texture2D(uTextSampler, (cell + 0.5) / vec2(40.0, 25.0)).r * 255.0 + 0.5);
    vec2 romCoord = vec2((pixel.y + 0.5) / 8.0, (code + 0.5) / 256.0);
    float byte = floor(texture2D(uCharSampler, romCoord).r * 255.0 + 0.5);

    // Bit 0 is the leftmost pixel, weight 128.
    float weight = exp2(7.0 - pixel.x);
    if (mod(byte, weight * 2.0) >= weight) {
        gl_FragColor = vec4(uForegroundColor, 1.0);
    } else {
        gl_FragColor = vec4(uBackgroundColor, 1.0);
    }
}
"#;

/// Clip-space corners of the text quad as a triangle strip. The margin
/// around it shows the border (the canvas clear color).
pub const QUAD_POSITIONS: [f32; 8] = [
    -0.8, 0.7, //
    0.8, 0.7, //
    -0.8, -0.7, //
    0.8, -0.7,
];

/// Text-grid coordinates for each corner of `QUAD_POSITIONS`.
pub const QUAD_CHARACTER_COORDS: [f32; 8] = [
    0.0, 0.0, //
    COLUMNS as f32, 0.0, //
    0.0, ROWS as f32, //
    COLUMNS as f32, ROWS as f32,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::{bit_is_set_modulo, is_foreground};

    #[test]
    fn test_sources_declare_every_binding() {
        for name in [ATTR_VERTEX_POSITION, ATTR_CHARACTER_ROM_COORD] {
            assert!(VERTEX_SHADER.contains(name), "vertex shader lacks {}", name);
        }
        for name in [
            UNIFORM_CHAR_SAMPLER,
            UNIFORM_TEXT_SAMPLER,
            UNIFORM_FOREGROUND,
            UNIFORM_BACKGROUND,
        ] {
            assert!(FRAGMENT_SHADER.contains(name), "fragment shader lacks {}", name);
        }
    }

    #[test]
    fn test_quad_covers_whole_grid() {
        let xs: Vec<f32> = QUAD_CHARACTER_COORDS.iter().step_by(2).copied().collect();
        let ys: Vec<f32> = QUAD_CHARACTER_COORDS.iter().skip(1).step_by(2).copied().collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), 0.0);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 40.0);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 25.0);
        // Top-left corner of the quad is text (0, 0).
        assert_eq!(&QUAD_POSITIONS[..2], &[-0.8, 0.7]);
        assert_eq!(&QUAD_CHARACTER_COORDS[..2], &[0.0, 0.0]);
    }

    /// The shader's byte recovery: a luminance texel stores `byte / 255`.
    #[test]
    fn test_luminance_round_trip_feeds_modulo_decode() {
        for byte in 0..=255u8 {
            let sampled = byte as f32 / 255.0;
            let recovered = (sampled * 255.0 + 0.5).floor();
            assert_eq!(recovered, byte as f32);
            for bit in 0..8 {
                assert_eq!(bit_is_set_modulo(recovered, bit), is_foreground(byte, bit));
            }
        }
    }
}
