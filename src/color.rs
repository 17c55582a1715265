// src/color.rs

//! Defines the C64 palette (`NamedColor`) and the configurable `Color` type.

use serde::{Deserialize, Serialize};

/// The sixteen colors of the VIC-II palette, in hardware index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum NamedColor {
    Black = 0,
    White = 1,
    Red = 2,
    Cyan = 3,
    Violet = 4,
    Green = 5,
    Blue = 6,
    Yellow = 7,
    Orange = 8,
    Brown = 9,
    LightRed = 10,
    DarkGrey = 11,
    Grey = 12,
    LightGreen = 13,
    LightBlue = 14,
    LightGrey = 15,
}

impl NamedColor {
    /// All palette entries, indexed by their hardware color number.
    pub const ALL: [NamedColor; 16] = [
        NamedColor::Black,
        NamedColor::White,
        NamedColor::Red,
        NamedColor::Cyan,
        NamedColor::Violet,
        NamedColor::Green,
        NamedColor::Blue,
        NamedColor::Yellow,
        NamedColor::Orange,
        NamedColor::Brown,
        NamedColor::LightRed,
        NamedColor::DarkGrey,
        NamedColor::Grey,
        NamedColor::LightGreen,
        NamedColor::LightBlue,
        NamedColor::LightGrey,
    ];

    /// Converts a hardware color number (0-15) to a `NamedColor`.
    ///
    /// The VIC-II only decodes the low nibble of a color register, so callers
    /// holding a raw register value should mask it first.
    pub fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.get(idx as usize).copied()
    }

    /// Returns the RGB triple for this palette entry.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            NamedColor::Black => (0, 0, 0),
            NamedColor::White => (255, 255, 255),
            NamedColor::Red => (146, 74, 64),
            NamedColor::Cyan => (132, 197, 204),
            NamedColor::Violet => (147, 81, 182),
            NamedColor::Green => (114, 177, 75),
            NamedColor::Blue => (72, 58, 170),
            NamedColor::Yellow => (213, 223, 124),
            NamedColor::Orange => (153, 105, 45),
            NamedColor::Brown => (103, 82, 0),
            NamedColor::LightRed => (193, 129, 120),
            NamedColor::DarkGrey => (96, 96, 96),
            NamedColor::Grey => (138, 138, 138),
            NamedColor::LightGreen => (179, 236, 145),
            NamedColor::LightBlue => (134, 122, 222),
            NamedColor::LightGrey => (179, 179, 179),
        }
    }
}

/// A color as it appears in configuration: either a palette name
/// (`"light_blue"`) or an explicit `[r, g, b]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    Named(NamedColor),
    Rgb(u8, u8, u8),
}

impl Color {
    /// Resolves the color to its RGB triple.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match *self {
            Color::Named(named) => named.rgb(),
            Color::Rgb(r, g, b) => (r, g, b),
        }
    }

    /// Normalized channels in 0.0..=1.0, as fed to shader uniforms.
    pub fn normalized(&self) -> [f32; 3] {
        let (r, g, b) = self.rgb();
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
    }
}

impl From<NamedColor> for Color {
    fn from(named: NamedColor) -> Self {
        Color::Named(named)
    }
}
