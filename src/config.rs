// src/config.rs

//! Defines the configuration structures for the C64 screen.
//!
//! Every section carries `#[serde(default)]`, so a configuration file only
//! needs to name the settings it changes. The defaults reproduce the stock
//! power-on screen: light blue text on a blue background inside a light blue
//! border.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;

use crate::color::{Color, NamedColor};
use crate::glyph::GLYPH_SIZE;
use crate::screen::{COLUMNS, ROWS, WELCOME_CURSOR};

/// Largest accepted `display.scale`.
pub const MAX_SCALE: u32 = 8;
/// Largest accepted `display.border_px`.
pub const MAX_BORDER_PX: u32 = 64;
/// Largest accepted `performance.target_fps`.
pub const MAX_TARGET_FPS: u32 = 1000;

// --- Top-Level Configuration Structure ---

/// Represents the complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Color scheme.
    pub colors: ColorScheme,
    /// Surface geometry.
    pub display: DisplayConfig,
    /// Cursor placement and blinking.
    pub cursor: CursorConfig,
    /// Frame pacing.
    pub performance: PerformanceConfig,
    /// Character ROM source.
    pub rom: RomConfig,
}

impl Config {
    /// Reads a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Rejects values the renderer cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SCALE).contains(&self.display.scale) {
            bail!(
                "display.scale must be between 1 and {}, got {}",
                MAX_SCALE,
                self.display.scale
            );
        }
        if self.display.border_px > MAX_BORDER_PX {
            bail!(
                "display.border_px must be at most {}, got {}",
                MAX_BORDER_PX,
                self.display.border_px
            );
        }
        if !(1..=MAX_TARGET_FPS).contains(&self.performance.target_fps) {
            bail!(
                "performance.target_fps must be between 1 and {}, got {}",
                MAX_TARGET_FPS,
                self.performance.target_fps
            );
        }
        self.display.surface_size()?;
        Ok(())
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("Configuration loaded (using default).");
                Ok(Self::default())
            }
        }
    }
}

// --- Color Scheme Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    /// Glyph pixels.
    pub foreground: Color,
    /// Text area behind the glyphs.
    pub background: Color,
    /// Frame around the text area.
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        ColorScheme {
            foreground: Color::Named(NamedColor::LightBlue),
            background: Color::Named(NamedColor::Blue),
            border: Color::Named(NamedColor::LightBlue),
        }
    }
}

// --- Display Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Surface pixels per C64 pixel.
    pub scale: u32,
    /// Border thickness in C64 pixels. The VIC-II draws 32 on each side.
    pub border_px: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            scale: 2,
            border_px: 32,
        }
    }
}

impl DisplayConfig {
    /// Full surface size in pixels, border included.
    pub fn surface_size(&self) -> Result<(u32, u32)> {
        let scale = self.scale.max(1);
        let side = |text: usize| {
            self.border_px
                .checked_mul(2)
                .and_then(|border| border.checked_add(text as u32))
                .and_then(|total| total.checked_mul(scale))
        };
        match (side(COLUMNS * GLYPH_SIZE), side(ROWS * GLYPH_SIZE)) {
            (Some(w), Some(h)) => Ok((w, h)),
            _ => bail!(
                "surface size overflows: border_px {} at scale {}",
                self.border_px,
                scale
            ),
        }
    }
}

// --- Cursor Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub row: usize,
    pub column: usize,
    /// Time between reverse-video flips. Set to 0 to keep the cursor solid.
    pub blink_interval_ms: u32,
}

impl Default for CursorConfig {
    fn default() -> Self {
        CursorConfig {
            row: WELCOME_CURSOR.0,
            column: WELCOME_CURSOR.1,
            blink_interval_ms: 500,
        }
    }
}

// --- Performance Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Frames per second the frame loop aims for.
    pub target_fps: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig { target_fps: 60 }
    }
}

impl PerformanceConfig {
    pub fn frame_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }
}

// --- ROM Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RomConfig {
    /// Location of the 2048-byte character ROM image (a file path natively,
    /// a URL in the browser).
    pub path: PathBuf,
}

impl Default for RomConfig {
    fn default() -> Self {
        RomConfig {
            path: PathBuf::from("media/characters-c64.bin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_power_on_screen() {
        let config = Config::default();
        assert_eq!(config.colors.foreground, Color::Named(NamedColor::LightBlue));
        assert_eq!(config.colors.background, Color::Named(NamedColor::Blue));
        assert_eq!((config.cursor.row, config.cursor.column), (6, 0));
        assert_eq!(config.display.surface_size().unwrap(), (768, 528));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let json = r#"{ "colors": { "foreground": "white" }, "cursor": { "blink_interval_ms": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.colors.foreground, Color::Named(NamedColor::White));
        assert_eq!(config.colors.background, Color::Named(NamedColor::Blue));
        assert_eq!(config.cursor.blink_interval_ms, 0);
        assert_eq!(config.cursor.row, 6);
        assert_eq!(config.performance.target_fps, 60);
    }

    #[test]
    fn test_load_from_file_and_report_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{ "display": { "scale": 1, "border_px": 0 } }"#).unwrap();
        let config = Config::load(&good).unwrap();
        assert_eq!(config.display.surface_size().unwrap(), (320, 200));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        let err = Config::load(&bad).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));

        assert!(Config::load_or_default(None).is_ok());
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_frame_duration_guards_zero_fps() {
        let perf = PerformanceConfig { target_fps: 0 };
        assert_eq!(perf.frame_duration(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (name, json) in [
            ("huge_scale.json", r#"{ "display": { "scale": 20000000 } }"#),
            ("zero_scale.json", r#"{ "display": { "scale": 0 } }"#),
            ("wide_border.json", r#"{ "display": { "border_px": 4000000000 } }"#),
            ("zero_fps.json", r#"{ "performance": { "target_fps": 0 } }"#),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, json).unwrap();
            let err = Config::load(&path).unwrap_err();
            assert!(
                format!("{:#}", err).contains("Invalid config file"),
                "{}: {:#}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_surface_size_reports_overflow() {
        let display = DisplayConfig {
            scale: 20_000_000,
            border_px: 32,
        };
        assert!(display.surface_size().is_err());
        let display = DisplayConfig {
            scale: 1,
            border_px: u32::MAX,
        };
        assert!(display.surface_size().is_err());
    }
}
