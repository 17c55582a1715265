// src/glyph.rs

//! Defines the character ROM (`CharacterRom`), the screen-code flags
//! (`ScreenCode`) and the errors raised while loading a ROM image.
//!
//! A character ROM is a bare array of 256 glyphs, each eight bytes tall.
//! Every byte is one pixel row with bit 7 as the leftmost pixel. There is no
//! header; the glyph for screen code `n` starts at byte offset `n * 8`.

use bitflags::bitflags;
use log::trace;
use std::fmt;
use std::path::Path;

/// Number of glyphs in a character ROM.
pub const GLYPH_COUNT: usize = 256;
/// Pixel rows (and columns) per glyph.
pub const GLYPH_SIZE: usize = 8;
/// Exact size of a character ROM image in bytes.
pub const ROM_SIZE: usize = GLYPH_COUNT * GLYPH_SIZE;

bitflags! {
    /// Flag bits carried inside a screen code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScreenCode: u8 {
        /// Selects the inverted copy of the glyph in the upper half of the ROM.
        const REVERSE = 0x80;
    }
}

/// Errors raised while loading a character ROM.
#[derive(Debug)]
pub enum RomError {
    /// The image was not exactly `ROM_SIZE` bytes long.
    InvalidSize { actual: usize },
    /// The image could not be read.
    Io(std::io::Error),
}

impl fmt::Display for RomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RomError::InvalidSize { actual } => write!(
                f,
                "character ROM must be exactly {} bytes, got {}",
                ROM_SIZE, actual
            ),
            RomError::Io(e) => write!(f, "failed to read character ROM: {}", e),
        }
    }
}

impl std::error::Error for RomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RomError::Io(e) => Some(e),
            RomError::InvalidSize { .. } => None,
        }
    }
}

impl From<std::io::Error> for RomError {
    fn from(e: std::io::Error) -> Self {
        RomError::Io(e)
    }
}

/// An immutable 256-glyph, 8x8 character bitmap table.
#[derive(Clone, PartialEq, Eq)]
pub struct CharacterRom {
    bytes: Box<[u8; ROM_SIZE]>,
}

impl CharacterRom {
    /// Wraps a raw ROM image. The slice must be exactly `ROM_SIZE` bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RomError> {
        let bytes: [u8; ROM_SIZE] = data
            .try_into()
            .map_err(|_| RomError::InvalidSize { actual: data.len() })?;
        Ok(Self {
            bytes: Box::new(bytes),
        })
    }

    /// Reads a ROM image from disk.
    pub fn load(path: &Path) -> Result<Self, RomError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// A ROM with every pixel cleared. Drawn while the real ROM is loading.
    pub fn blank() -> Self {
        Self {
            bytes: Box::new([0u8; ROM_SIZE]),
        }
    }

    /// The eight row bytes of the glyph for `code`.
    pub fn glyph(&self, code: u8) -> &[u8] {
        let start = code as usize * GLYPH_SIZE;
        &self.bytes[start..start + GLYPH_SIZE]
    }

    /// The row pattern of glyph `code` at vertical offset `row` (0-7).
    ///
    /// Rows past 7 are clamped to the last row, as the GPU sampler would.
    pub fn glyph_row(&self, code: u8, row: usize) -> u8 {
        self.bytes[code as usize * GLYPH_SIZE + row.min(GLYPH_SIZE - 1)]
    }

    /// The raw image, laid out as an 8x256 single-channel texture.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    /// Renders one glyph as eight lines of `O` (set) and `.` (clear), each
    /// followed by the row byte in hex.
    pub fn dump_glyph(&self, code: u8) -> String {
        let mut out = String::with_capacity(GLYPH_SIZE * 12);
        for &byte in self.glyph(code) {
            for bit in (0..GLYPH_SIZE).rev() {
                out.push(if (byte >> bit) & 1 == 1 { 'O' } else { '.' });
            }
            out.push_str(&format!(" {:02x}\n", byte));
        }
        out
    }

    /// Logs the first `count` glyphs at trace level.
    pub fn trace_glyphs(&self, count: usize) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        for code in 0..count.min(GLYPH_COUNT) {
            trace!("glyph {:#04x}:\n{}", code, self.dump_glyph(code as u8));
        }
    }
}

impl fmt::Debug for CharacterRom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lit = self.bytes.iter().filter(|b| **b != 0).count();
        f.debug_struct("CharacterRom")
            .field("len", &ROM_SIZE)
            .field("nonzero_rows", &lit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned_rom() -> CharacterRom {
        let data: Vec<u8> = (0..ROM_SIZE).map(|i| (i % 251) as u8).collect();
        CharacterRom::from_bytes(&data).unwrap()
    }

    #[test]
    fn test_rejects_wrong_size() {
        match CharacterRom::from_bytes(&[0u8; 100]) {
            Err(RomError::InvalidSize { actual }) => assert_eq!(actual, 100),
            other => panic!("Expected InvalidSize, got {:?}", other),
        }
        assert!(CharacterRom::from_bytes(&[0u8; ROM_SIZE + 1]).is_err());
    }

    #[test]
    fn test_glyph_row_is_positional() {
        let rom = patterned_rom();
        for code in [0u8, 1, 32, 127, 160, 255] {
            for row in 0..GLYPH_SIZE {
                let offset = code as usize * GLYPH_SIZE + row;
                assert_eq!(rom.glyph_row(code, row), (offset % 251) as u8);
            }
            assert_eq!(rom.glyph(code).len(), GLYPH_SIZE);
        }
    }

    #[test]
    fn test_glyph_row_clamps_past_last_row() {
        let rom = patterned_rom();
        assert_eq!(rom.glyph_row(3, 8), rom.glyph_row(3, 7));
    }

    #[test]
    fn test_dump_glyph_draws_msb_first() {
        let mut data = vec![0u8; ROM_SIZE];
        data[8] = 0b1011_0001;
        let rom = CharacterRom::from_bytes(&data).unwrap();
        let dump = rom.dump_glyph(1);
        let first = dump.lines().next().unwrap();
        assert_eq!(first, "O.OO...O b1");
        assert_eq!(dump.lines().count(), GLYPH_SIZE);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chars.bin");
        std::fs::write(&path, vec![0xAAu8; ROM_SIZE]).unwrap();
        let rom = CharacterRom::load(&path).unwrap();
        assert_eq!(rom.glyph_row(200, 4), 0xAA);

        let missing = CharacterRom::load(&dir.path().join("missing.bin"));
        assert!(matches!(missing, Err(RomError::Io(_))));
    }

    #[test]
    fn test_reverse_flag() {
        let code = 32u8 | ScreenCode::REVERSE.bits();
        assert_eq!(code, 160);
        assert!(ScreenCode::from_bits_truncate(code).contains(ScreenCode::REVERSE));
    }
}
