// src/screen.rs

//! The 40x25 text buffer and the string writer that fills it.
//!
//! Cells hold C64 screen codes, not ASCII. Letters of either case map to the
//! unshifted range 1-26 so everything renders in the uppercase character set;
//! every other character is stored as its raw ordinal, which lines up with the
//! screen codes for digits, space and punctuation.

use crate::glyph::ScreenCode;
use log::{error, trace};
use std::fmt;

/// Columns in the text grid.
pub const COLUMNS: usize = 40;
/// Rows in the text grid.
pub const ROWS: usize = 25;
/// Total number of cells.
pub const CELL_COUNT: usize = COLUMNS * ROWS;

/// Screen code for a blank cell.
pub const SPACE: u8 = 32;

/// Screen code written under the cursor: a reverse-video space.
pub const CURSOR_CODE: u8 = SPACE | ScreenCode::REVERSE.bits();

const WELCOME_LINES: [(usize, &str); 6] = [
    (0, "                                        "),
    (1, "    **** COMMODORE 64 BASIC V2 ****     "),
    (2, "                                        "),
    (3, " 64K RAM SYSTEM  38911 BASIC BYTES FREE "),
    (4, "                                        "),
    (5, "READY.                                  "),
];

/// Row and column of the cursor left by the boot banner.
pub const WELCOME_CURSOR: (usize, usize) = (6, 0);

/// Errors raised by the text writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextBufferError {
    /// The start position lies outside the grid.
    OutOfBounds { row: usize, column: usize },
    /// The string would run past the last row. Nothing was written.
    Overflow {
        row: usize,
        column: usize,
        len: usize,
    },
    /// The character has no single-byte screen code.
    Unencodable(char),
}

impl fmt::Display for TextBufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextBufferError::OutOfBounds { row, column } => {
                write!(f, "cell ({}, {}) is outside the {}x{} grid", row, column, ROWS, COLUMNS)
            }
            TextBufferError::Overflow { row, column, len } => write!(
                f,
                "{} characters starting at ({}, {}) would run past row {}",
                len, row, column, ROWS
            ),
            TextBufferError::Unencodable(c) => {
                write!(f, "character {:?} has no screen code", c)
            }
        }
    }
}

impl std::error::Error for TextBufferError {}

/// Maps a character to its screen code.
pub fn encode_char(c: char) -> Option<u8> {
    match c {
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        'a'..='z' => Some(c as u8 - b'a' + 1),
        _ => u8::try_from(u32::from(c)).ok(),
    }
}

/// The mutable grid of screen codes.
#[derive(Clone, PartialEq, Eq)]
pub struct TextBuffer {
    cells: [u8; CELL_COUNT],
    dirty: bool,
}

impl TextBuffer {
    /// Creates a buffer with every cell blank.
    pub fn new() -> Self {
        Self {
            cells: [SPACE; CELL_COUNT],
            dirty: true,
        }
    }

    fn index(row: usize, column: usize) -> Result<usize, TextBufferError> {
        if row >= ROWS || column >= COLUMNS {
            return Err(TextBufferError::OutOfBounds { row, column });
        }
        Ok(row * COLUMNS + column)
    }

    /// The screen code at `(row, column)`.
    pub fn get(&self, row: usize, column: usize) -> Option<u8> {
        Self::index(row, column).ok().map(|i| self.cells[i])
    }

    /// The screen code at `(column, row)`, for the renderer's hot path.
    /// Both coordinates must already be inside the grid.
    #[inline]
    pub fn char_at(&self, column: usize, row: usize) -> u8 {
        self.cells[row * COLUMNS + column]
    }

    /// Writes one screen code directly.
    pub fn set(&mut self, row: usize, column: usize, code: u8) -> Result<(), TextBufferError> {
        let i = Self::index(row, column)?;
        if self.cells[i] != code {
            self.cells[i] = code;
            self.dirty = true;
        }
        Ok(())
    }

    /// Flips the reverse-video bit of one cell.
    pub fn toggle_reverse(&mut self, row: usize, column: usize) -> Result<(), TextBufferError> {
        let i = Self::index(row, column)?;
        self.cells[i] ^= ScreenCode::REVERSE.bits();
        self.dirty = true;
        Ok(())
    }

    /// Writes `text` into consecutive cells starting at `(row, column)`,
    /// wrapping to column 0 of the next row after column 39.
    ///
    /// The whole string is encoded and bounds-checked before the first cell
    /// is touched, so a rejected write leaves the buffer unchanged.
    pub fn write_string(
        &mut self,
        text: &str,
        row: usize,
        column: usize,
    ) -> Result<(), TextBufferError> {
        let start = Self::index(row, column)?;
        let codes = text
            .chars()
            .map(|c| encode_char(c).ok_or(TextBufferError::Unencodable(c)))
            .collect::<Result<Vec<u8>, _>>()?;

        if start + codes.len() > CELL_COUNT {
            return Err(TextBufferError::Overflow {
                row,
                column,
                len: codes.len(),
            });
        }

        trace!(
            "TextBuffer: writing {} cells at ({}, {})",
            codes.len(),
            row,
            column
        );
        self.cells[start..start + codes.len()].copy_from_slice(&codes);
        if !codes.is_empty() {
            self.dirty = true;
        }
        Ok(())
    }

    /// Draws the C64 power-on banner and parks the cursor under `READY.`.
    pub fn write_welcome_message(&mut self) {
        for (row, line) in WELCOME_LINES {
            let result = self.write_string(line, row, 0);
            debug_assert!(result.is_ok(), "banner row {}: {:?}", row, result);
            if let Err(e) = result {
                error!("TextBuffer: banner row {} rejected: {}", row, e);
            }
        }
        let (row, column) = WELCOME_CURSOR;
        self.cells[row * COLUMNS + column] = CURSOR_CODE;
        self.dirty = true;
    }

    /// All cells, row-major. This is the 40x25 single-channel text texture.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// One row of cells.
    pub fn row(&self, row: usize) -> Option<&[u8]> {
        if row >= ROWS {
            return None;
        }
        Some(&self.cells[row * COLUMNS..(row + 1) * COLUMNS])
    }

    /// Returns whether the buffer changed since the last call, and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuffer")
            .field("columns", &COLUMNS)
            .field("rows", &ROWS)
            .field("dirty", &self.dirty)
            .finish()
    }
}
