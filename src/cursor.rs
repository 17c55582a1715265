// src/cursor.rs

//! The blinking cursor cell.
//!
//! The cursor is not drawn separately: it is the cell at its position with
//! the reverse-video bit flipped. Blinking just flips that bit again at a
//! fixed frame interval.

use crate::config::{CursorConfig, PerformanceConfig};
use crate::screen::{TextBuffer, TextBufferError};
use log::{debug, trace};

#[derive(Debug, Clone)]
pub struct BlinkingCursor {
    row: usize,
    column: usize,
    /// Frames between flips; `None` keeps the cursor solid.
    period_frames: Option<u32>,
    frames_since_flip: u32,
    flips: u64,
}

impl BlinkingCursor {
    pub fn new(row: usize, column: usize, period_frames: Option<u32>) -> Self {
        Self {
            row,
            column,
            period_frames: period_frames.filter(|&p| p > 0),
            frames_since_flip: 0,
            flips: 0,
        }
    }

    /// Converts the configured blink interval into a frame count at the
    /// configured frame rate.
    pub fn from_config(cursor: &CursorConfig, performance: &PerformanceConfig) -> Self {
        let period = if cursor.blink_interval_ms == 0 {
            None
        } else {
            let fps = performance.target_fps.max(1) as u64;
            let frames = (cursor.blink_interval_ms as u64 * fps + 500) / 1000;
            Some(frames.clamp(1, u32::MAX as u64) as u32)
        };
        debug!(
            "BlinkingCursor at ({}, {}), period {:?} frames",
            cursor.row, cursor.column, period
        );
        Self::new(cursor.row, cursor.column, period)
    }

    pub fn position(&self) -> (usize, usize) {
        (self.row, self.column)
    }

    pub fn period_frames(&self) -> Option<u32> {
        self.period_frames
    }

    /// Whether the cell currently shows its original (boot) polarity.
    pub fn is_phase_on(&self) -> bool {
        self.flips % 2 == 0
    }

    /// Advances one frame, flipping the cursor cell when the period elapses.
    /// Returns whether the cell changed.
    pub fn tick(&mut self, text: &mut TextBuffer) -> Result<bool, TextBufferError> {
        let Some(period) = self.period_frames else {
            return Ok(false);
        };
        self.frames_since_flip += 1;
        if self.frames_since_flip < period {
            return Ok(false);
        }
        self.frames_since_flip = 0;
        text.toggle_reverse(self.row, self.column)?;
        self.flips += 1;
        trace!("BlinkingCursor: flip {}", self.flips);
        Ok(true)
    }
}
