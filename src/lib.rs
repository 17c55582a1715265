// src/lib.rs

//! A Commodore 64 style 40x25 text screen.
//!
//! Character codes in a [`screen::TextBuffer`] are composited against an 8x8
//! [`glyph::CharacterRom`] one pixel at a time. The same decode runs on the
//! CPU ([`rasterizer`]) for the headless and console surfaces and on the GPU
//! ([`shader`]) in the browser.

pub mod color;
pub mod config;
pub mod cursor;
pub mod glyph;
pub mod rasterizer;
pub mod renderer;
pub mod screen;
pub mod shader;

#[cfg(not(target_arch = "wasm32"))]
pub mod display;
#[cfg(not(target_arch = "wasm32"))]
pub mod loader;
#[cfg(not(target_arch = "wasm32"))]
pub mod orchestrator;

#[cfg(target_arch = "wasm32")]
pub mod web;
