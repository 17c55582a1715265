// src/display/drivers/mod.rs
//! Surface-specific display driver implementations.

pub mod headless;
pub use headless::HeadlessDisplayDriver;

#[cfg(unix)]
pub mod console;
#[cfg(unix)]
pub use console::ConsoleDisplayDriver;
