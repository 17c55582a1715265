// src/loader.rs

//! Background loading of the character ROM.
//!
//! The ROM is read on a dedicated thread so the frame loop can start drawing
//! placeholder frames immediately. The result comes back over a channel and
//! is picked up by `poll` between frames.

use crate::glyph::{CharacterRom, RomError};
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The outcome of a load, as seen by the frame loop.
#[derive(Debug)]
pub enum LoadStatus {
    Pending,
    Loaded(CharacterRom),
    Failed(RomError),
}

/// A one-shot ROM load.
pub struct RomLoader {
    source: String,
    rx: Option<Receiver<Result<CharacterRom, RomError>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl RomLoader {
    /// Starts reading `path` on a background thread.
    pub fn spawn(path: PathBuf) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let source = path.display().to_string();
        let thread_handle = thread::Builder::new()
            .name("rom-loader".to_string())
            .spawn(move || {
                debug!("RomLoader: reading {}", path.display());
                let result = CharacterRom::load(&path);
                if tx.send(result).is_err() {
                    debug!("RomLoader: receiver dropped before the ROM arrived");
                }
            })
            .context("Failed to spawn ROM loader thread")?;

        info!("RomLoader spawned for {}", source);
        Ok(Self {
            source,
            rx: Some(rx),
            thread_handle: Some(thread_handle),
        })
    }

    /// A loader that has already finished with `rom`.
    pub fn ready(rom: CharacterRom) -> Self {
        let (tx, rx) = mpsc::channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(Ok(rom));
        Self {
            source: "<memory>".to_string(),
            rx: Some(rx),
            thread_handle: None,
        }
    }

    /// Where the ROM is being read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Checks for a result without blocking. A finished load is reported
    /// once; later calls return `Pending` forever.
    pub fn poll(&mut self) -> LoadStatus {
        let Some(rx) = self.rx.as_ref() else {
            return LoadStatus::Pending;
        };
        let status = match rx.try_recv() {
            Ok(result) => Self::finish(result),
            Err(TryRecvError::Empty) => return LoadStatus::Pending,
            Err(TryRecvError::Disconnected) => LoadStatus::Failed(RomError::Io(
                std::io::Error::new(std::io::ErrorKind::Other, "ROM loader thread exited"),
            )),
        };
        self.rx = None;
        status
    }

    /// Blocks for up to `timeout` waiting for the load to finish.
    pub fn wait(&mut self, timeout: Duration) -> LoadStatus {
        let Some(rx) = self.rx.as_ref() else {
            return LoadStatus::Pending;
        };
        let status = match rx.recv_timeout(timeout) {
            Ok(result) => Self::finish(result),
            Err(RecvTimeoutError::Timeout) => return LoadStatus::Pending,
            Err(RecvTimeoutError::Disconnected) => LoadStatus::Failed(RomError::Io(
                std::io::Error::new(std::io::ErrorKind::Other, "ROM loader thread exited"),
            )),
        };
        self.rx = None;
        status
    }

    fn finish(result: Result<CharacterRom, RomError>) -> LoadStatus {
        match result {
            Ok(rom) => LoadStatus::Loaded(rom),
            Err(e) => LoadStatus::Failed(e),
        }
    }
}

impl Drop for RomLoader {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("RomLoader thread panicked");
            }
        }
    }
}
