// src/main.rs

#[cfg(not(target_arch = "wasm32"))]
use c64_screen::{
    config::Config,
    display::{drivers::HeadlessDisplayDriver, DisplayDriver, DisplayManager, DriverConfig},
    loader::RomLoader,
    orchestrator::ScreenOrchestrator,
};

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context;
#[cfg(not(target_arch = "wasm32"))]
use clap::{Parser, ValueEnum};
#[cfg(not(target_arch = "wasm32"))]
use log::{info, warn};
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

/// How long a snapshot run waits for the ROM before drawing.
#[cfg(not(target_arch = "wasm32"))]
const SNAPSHOT_ROM_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(not(target_arch = "wasm32"))]
const WINDOW_TITLE: &str = "C64 Screen";

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DriverKind {
    /// In-memory surface; pair with --snapshot to see the result.
    Headless,
    /// 24-bit color half blocks on the current terminal.
    Console,
}

/// Commodore 64 style 40x25 text screen.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Character ROM image (2048 bytes). Overrides the configuration.
    #[arg(long)]
    rom: Option<PathBuf>,

    /// Surface to draw on.
    #[arg(long, value_enum, default_value_t = DriverKind::Console)]
    driver: DriverKind,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Write the last frame to this PNG file (headless driver).
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

/// Main entry point for the `c64-screen` application.
#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    // Initialize the logger. Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(rom) = cli.rom {
        config.rom.path = rom;
    }

    if cli.print_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("Failed to serialize config")?
        );
        return Ok(());
    }

    info!("Starting c64-screen ({:?} driver)...", cli.driver);

    let (width_px, height_px) = config.display.surface_size()?;
    let driver_config = DriverConfig {
        width_px,
        height_px,
        title: WINDOW_TITLE.to_string(),
    };
    let driver: Box<dyn DisplayDriver> = match cli.driver {
        DriverKind::Headless => Box::new(HeadlessDisplayDriver::new(&driver_config)?),
        #[cfg(unix)]
        DriverKind::Console => Box::new(
            c64_screen::display::drivers::ConsoleDisplayDriver::new(&driver_config)?,
        ),
        #[cfg(not(unix))]
        DriverKind::Console => anyhow::bail!("The console driver needs a Unix terminal"),
    };

    let mut frames = cli.frames;
    if cli.driver == DriverKind::Headless && frames.is_none() {
        warn!("Headless driver without --frames; drawing a single frame");
        frames = Some(1);
    }

    let mut display = DisplayManager::new(driver)?;
    display.set_title(WINDOW_TITLE)?;
    let loader = RomLoader::spawn(config.rom.path.clone())?;
    let mut orchestrator = ScreenOrchestrator::new(&config, display, loader)?;

    if cli.snapshot.is_some() && !orchestrator.wait_for_rom(SNAPSHOT_ROM_TIMEOUT)? {
        warn!("Character ROM still loading; snapshot may show a blank screen");
    }

    orchestrator.run(frames)?;

    if let Some(path) = cli.snapshot {
        orchestrator.save_snapshot(&path)?;
    }

    info!("c64-screen exited successfully.");
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}
