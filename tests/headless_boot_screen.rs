//! End-to-end: boot screen rendered through the headless driver and read
//! back from its PNG snapshot.

use c64_screen::color::{Color, NamedColor};
use c64_screen::config::Config;
use c64_screen::display::drivers::HeadlessDisplayDriver;
use c64_screen::display::{
    DisplayDriver, DisplayError, DisplayEvent, DisplayManager, DriverConfig, DriverRequest,
    DriverResponse,
};
use c64_screen::glyph::{CharacterRom, ROM_SIZE};
use c64_screen::loader::RomLoader;
use c64_screen::orchestrator::{OrchestratorStatus, ScreenOrchestrator};
use c64_screen::screen::SPACE;
use std::io::Write;
use std::time::Duration;
use test_log::test;

const BORDER: u32 = 32;
const WIDTH: u32 = 320 + 2 * BORDER;
const HEIGHT: u32 = 200 + 2 * BORDER;

/// Every glyph solid except space, so any non-blank cell is all foreground.
fn block_rom() -> Vec<u8> {
    let mut bytes = vec![0xFFu8; ROM_SIZE];
    let space = SPACE as usize * 8;
    bytes[space..space + 8].fill(0);
    bytes
}

fn config() -> Config {
    let mut config = Config::default();
    config.display.scale = 1;
    config.display.border_px = BORDER;
    config.colors.border = Color::Named(NamedColor::Red);
    config.cursor.blink_interval_ms = 0;
    config
}

fn headless() -> Box<dyn DisplayDriver> {
    let driver_config = DriverConfig {
        width_px: WIDTH,
        height_px: HEIGHT,
        title: "boot".to_string(),
    };
    Box::new(HeadlessDisplayDriver::new(&driver_config).unwrap())
}

fn rgb(img: &image::RgbaImage, x: u32, y: u32) -> (u8, u8, u8) {
    let p = img.get_pixel(x, y);
    (p[0], p[1], p[2])
}

/// Center pixel of a text cell.
fn cell_center(row: u32, column: u32) -> (u32, u32) {
    (BORDER + column * 8 + 4, BORDER + row * 8 + 4)
}

#[test]
fn boot_screen_snapshot_from_rom_file() {
    let dir = tempfile::tempdir().unwrap();
    let rom_path = dir.path().join("characters.bin");
    std::fs::File::create(&rom_path)
        .unwrap()
        .write_all(&block_rom())
        .unwrap();

    let config = config();
    let display = DisplayManager::new(headless()).unwrap();
    let loader = RomLoader::spawn(rom_path).unwrap();
    let mut orch = ScreenOrchestrator::new(&config, display, loader).unwrap();
    assert!(orch.wait_for_rom(Duration::from_secs(5)).unwrap());
    orch.run(Some(2)).unwrap();

    let snapshot = dir.path().join("boot.png");
    orch.save_snapshot(&snapshot).unwrap();
    let img = image::open(&snapshot).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (WIDTH, HEIGHT));

    let fg = NamedColor::LightBlue.rgb();
    let bg = NamedColor::Blue.rgb();
    let border = NamedColor::Red.rgb();

    assert_eq!(rgb(&img, 0, 0), border);
    assert_eq!(rgb(&img, WIDTH - 1, HEIGHT - 1), border);

    // Row 0 is blank.
    let (x, y) = cell_center(0, 0);
    assert_eq!(rgb(&img, x, y), bg);
    // Row 1: "    **** COMMODORE..." starts with four spaces then '*'.
    let (x, y) = cell_center(1, 3);
    assert_eq!(rgb(&img, x, y), bg);
    let (x, y) = cell_center(1, 4);
    assert_eq!(rgb(&img, x, y), fg);
    // Row 5: "READY." then spaces.
    for column in 0..6 {
        let (x, y) = cell_center(5, column);
        assert_eq!(rgb(&img, x, y), fg, "READY. column {}", column);
    }
    let (x, y) = cell_center(5, 6);
    assert_eq!(rgb(&img, x, y), bg);
    // The cursor is a reverse space, which this ROM draws solid.
    let (x, y) = cell_center(6, 0);
    assert_eq!(rgb(&img, x, y), fg);
    let (x, y) = cell_center(24, 39);
    assert_eq!(rgb(&img, x, y), bg);
}

#[test]
fn upper_and_lower_case_render_identically() {
    let mut rom = vec![0u8; ROM_SIZE];
    // Give 'A' (code 1) a distinctive shape.
    rom[8..16].copy_from_slice(&[0x18, 0x3C, 0x66, 0x7E, 0x66, 0x66, 0x66, 0x00]);
    let rom = CharacterRom::from_bytes(&rom).unwrap();

    let frame_for = |text: &str| {
        let mut orch = ScreenOrchestrator::new(
            &config(),
            DisplayManager::new(headless()).unwrap(),
            RomLoader::ready(rom.clone()),
        )
        .unwrap();
        orch.text_mut().write_string(text, 10, 10).unwrap();
        orch.process_frame().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        orch.save_snapshot(&path).unwrap();
        image::open(&path).unwrap().to_rgba8()
    };

    assert_eq!(frame_for("A").as_raw(), frame_for("a").as_raw());
}

/// Wraps the headless driver and feeds it a resize on the second poll and
/// a close request on the fourth.
struct ScriptedDriver {
    inner: HeadlessDisplayDriver,
    polls: u32,
}

impl DisplayDriver for ScriptedDriver {
    fn new(config: &DriverConfig) -> anyhow::Result<Self> {
        Ok(Self {
            inner: HeadlessDisplayDriver::new(config)?,
            polls: 0,
        })
    }

    fn handle_request(&mut self, request: DriverRequest) -> Result<DriverResponse, DisplayError> {
        if let DriverRequest::PollEvents = request {
            self.polls += 1;
            match self.polls {
                2 => self.inner.push_event(DisplayEvent::Resize {
                    width_px: WIDTH * 2,
                    height_px: HEIGHT * 2,
                }),
                4 => self.inner.push_event(DisplayEvent::CloseRequested),
                _ => {}
            }
        }
        self.inner.handle_request(request)
    }
}

#[test]
fn resize_then_close() {
    let driver_config = DriverConfig {
        width_px: WIDTH,
        height_px: HEIGHT,
        title: "scripted".to_string(),
    };
    let driver = ScriptedDriver::new(&driver_config).unwrap();
    let display = DisplayManager::new(Box::new(driver)).unwrap();
    let rom = CharacterRom::from_bytes(&block_rom()).unwrap();
    let mut orch = ScreenOrchestrator::new(&config(), display, RomLoader::ready(rom)).unwrap();

    assert_eq!(orch.process_frame().unwrap(), OrchestratorStatus::Running);
    assert_eq!(orch.process_frame().unwrap(), OrchestratorStatus::Running);
    assert_eq!(orch.context().viewport().width_px, (WIDTH * 2) as usize);
    assert_eq!(orch.context().viewport().border_x_px, (BORDER * 2) as usize);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resized.png");
    orch.save_snapshot(&path).unwrap();
    let img = image::open(&path).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (WIDTH * 2, HEIGHT * 2));

    assert_eq!(orch.process_frame().unwrap(), OrchestratorStatus::Running);
    assert_eq!(orch.process_frame().unwrap(), OrchestratorStatus::Shutdown);
    assert_eq!(orch.frames_presented(), 3);
}
