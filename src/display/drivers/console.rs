// src/display/drivers/console.rs

//! Console display driver.
//!
//! Presents frames on an ANSI terminal using 24-bit color and the upper half
//! block (`▀`): each character cell shows two surface pixels, the top one as
//! the foreground color and the bottom one as the background color. The
//! surface is sized to the terminal, so the frame loop renders straight to
//! terminal resolution.
//!
//! Stdin is put in raw mode with signal keys disabled. `q`, Ctrl-C or EOF on
//! stdin become [`DisplayEvent::CloseRequested`].

use crate::display::driver::DisplayDriver;
use crate::display::messages::{
    DisplayError, DisplayEvent, DriverConfig, DriverRequest, DriverResponse,
};

use anyhow::{Context, Result};
use libc::{winsize, STDIN_FILENO, STDOUT_FILENO, TIOCGWINSZ};
use log::{debug, error, info, trace, warn};
use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::mem;
use std::os::unix::io::RawFd;
use termios::{tcsetattr, Termios, ECHO, ICANON, ISIG, TCSANOW, VMIN, VTIME};

const CURSOR_HIDE: &str = "\x1b[?25l";
const CURSOR_SHOW: &str = "\x1b[?25h";
const CURSOR_HOME: &str = "\x1b[H";
const CLEAR_SCREEN_AND_HOME: &str = "\x1b[2J\x1b[H";
const SGR_RESET: &str = "\x1b[0m";
const UPPER_HALF_BLOCK: char = '\u{2580}';

const QUIT_KEYS: [u8; 3] = [b'q', b'Q', 0x03];

const DEFAULT_CONSOLE_COLUMNS: u16 = 80;
const DEFAULT_CONSOLE_ROWS: u16 = 25;

/// Where the console size comes from.
enum SizeSource {
    Terminal(RawFd),
    Fixed { cols: u16, rows: u16 },
}

/// Non-blocking view of a terminal fd: reports `WouldBlock` instead of
/// waiting when nothing is pending.
struct TerminalInput(RawFd);

impl Read for TerminalInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pfd = libc::pollfd {
            fd: self.0,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: one valid pollfd, zero timeout.
        let ready = unsafe { libc::poll(&mut pfd, 1, 0) };
        if ready < 0 {
            return Err(io::Error::last_os_error());
        }
        if ready == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        // SAFETY: `buf` is valid for `buf.len()` bytes of writes.
        let n = unsafe { libc::read(self.0, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

pub struct ConsoleDisplayDriver {
    out: Box<dyn Write>,
    input: Option<Box<dyn Read>>,
    original_termios: Option<Termios>,
    input_buffer: [u8; 128],
    size_source: SizeSource,
    last_known_cols: u16,
    last_known_rows: u16,
    framebuffer: Option<Box<[u8]>>,
    last_frame: Vec<u8>,
    initialized: bool,
}

impl ConsoleDisplayDriver {
    /// A driver writing to `out` with a fixed size, for tests and pipes.
    /// It never reads input.
    pub fn with_writer(out: Box<dyn Write>, cols: u16, rows: u16) -> Self {
        Self::with_io(out, None, cols, rows)
    }

    /// Like [`with_writer`](Self::with_writer), with key presses read from
    /// `input`. A read that would block means no key is pending.
    pub fn with_io(
        out: Box<dyn Write>,
        input: Option<Box<dyn Read>>,
        cols: u16,
        rows: u16,
    ) -> Self {
        Self {
            out,
            input,
            original_termios: None,
            input_buffer: [0u8; 128],
            size_source: SizeSource::Fixed { cols, rows },
            last_known_cols: cols,
            last_known_rows: rows,
            framebuffer: None,
            last_frame: Vec::new(),
            initialized: false,
        }
    }

    fn query_size(&self) -> (u16, u16) {
        match self.size_source {
            SizeSource::Fixed { cols, rows } => (cols, rows),
            SizeSource::Terminal(fd) => get_terminal_size_cells(fd).unwrap_or_else(|e| {
                debug!("ConsoleDisplayDriver: {:#}, using default size", e);
                (DEFAULT_CONSOLE_COLUMNS, DEFAULT_CONSOLE_ROWS)
            }),
        }
    }

    /// Surface pixels for the current console size. The last terminal row is
    /// left free so the frame never scrolls the terminal.
    fn surface_size(&self) -> (u32, u32) {
        let rows = self.last_known_rows.saturating_sub(1).max(1);
        (self.last_known_cols.max(1) as u32, rows as u32 * 2)
    }

    fn buffer_len(&self) -> usize {
        let (w, h) = self.surface_size();
        w as usize * h as usize * 4
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let (width, height) = self.surface_size();
        let text = encode_half_blocks(frame, width as usize, height as usize);
        self.out.write_all(CURSOR_HOME.as_bytes())?;
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    /// Whether pending input asks to quit. Unknown keys are ignored.
    fn read_quit_request(&mut self) -> Result<bool> {
        let Some(input) = self.input.as_mut() else {
            return Ok(false);
        };
        match input.read(&mut self.input_buffer) {
            Ok(0) => {
                info!("ConsoleDisplayDriver: EOF on stdin. Requesting close.");
                self.input = None;
                Ok(true)
            }
            Ok(n) => {
                trace!("ConsoleDisplayDriver: read {} bytes from stdin", n);
                let quit = self.input_buffer[..n]
                    .iter()
                    .any(|b| QUIT_KEYS.contains(b));
                if quit {
                    info!("ConsoleDisplayDriver: quit key pressed. Requesting close.");
                }
                Ok(quit)
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(false)
            }
            Err(e) => Err(e).context("ConsoleDisplayDriver: error reading from stdin"),
        }
    }

    fn cleanup(&mut self) -> io::Result<()> {
        let shown = if self.initialized {
            self.initialized = false;
            write!(self.out, "{}{}\r\n", SGR_RESET, CURSOR_SHOW).and_then(|_| self.out.flush())
        } else {
            Ok(())
        };
        if let Some(original) = self.original_termios.take() {
            debug!("ConsoleDisplayDriver: restoring original terminal attributes");
            tcsetattr(STDIN_FILENO, TCSANOW, &original)?;
        }
        shown
    }
}

/// Puts stdin in raw mode with ECHO, ICANON and ISIG off, so Ctrl-C arrives
/// as a byte. Returns the attributes to restore, or `None` when stdin is not
/// a terminal.
fn enter_raw_mode() -> Result<Option<Termios>> {
    let original = match Termios::from_fd(STDIN_FILENO) {
        Ok(ts) => ts,
        Err(e) => {
            warn!(
                "ConsoleDisplayDriver: stdin is not a terminal ({}). Keys are ignored.",
                e
            );
            return Ok(None);
        }
    };
    let mut raw = original;
    raw.c_lflag &= !(ECHO | ICANON | ISIG);
    raw.c_iflag &= !(libc::IXON | libc::IXOFF | libc::ICRNL | libc::INLCR | libc::IGNCR);
    raw.c_oflag &= !libc::OPOST;
    raw.c_cc[VMIN] = 0;
    raw.c_cc[VTIME] = 0;
    tcsetattr(STDIN_FILENO, TCSANOW, &raw)
        .context("ConsoleDisplayDriver: failed to set raw terminal attributes")?;
    debug!("ConsoleDisplayDriver: terminal set to raw mode");
    Ok(Some(original))
}

/// Turns an RGBA frame into rows of half-block characters. Color escapes are
/// only emitted when a color changes from the previous cell.
pub fn encode_half_blocks(frame: &[u8], width: usize, height: usize) -> String {
    let pixel = |x: usize, y: usize| -> (u8, u8, u8) {
        let i = (y * width + x) * 4;
        (frame[i], frame[i + 1], frame[i + 2])
    };

    let mut out = String::with_capacity(width * height * 12);
    for y in (0..height).step_by(2) {
        let mut last_fg = None;
        let mut last_bg = None;
        for x in 0..width {
            let top = pixel(x, y);
            let bottom = if y + 1 < height { pixel(x, y + 1) } else { top };
            if last_fg != Some(top) {
                let _ = write!(out, "\x1b[38;2;{};{};{}m", top.0, top.1, top.2);
                last_fg = Some(top);
            }
            if last_bg != Some(bottom) {
                let _ = write!(out, "\x1b[48;2;{};{};{}m", bottom.0, bottom.1, bottom.2);
                last_bg = Some(bottom);
            }
            out.push(UPPER_HALF_BLOCK);
        }
        out.push_str(SGR_RESET);
        if y + 2 < height {
            out.push_str("\r\n");
        }
    }
    out
}

impl DisplayDriver for ConsoleDisplayDriver {
    fn new(config: &DriverConfig) -> Result<Self> {
        info!("Creating new ConsoleDisplayDriver ('{}').", config.title);
        let (cols, rows) = get_terminal_size_cells(STDOUT_FILENO)
            .context("ConsoleDisplayDriver: stdout is not a terminal")?;
        let original_termios = enter_raw_mode()?;
        let input: Option<Box<dyn Read>> = original_termios
            .as_ref()
            .map(|_| Box::new(TerminalInput(STDIN_FILENO)) as Box<dyn Read>);
        Ok(Self {
            out: Box::new(io::stdout()),
            input,
            original_termios,
            input_buffer: [0u8; 128],
            size_source: SizeSource::Terminal(STDOUT_FILENO),
            last_known_cols: cols,
            last_known_rows: rows,
            framebuffer: None,
            last_frame: Vec::new(),
            initialized: false,
        })
    }

    fn handle_request(&mut self, request: DriverRequest) -> Result<DriverResponse, DisplayError> {
        match request {
            DriverRequest::Init => {
                let (cols, rows) = self.query_size();
                self.last_known_cols = cols;
                self.last_known_rows = rows;
                write!(self.out, "{}{}", CURSOR_HIDE, CLEAR_SCREEN_AND_HOME)
                    .and_then(|_| self.out.flush())
                    .context("ConsoleDisplayDriver: failed to prepare terminal")?;
                self.initialized = true;
                self.framebuffer = Some(vec![0u8; self.buffer_len()].into_boxed_slice());
                let (width_px, height_px) = self.surface_size();
                info!(
                    "ConsoleDisplayDriver: {}x{} cells, {}x{} px",
                    cols, rows, width_px, height_px
                );
                Ok(DriverResponse::InitComplete {
                    width_px,
                    height_px,
                })
            }
            DriverRequest::PollEvents => {
                let mut events = Vec::new();
                let (cols, rows) = self.query_size();
                if (cols, rows) != (self.last_known_cols, self.last_known_rows) {
                    debug!("ConsoleDisplayDriver: resized to {}x{} cells", cols, rows);
                    self.last_known_cols = cols;
                    self.last_known_rows = rows;
                    self.framebuffer = Some(vec![0u8; self.buffer_len()].into_boxed_slice());
                    self.last_frame.clear();
                    if let Err(e) = write!(self.out, "{}", CLEAR_SCREEN_AND_HOME) {
                        warn!(
                            "ConsoleDisplayDriver: failed to clear after resize: {}",
                            e
                        );
                    }
                    let (width_px, height_px) = self.surface_size();
                    events.push(DisplayEvent::Resize {
                        width_px,
                        height_px,
                    });
                }
                if self.read_quit_request()? {
                    events.push(DisplayEvent::CloseRequested);
                }
                Ok(DriverResponse::Events(events))
            }
            DriverRequest::RequestFramebuffer => {
                let buffer = self.framebuffer.take().ok_or_else(|| {
                    anyhow::anyhow!("Framebuffer already transferred or not initialized")
                })?;
                Ok(DriverResponse::Framebuffer(buffer))
            }
            DriverRequest::Present(buffer) => {
                if buffer.len() != self.buffer_len() {
                    return Err(DisplayError::PresentationFailed {
                        reason: format!(
                            "buffer holds {} bytes, console needs {}",
                            buffer.len(),
                            self.buffer_len()
                        ),
                        buffer,
                    });
                }
                if self.last_frame.as_slice() == &buffer[..] {
                    trace!("ConsoleDisplayDriver: frame unchanged, skipping output");
                    return Ok(DriverResponse::PresentComplete(buffer));
                }
                if let Err(e) = self.write_frame(&buffer) {
                    return Err(DisplayError::PresentationFailed {
                        buffer,
                        reason: e.to_string(),
                    });
                }
                self.last_frame.clear();
                self.last_frame.extend_from_slice(&buffer);
                Ok(DriverResponse::PresentComplete(buffer))
            }
            DriverRequest::SetTitle(title) => {
                // OSC 2 sets the terminal window title.
                write!(self.out, "\x1b]2;{}\x07", title)
                    .context("ConsoleDisplayDriver: failed to set title")?;
                Ok(DriverResponse::TitleSet)
            }
            DriverRequest::SaveSnapshot(_) => Err(DisplayError::Unsupported("snapshots")),
        }
    }
}

fn get_terminal_size_cells(fd: RawFd) -> Result<(u16, u16)> {
    // SAFETY: `winsz` is a plain C struct that TIOCGWINSZ fills in place.
    unsafe {
        let mut winsz: winsize = mem::zeroed();
        if libc::ioctl(fd, TIOCGWINSZ, &mut winsz) == -1 {
            return Err(anyhow::Error::from(io::Error::last_os_error())
                .context("ioctl(TIOCGWINSZ) failed"));
        }
        let cols = if winsz.ws_col == 0 {
            DEFAULT_CONSOLE_COLUMNS
        } else {
            winsz.ws_col
        };
        let rows = if winsz.ws_row == 0 {
            DEFAULT_CONSOLE_ROWS
        } else {
            winsz.ws_row
        };
        Ok((cols, rows))
    }
}

impl Drop for ConsoleDisplayDriver {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            error!("ConsoleDisplayDriver: Error during cleanup in drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use test_log::test;

    /// A writer whose contents the test can inspect after handing it over.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn take_string(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.borrow_mut())).unwrap()
        }
    }

    fn init(cols: u16, rows: u16) -> (ConsoleDisplayDriver, SharedBuf) {
        let buf = SharedBuf::default();
        let mut driver = ConsoleDisplayDriver::with_writer(Box::new(buf.clone()), cols, rows);
        match driver.handle_request(DriverRequest::Init).unwrap() {
            DriverResponse::InitComplete {
                width_px,
                height_px,
            } => {
                assert_eq!(width_px, cols as u32);
                assert_eq!(height_px, (rows as u32 - 1) * 2);
            }
            other => panic!("Expected InitComplete, got {:?}", other),
        }
        (driver, buf)
    }

    #[test]
    fn test_encode_half_blocks_pairs_rows() {
        // 2x2: top row red, bottom row blue.
        let frame = [
            255, 0, 0, 255, 255, 0, 0, 255, //
            0, 0, 255, 255, 0, 0, 255, 255,
        ];
        let text = encode_half_blocks(&frame, 2, 2);
        assert_eq!(
            text,
            "\x1b[38;2;255;0;0m\x1b[48;2;0;0;255m\u{2580}\u{2580}\x1b[0m"
        );
    }

    #[test]
    fn test_encode_odd_height_repeats_last_row() {
        let frame = [10, 20, 30, 255];
        let text = encode_half_blocks(&frame, 1, 1);
        assert!(text.contains("\x1b[38;2;10;20;30m\x1b[48;2;10;20;30m"));
    }

    #[test]
    fn test_present_skips_identical_frames() {
        let (mut driver, out) = init(4, 3);
        out.take_string();

        let buffer = match driver.handle_request(DriverRequest::RequestFramebuffer).unwrap() {
            DriverResponse::Framebuffer(b) => b,
            other => panic!("Expected Framebuffer, got {:?}", other),
        };
        let buffer = match driver.handle_request(DriverRequest::Present(buffer)).unwrap() {
            DriverResponse::PresentComplete(b) => b,
            other => panic!("Expected PresentComplete, got {:?}", other),
        };
        let first = out.take_string();
        assert!(first.starts_with(CURSOR_HOME));
        assert_eq!(first.matches(UPPER_HALF_BLOCK).count(), 4 * 2);

        driver.handle_request(DriverRequest::Present(buffer)).unwrap();
        assert!(out.take_string().is_empty());
    }

    #[test]
    fn test_snapshot_is_unsupported() {
        let (mut driver, _out) = init(4, 3);
        assert!(matches!(
            driver.handle_request(DriverRequest::SaveSnapshot("x.png".into())),
            Err(DisplayError::Unsupported(_))
        ));
    }

    /// Replays scripted chunks of key presses, one per read, then reports
    /// that nothing is pending.
    struct ScriptedKeys(Vec<Vec<u8>>);

    impl Read for ScriptedKeys {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let chunk = self.0.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    fn poll(driver: &mut ConsoleDisplayDriver) -> Vec<DisplayEvent> {
        match driver.handle_request(DriverRequest::PollEvents).unwrap() {
            DriverResponse::Events(events) => events,
            other => panic!("Expected Events, got {:?}", other),
        }
    }

    fn init_with_keys(input: Box<dyn Read>) -> ConsoleDisplayDriver {
        let mut driver =
            ConsoleDisplayDriver::with_io(Box::new(SharedBuf::default()), Some(input), 4, 3);
        driver.handle_request(DriverRequest::Init).unwrap();
        driver
    }

    #[test]
    fn test_quit_key_requests_close() {
        let keys = ScriptedKeys(vec![b"ab".to_vec(), b"xq".to_vec()]);
        let mut driver = init_with_keys(Box::new(keys));
        assert!(poll(&mut driver).is_empty());
        assert_eq!(poll(&mut driver), vec![DisplayEvent::CloseRequested]);
        assert!(poll(&mut driver).is_empty());
    }

    #[test]
    fn test_ctrl_c_requests_close() {
        let mut driver = init_with_keys(Box::new(ScriptedKeys(vec![vec![0x03]])));
        assert_eq!(poll(&mut driver), vec![DisplayEvent::CloseRequested]);
    }

    #[test]
    fn test_eof_on_stdin_requests_close_once() {
        let mut driver = init_with_keys(Box::new(io::empty()));
        assert_eq!(poll(&mut driver), vec![DisplayEvent::CloseRequested]);
        assert!(poll(&mut driver).is_empty());
    }

    #[test]
    fn test_driver_without_input_reports_no_keys() {
        let (mut driver, _out) = init(4, 3);
        assert!(poll(&mut driver).is_empty());
    }

    /// Accepts writes until `fail` is set.
    #[derive(Clone, Default)]
    struct BreakableWriter {
        fail: Rc<std::cell::Cell<bool>>,
    }

    impl Write for BreakableWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail.get() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_resize_survives_failed_clear() {
        let writer = BreakableWriter::default();
        let mut driver = ConsoleDisplayDriver::with_writer(Box::new(writer.clone()), 4, 3);
        driver.handle_request(DriverRequest::Init).unwrap();

        writer.fail.set(true);
        driver.size_source = SizeSource::Fixed { cols: 6, rows: 5 };
        assert_eq!(
            poll(&mut driver),
            vec![DisplayEvent::Resize {
                width_px: 6,
                height_px: 8,
            }]
        );
        match driver.handle_request(DriverRequest::RequestFramebuffer).unwrap() {
            DriverResponse::Framebuffer(b) => assert_eq!(b.len(), 6 * 8 * 4),
            other => panic!("Expected Framebuffer, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_restores_cursor() {
        let (driver, out) = init(2, 2);
        drop(driver);
        assert!(out.take_string().ends_with(&format!("{}{}\r\n", SGR_RESET, CURSOR_SHOW)));
    }
}
