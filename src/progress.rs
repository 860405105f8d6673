//! Activity line shown while MkDocs is working.
//!
//! Reports the latest raw log line on **stderr** so stdout keeps only the
//! filtered view. The line is redrawn in place and cleared before anything
//! else is printed.

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use std::io::Write;
use std::time::{Duration, Instant};

use crate::patterns::truncate_line;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const REDRAW_EVERY: Duration = Duration::from_millis(100);
const LINE_WIDTH: usize = 60;

/// Reports what the filter is currently looking at.
pub trait ActivityReporter: Send {
    /// Show `line` (and the server URL once known) as the current activity.
    fn report(&mut self, line: &str, server_url: Option<&str>);

    /// Remove the activity line so regular output starts on a clean line.
    fn clear(&mut self);
}

/// Spinner plus truncated log line, redrawn at most every 100ms.
pub struct StderrActivity {
    frame: usize,
    last_draw: Option<Instant>,
    visible: bool,
}

impl StderrActivity {
    pub fn new() -> Self {
        Self {
            frame: 0,
            last_draw: None,
            visible: false,
        }
    }
}

impl Default for StderrActivity {
    fn default() -> Self {
        Self::new()
    }
}

/// The text of one activity frame.
pub fn activity_text(frame: usize, line: &str, server_url: Option<&str>) -> String {
    let spinner = FRAMES[frame % FRAMES.len()];
    let mut text = format!("{} {}", spinner, truncate_line(line.trim(), LINE_WIDTH));
    if let Some(url) = server_url {
        text.push_str(&format!("  [{}]", url));
    }
    text
}

impl ActivityReporter for StderrActivity {
    fn report(&mut self, line: &str, server_url: Option<&str>) {
        if line.trim().is_empty() {
            return;
        }
        if self
            .last_draw
            .is_some_and(|at| at.elapsed() < REDRAW_EVERY)
        {
            return;
        }
        self.frame = self.frame.wrapping_add(1);
        self.last_draw = Some(Instant::now());
        self.visible = true;

        let text = activity_text(self.frame, line, server_url);
        let mut err = std::io::stderr().lock();
        let _ = queue!(err, MoveToColumn(0), Clear(ClearType::CurrentLine));
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    }

    fn clear(&mut self) {
        if !self.visible {
            return;
        }
        self.visible = false;
        self.last_draw = None;
        let mut err = std::io::stderr().lock();
        let _ = queue!(err, MoveToColumn(0), Clear(ClearType::CurrentLine));
        let _ = err.flush();
    }
}

/// No-op reporter when the activity line is disabled.
pub struct NoActivity;

impl ActivityReporter for NoActivity {
    fn report(&mut self, _line: &str, _server_url: Option<&str>) {}
    fn clear(&mut self) {}
}

/// Activity mode for the CLI: off or human (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
}

impl ProgressMode {
    /// Default: human activity when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ActivityReporter> {
        match self {
            ProgressMode::Off => Box::new(NoActivity),
            ProgressMode::Human => Box::new(StderrActivity::new()),
        }
    }
}
