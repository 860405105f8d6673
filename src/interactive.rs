//! Interactive mode: switch between filtered and raw output with a key.
//!
//! A reader thread pushes stdin lines into a bounded channel. The owner
//! task selects over that channel, terminal key events and an idle tick,
//! and is the only one touching the processor. Every line is fed to the
//! processor whatever the view, so switching views never loses issues.
//!
//! | Key | Action |
//! |-----|--------|
//! | `r` | raw view, replaying the history |
//! | `f` | filtered view, replaying the issues |
//! | `q` | quit |

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::boundary::ChunkBoundary;
use crate::input::lossy_lines;
use crate::processor::StreamingProcessor;
use crate::progress::ActivityReporter;
use crate::render::Renderer;
use crate::run::{run_streaming_blocking, FilterOptions};
use crate::stream::{finish, Pending};

const IDLE_TICK: Duration = Duration::from_millis(100);
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// What the reader thread sends.
#[derive(Debug)]
pub enum Feed {
    Line(String),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Filtered,
    Raw,
}

impl View {
    fn label(&self) -> &'static str {
        match self {
            View::Filtered => "FILTERED",
            View::Raw => "RAW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Continue,
    Quit,
    Interrupt,
}

/// Restores cooked mode when dropped, even on early return or panic.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// View state and bounded raw history around one processor.
pub struct Session {
    processor: StreamingProcessor<Pending>,
    history: VecDeque<String>,
    history_cap: usize,
    view: View,
    last_line: Option<String>,
}

impl Session {
    pub fn new(opts: &FilterOptions) -> Self {
        let history_cap = opts.config.interactive.history_lines.max(1);
        Self {
            processor: StreamingProcessor::new(Pending::default(), opts.processor_options()),
            history: VecDeque::with_capacity(history_cap.min(1024)),
            history_cap,
            view: View::Filtered,
            last_line: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn processor(&self) -> &StreamingProcessor<Pending> {
        &self.processor
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Record and process one input line, then show it in the current view.
    pub fn line<W: Write>(&mut self, line: &str, renderer: &mut Renderer<W>) -> Result<()> {
        if self.history.len() == self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(line.to_string());
        self.last_line = Some(line.to_string());

        let boundary = self.processor.process_line(line);
        if boundary == ChunkBoundary::RebuildStarted {
            self.processor.observer_mut().reset();
        }

        match self.view {
            View::Raw => {
                self.processor.observer_mut().discard();
                renderer.raw_line(line)?;
            }
            View::Filtered => self.processor.observer_mut().print(renderer)?,
        }
        Ok(())
    }

    /// Switch views; switching to the current view does nothing.
    pub fn switch<W: Write>(&mut self, view: View, renderer: &mut Renderer<W>) -> Result<()> {
        if view == self.view {
            return Ok(());
        }
        self.view = view;
        renderer.raw_line("")?;
        renderer.banner(&format!("Switched to {} mode", view.label()))?;
        match view {
            View::Raw => {
                for line in &self.history {
                    renderer.raw_line(line)?;
                }
            }
            View::Filtered => {
                self.processor.observer_mut().discard();
                for issue in self.processor.issues() {
                    renderer.issue(issue)?;
                }
            }
        }
        Ok(())
    }

    fn key<W: Write>(&mut self, key: KeyEvent, renderer: &mut Renderer<W>) -> Result<KeyAction> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(KeyAction::Interrupt);
        }
        match key.code {
            KeyCode::Char(c) => match c.to_ascii_lowercase() {
                'q' => return Ok(KeyAction::Quit),
                'r' => self.switch(View::Raw, renderer)?,
                'f' => self.switch(View::Filtered, renderer)?,
                _ => {}
            },
            KeyCode::Esc => return Ok(KeyAction::Quit),
            _ => {}
        }
        Ok(KeyAction::Continue)
    }

    fn idle(&self, activity: &mut dyn ActivityReporter) {
        if self.view == View::Filtered {
            if let Some(line) = &self.last_line {
                activity.report(line, self.processor.build_info().server_url.as_deref());
            }
        }
    }
}

/// Push lines of `input` into `tx`, ending with [`Feed::Eof`] unless stopped.
fn spawn_reader<R: BufRead + Send + 'static>(
    input: R,
    tx: mpsc::Sender<Feed>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for line in lossy_lines(input) {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            match line {
                Ok(line) => {
                    if tx.blocking_send(Feed::Line(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
        let _ = tx.blocking_send(Feed::Eof);
    })
}

async fn join_reader(reader: JoinHandle<()>) {
    let joined = tokio::task::spawn_blocking(move || reader.join());
    if tokio::time::timeout(READER_JOIN_TIMEOUT, joined).await.is_err() {
        tracing::debug!("stdin reader still blocked; leaving it behind");
    }
}

pub async fn run_interactive(opts: FilterOptions) -> Result<i32> {
    if !atty::is(atty::Stream::Stdout) {
        return fall_back(opts).await;
    }
    let guard = match RawModeGuard::enter() {
        Ok(guard) => guard,
        Err(e) => {
            tracing::debug!(error = %e, "no terminal for key input");
            return fall_back(opts).await;
        }
    };

    let mut renderer = opts.renderer(std::io::stdout());
    renderer.set_crlf(true);
    let mut activity = opts.progress.reporter();
    let mut session = Session::new(&opts);

    let (tx, mut rx) = mpsc::channel(opts.config.buffer.raw_lines.max(1));
    let stop = Arc::new(AtomicBool::new(false));
    let reader = spawn_reader(BufReader::new(std::io::stdin()), tx, stop.clone());

    renderer.banner(&format!(
        "Interactive mode: {} │ Press 'r' for raw, 'f' for filtered, 'q' to quit",
        session.view().label()
    ))?;
    renderer.raw_line("")?;

    let outcome = event_loop(&mut session, &mut rx, &mut renderer, activity.as_mut()).await;
    activity.clear();

    stop.store(true, Ordering::Relaxed);
    drop(rx);
    drop(guard);
    join_reader(reader).await;

    renderer.set_crlf(false);
    if outcome? == KeyAction::Interrupt {
        eprintln!("\n\nInterrupted.");
        return Ok(130);
    }

    session.processor.finalize();
    session.processor.observer_mut().discard();
    finish(&session.processor, &mut renderer)
}

async fn event_loop(
    session: &mut Session,
    rx: &mut mpsc::Receiver<Feed>,
    renderer: &mut Renderer<Stdout>,
    activity: &mut dyn ActivityReporter,
) -> Result<KeyAction> {
    let mut events = EventStream::new();
    let mut keys_open = true;
    let mut tick = tokio::time::interval(IDLE_TICK);

    loop {
        tokio::select! {
            feed = rx.recv() => match feed {
                Some(Feed::Line(line)) => {
                    activity.clear();
                    session.line(&line, renderer)?;
                }
                Some(Feed::Eof) | None => return Ok(KeyAction::Continue),
            },
            event = events.next(), if keys_open => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    activity.clear();
                    match session.key(key, renderer)? {
                        KeyAction::Continue => {}
                        done => return Ok(done),
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "terminal event error; keys disabled");
                    keys_open = false;
                }
                None => keys_open = false,
            },
            _ = tick.tick() => session.idle(activity),
        }
    }
}

async fn fall_back(opts: FilterOptions) -> Result<i32> {
    let mut renderer = opts.renderer(std::io::stdout());
    renderer.warning(
        "Warning: Interactive mode requires a terminal. Falling back to streaming mode.",
    )?;
    run_streaming_blocking(opts).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(history_lines: usize) -> Session {
        let mut opts = FilterOptions::default();
        opts.config.interactive.history_lines = history_lines;
        Session::new(&opts)
    }

    fn renderer() -> Renderer<Vec<u8>> {
        FilterOptions::default().renderer(Vec::new())
    }

    fn text(r: Renderer<Vec<u8>>) -> String {
        String::from_utf8(r.into_inner()).unwrap()
    }

    #[test]
    fn raw_view_still_collects_issues() {
        let mut s = session(100);
        let mut r = renderer();
        s.switch(View::Raw, &mut r).unwrap();
        s.line("INFO    -  Building documentation...", &mut r).unwrap();
        s.line("ERROR   -  Something broke", &mut r).unwrap();
        s.line("INFO    -  Documentation built in 1.00 seconds", &mut r).unwrap();
        assert_eq!(s.processor().issues().len(), 1);

        s.switch(View::Filtered, &mut r).unwrap();
        let out = text(r);
        assert!(out.contains("─── Switched to RAW mode ───"));
        assert!(out.contains("ERROR   -  Something broke"));
        assert!(out.contains("─── Switched to FILTERED mode ───"));
        assert!(out.contains("✗ ERROR [mkdocs] Something broke"));
    }

    #[test]
    fn switching_to_raw_replays_history() {
        let mut s = session(2);
        let mut r = renderer();
        for line in ["one", "two", "three"] {
            s.line(line, &mut r).unwrap();
        }
        assert_eq!(s.history_len(), 2);

        let mut replay = renderer();
        s.switch(View::Raw, &mut replay).unwrap();
        let out = text(replay);
        assert!(!out.contains("one"));
        assert!(out.contains("two\nthree\n"));
    }

    #[test]
    fn same_view_switch_is_silent() {
        let mut s = session(10);
        let mut r = renderer();
        s.switch(View::Filtered, &mut r).unwrap();
        assert!(text(r).is_empty());
    }

    #[tokio::test]
    async fn reader_feeds_session_until_eof() {
        let input = "INFO    -  Building documentation...\n\
                     ERROR   -  Something broke\n\
                     INFO    -  Documentation built in 1.00 seconds\n";
        let (tx, mut rx) = mpsc::channel(1);
        let stop = Arc::new(AtomicBool::new(false));
        let reader = spawn_reader(std::io::Cursor::new(input), tx, stop);

        let mut s = session(100);
        let mut r = renderer();
        let mut lines = 0;
        loop {
            match rx.recv().await {
                Some(Feed::Line(line)) => {
                    s.line(&line, &mut r).unwrap();
                    lines += 1;
                }
                Some(Feed::Eof) => break,
                None => panic!("channel closed before Eof"),
            }
        }
        assert!(rx.recv().await.is_none());
        join_reader(reader).await;

        assert_eq!(lines, 3);
        assert_eq!(s.history_len(), 3);
        assert_eq!(s.processor().issues().len(), 1);
        assert!(text(r).contains("✗ ERROR [mkdocs] Something broke"));
    }

    #[tokio::test]
    async fn stopped_reader_sends_nothing() {
        let (tx, mut rx) = mpsc::channel(1);
        let stop = Arc::new(AtomicBool::new(true));
        let reader = spawn_reader(std::io::Cursor::new("ERROR   -  late\n"), tx, stop);
        assert!(rx.recv().await.is_none());
        join_reader(reader).await;
    }

    #[test]
    fn keys_map_to_actions() {
        let mut s = session(10);
        let mut r = renderer();
        let press = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
        assert_eq!(s.key(press('R'), &mut r).unwrap(), KeyAction::Continue);
        assert_eq!(s.view(), View::Raw);
        assert_eq!(s.key(press('q'), &mut r).unwrap(), KeyAction::Quit);
        assert_eq!(
            s.key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut r).unwrap(),
            KeyAction::Interrupt
        );
    }
}
