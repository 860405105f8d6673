//! The streaming line processor.
//!
//! [`StreamingProcessor`] is fed one line at a time. It keeps two bounded
//! windows of recent output: a short one that is re-parsed whenever a
//! boundary asks for a flush, and a longer one that is exported in state
//! snapshots. Newly discovered issues and notices are deduplicated per build
//! cycle and handed to a [`ProcessorObserver`] in discovery order.
//!
//! ```text
//! line ─▶ detect_chunk_boundary ─▶ None          → keep accumulating
//!                                  ErrorBlockEnd → flush
//!                                  BuildComplete → flush, metadata, snapshot
//!                                  ServerStarted → flush, metadata, snapshot
//!                                  RebuildStarted→ flush, on_rebuild, reset
//! ```

use std::collections::{HashSet, VecDeque};

use crate::boundary::{detect_chunk_boundary, ChunkBoundary};
use crate::exec_block;
use crate::info::parse_info_messages;
use crate::models::{BuildInfo, InfoCategory, InfoMessage, Issue, Level};
use crate::parse::{extract_build_info, parse_mkdocs_output};
use crate::patterns;
use crate::state::StateWriter;

/// Characters of the message that take part in an issue's fingerprint.
pub const FINGERPRINT_CHARS: usize = 100;

/// Receives what the processor discovers.
pub trait ProcessorObserver {
    /// Called once per newly seen issue, in discovery order.
    fn on_issue(&mut self, issue: &Issue);

    /// Called once per newly seen informational notice.
    fn on_info(&mut self, _message: &InfoMessage) {}

    /// Called after the pre-rebuild flush and before state is cleared.
    fn on_rebuild(&mut self) {}
}

/// Per-cycle issue filter shared by the batch and streaming paths.
///
/// The fingerprint is the level plus the first [`FINGERPRINT_CHARS`]
/// characters of the message. In errors-only mode warnings are rejected
/// before they reach the seen set.
#[derive(Debug, Default)]
pub struct IssueDedup {
    errors_only: bool,
    seen: HashSet<(Level, String)>,
}

impl IssueDedup {
    pub fn new(errors_only: bool) -> Self {
        Self {
            errors_only,
            seen: HashSet::new(),
        }
    }

    /// `true` when `issue` should be reported.
    pub fn admit(&mut self, issue: &Issue) -> bool {
        if self.errors_only && !issue.is_error() {
            return false;
        }
        let key: String = issue.message.chars().take(FINGERPRINT_CHARS).collect();
        self.seen.insert((issue.level, key))
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Per-cycle notice filter keyed by (category, file, target).
#[derive(Debug, Default)]
pub struct NoticeDedup {
    seen: HashSet<(InfoCategory, String, Option<String>)>,
}

impl NoticeDedup {
    /// `true` the first time a notice is seen.
    pub fn admit(&mut self, message: &InfoMessage) -> bool {
        self.seen.insert((
            message.category,
            message.file.clone(),
            message.target.clone(),
        ))
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Tunables for a processor.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub errors_only: bool,
    /// Lines kept for re-parsing on flush.
    pub context_lines: usize,
    /// Lines kept for the state snapshot.
    pub raw_lines: usize,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            errors_only: false,
            context_lines: 200,
            raw_lines: 500,
        }
    }
}

/// Ring buffer that evicts its oldest line on overflow.
#[derive(Debug)]
struct Window {
    lines: VecDeque<String>,
    cap: usize,
}

impl Window {
    fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            lines: VecDeque::with_capacity(cap),
            cap,
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() == self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Which part of the window a flush looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flush {
    /// The whole window, refreshing build metadata.
    Full,
    /// Everything before a `markdown_exec` header that opens the next block.
    BlockEnd,
    /// The whole window, no metadata.
    Discard,
}

pub struct StreamingProcessor<O: ProcessorObserver> {
    observer: O,
    state_writer: Option<StateWriter>,

    context: Window,
    raw: Window,
    prev_line: Option<String>,

    issues: Vec<Issue>,
    info_messages: Vec<InfoMessage>,
    dedup: IssueDedup,
    notice_dedup: NoticeDedup,
    build_info: BuildInfo,

    saw_mkdocs_output: bool,
    in_serve_mode: bool,
    saw_server_error: bool,
    error_lines: Window,
}

impl<O: ProcessorObserver> StreamingProcessor<O> {
    pub fn new(observer: O, options: ProcessorOptions) -> Self {
        Self {
            observer,
            context: Window::new(options.context_lines),
            raw: Window::new(options.raw_lines),
            error_lines: Window::new(options.raw_lines),
            dedup: IssueDedup::new(options.errors_only),
            state_writer: None,
            prev_line: None,
            issues: Vec::new(),
            info_messages: Vec::new(),
            notice_dedup: NoticeDedup::default(),
            build_info: BuildInfo::default(),
            saw_mkdocs_output: false,
            in_serve_mode: false,
            saw_server_error: false,
        }
    }

    /// Publish a snapshot after every completed build.
    pub fn with_state_writer(mut self, writer: StateWriter) -> Self {
        self.state_writer = Some(writer);
        self
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Feed one line of output and report which boundary it marked.
    pub fn process_line(&mut self, line: &str) -> ChunkBoundary {
        let line = line.trim_end();
        self.track_session(line);

        self.context.push(line.to_string());
        self.raw.push(line.to_string());

        let boundary = detect_chunk_boundary(line, self.prev_line.as_deref());
        self.prev_line = Some(line.to_string());

        match boundary {
            ChunkBoundary::RebuildStarted => {
                tracing::debug!("rebuild started; resetting cycle state");
                self.flush(Flush::Discard);
                self.observer.on_rebuild();
                self.reset_cycle();
            }
            ChunkBoundary::BuildComplete | ChunkBoundary::ServerStarted => {
                tracing::debug!(?boundary, "build cycle boundary");
                self.flush(Flush::Full);
                self.build_info.merge(extract_build_info(&[line.to_string()]));
                self.publish();
            }
            ChunkBoundary::ErrorBlockEnd if line.contains(exec_block::SOURCE) => {
                self.flush(Flush::BlockEnd);
            }
            ChunkBoundary::ErrorBlockEnd => {
                self.flush(Flush::Discard);
            }
            ChunkBoundary::None => {}
        }

        boundary
    }

    fn track_session(&mut self, line: &str) {
        if !self.saw_mkdocs_output && patterns::is_mkdocs_line(line) {
            self.saw_mkdocs_output = true;
        }
        if line.contains("Serving on http") {
            self.in_serve_mode = true;
        }
        if patterns::is_server_error(line) {
            self.saw_server_error = true;
        }
        if self.saw_server_error {
            self.error_lines.push(line.to_string());
        }
    }

    fn flush(&mut self, kind: Flush) {
        let mut window = self.context.to_vec();
        if kind == Flush::BlockEnd {
            // The header is parsed once its block body has arrived.
            window.pop();
        }
        if window.is_empty() {
            return;
        }

        if kind == Flush::Full {
            self.build_info.merge(extract_build_info(&window));
        }

        for message in parse_info_messages(&window) {
            if self.notice_dedup.admit(&message) {
                self.observer.on_info(&message);
                self.info_messages.push(message);
            }
        }

        let mut fresh = 0usize;
        for issue in parse_mkdocs_output(&window) {
            if self.dedup.admit(&issue) {
                self.observer.on_issue(&issue);
                self.issues.push(issue);
                fresh += 1;
            }
        }
        if fresh > 0 {
            tracing::debug!(fresh, total = self.issues.len(), "flushed new issues");
        }
    }

    fn reset_cycle(&mut self) {
        self.context.clear();
        self.raw.clear();
        self.issues.clear();
        self.info_messages.clear();
        self.dedup.clear();
        self.notice_dedup.clear();
        self.build_info = BuildInfo::default();
    }

    fn publish(&mut self) {
        let Some(writer) = self.state_writer.as_mut() else {
            return;
        };
        if let Err(e) = writer.write(
            &self.issues,
            &self.info_messages,
            &self.build_info,
            self.raw.lines.iter(),
        ) {
            tracing::warn!(error = %e, "failed to write state snapshot");
        }
    }

    /// Flush whatever is left, including blocks cut off by end of input.
    pub fn finalize(&mut self) -> (&[Issue], &BuildInfo) {
        self.flush(Flush::Full);
        (&self.issues, &self.build_info)
    }

    /// Issues of the current build cycle.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn info_messages(&self) -> &[InfoMessage] {
        &self.info_messages
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.build_info
    }

    /// Whether any line looked like MkDocs output.
    pub fn saw_mkdocs_output(&self) -> bool {
        self.saw_mkdocs_output
    }

    pub fn in_serve_mode(&self) -> bool {
        self.in_serve_mode
    }

    pub fn saw_server_error(&self) -> bool {
        self.saw_server_error
    }

    /// Lines seen since the first server error.
    pub fn error_lines(&self) -> Vec<String> {
        self.error_lines.to_vec()
    }

    /// The snapshot window, oldest first.
    pub fn raw_lines(&self) -> Vec<String> {
        self.raw.to_vec()
    }
}
