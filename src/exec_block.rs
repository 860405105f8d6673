//! Extraction of `markdown_exec` failure blocks.
//!
//! When the markdown-exec plugin fails to run a code sample it logs a single
//! WARNING/ERROR line followed by the offending code and its traceback:
//!
//! ```text
//! WARNING -  markdown_exec: Execution of python code block exited with errors
//!
//! Code block is:
//!
//!   import foo
//!   foo.bar()
//!
//! Output is:
//!
//!   Traceback (most recent call last):
//!     File "<code block: session test; n1>", line 2, in <module>
//!   AttributeError: module 'foo' has no attribute 'bar'
//! ```
//!
//! [`parse_markdown_exec_issue`] captures such a block in one pass and reports
//! where it stopped, so the caller can skip the block without re-examining
//! its lines.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Issue, Level};
use crate::patterns;

/// How far back to look for the page that was being rendered.
pub const FILE_LOOKBACK: usize = 50;

pub const SOURCE: &str = "markdown_exec";

const DEFAULT_MESSAGE: &str = "Code execution failed";

static READING_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"DEBUG\s*-\s*Reading:\s*(\S+\.md)").expect("built-in pattern must compile")
});

static BREADCRUMB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Generated breadcrumb string:.*\[([^\]]+)\]\(/([^)]+)\)")
        .expect("built-in pattern must compile")
});

static DOC_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Doc file '([^']+\.md)'").expect("built-in pattern must compile")
});

static CODE_BLOCK_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"File "<code block: session ([^;]+); n(\d+)>", line (\d+)"#)
        .expect("built-in pattern must compile")
});

/// Which section of the block the scanner is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Code,
    Output,
}

/// Recover the source page from the lines before the block, nearest first.
fn find_source_file(lines: &[String], start: usize) -> Option<String> {
    let floor = start.saturating_sub(FILE_LOOKBACK - 1);
    (floor..start).rev().find_map(|j| {
        let line = &lines[j];
        if let Some(caps) = READING_FILE.captures(line) {
            return Some(caps[1].to_string());
        }
        if let Some(caps) = BREADCRUMB.captures(line) {
            return Some(format!("{}.md", &caps[2]));
        }
        DOC_FILE.captures(line).map(|caps| caps[1].to_string())
    })
}

/// Parse the block whose header sits at `lines[start]`.
///
/// Returns the issue and the index of the first line that was not consumed.
/// Streams that end mid-block yield whatever was captured so far.
pub fn parse_markdown_exec_issue(
    lines: &[String],
    start: usize,
    level: Level,
) -> (Option<Issue>, usize) {
    let file_path = find_source_file(lines, start);

    let mut code_lines: Vec<&str> = Vec::new();
    let mut output_lines: Vec<&str> = Vec::new();
    let mut section = Section::Preamble;
    let mut session: Option<String> = None;
    let mut line_number: Option<String> = None;

    let mut i = start + 1;
    while i < lines.len() {
        let line = lines[i].as_str();
        let stripped = line.trim();

        if stripped == "Code block is:" {
            section = Section::Code;
            i += 1;
            continue;
        }
        if stripped == "Output is:" {
            section = Section::Output;
            i += 1;
            continue;
        }

        if patterns::is_block_terminator(stripped) {
            break;
        }

        if !stripped.is_empty() {
            match section {
                Section::Code => code_lines.push(line.trim_end()),
                Section::Output => {
                    output_lines.push(line.trim_end());
                    if session.is_none() {
                        if let Some(caps) = CODE_BLOCK_FRAME.captures(stripped) {
                            session = Some(caps[1].to_string());
                            line_number = Some(caps[3].to_string());
                        }
                    }
                }
                Section::Preamble => {}
            }
        }

        i += 1;
    }

    let message = output_lines
        .iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| {
            (line.contains("Error:") || line.contains("Exception:")) && !line.starts_with("File ")
        })
        .unwrap_or(DEFAULT_MESSAGE)
        .to_string();

    let mut location: Vec<String> = Vec::new();
    if let Some(file) = file_path {
        location.push(file);
    }
    if let Some(session) = session {
        location.push(format!("session '{}'", session));
    }
    if let Some(line_number) = line_number {
        location.push(format!("line {}", line_number));
    }

    let issue = Issue {
        level,
        source: SOURCE.to_string(),
        message,
        file: (!location.is_empty()).then(|| location.join(" → ")),
        code: (!code_lines.is_empty()).then(|| code_lines.join("\n")),
        output: (!output_lines.is_empty()).then(|| output_lines.join("\n")),
    };

    (Some(issue), i)
}
