//! Human-readable rendering of issues, notices and the build summary.
//!
//! [`Renderer`] writes to any [`Write`] sink so the same code drives the
//! terminal and the tests. Colors come from crossterm's [`Stylize`] and are
//! switched off with `--no-color`. While the terminal is in raw mode (the
//! interactive driver) every line ends in `\r\n`.

use crossterm::style::Stylize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use crate::config::DisplayConfig;
use crate::exec_block;
use crate::models::{BuildInfo, InfoCategory, InfoMessage, Issue, Level};
use crate::patterns::{dedent_code, is_any_level_line, is_exception_line};

/// Lines of a traceback shown without `--verbose`.
const SUMMARY_LINES: usize = 3;

/// Server error lines shown after a crash.
const SERVER_ERROR_TAIL: usize = 20;

#[derive(Debug, Clone, Copy)]
enum Tone {
    Error,
    Warning,
    Dim,
    Location,
    Good,
    Output,
    Target,
}

fn category_display(category: InfoCategory) -> (&'static str, &'static str) {
    match category {
        InfoCategory::BrokenLink => ("🔗 Broken links", "Link target not found"),
        InfoCategory::AbsoluteLink => ("🔗 Absolute links", "Left as-is, may not work"),
        InfoCategory::UnrecognizedLink => ("🔗 Unrecognized links", "Could not resolve"),
        InfoCategory::MissingNav => ("📄 Pages not in nav", "Not included in navigation"),
        InfoCategory::NoGitLogs => ("📅 No git history", "git-revision plugin warning"),
    }
}

/// The few traceback lines worth showing when not verbose.
///
/// Walks backwards over non-blank lines, skipping log lines, and stops at
/// the exception line or after three lines.
pub fn error_summary(output: &str) -> Vec<String> {
    let mut summary: Vec<String> = Vec::new();
    for line in output.lines().rev() {
        let stripped = line.trim();
        if stripped.is_empty() || is_any_level_line(stripped) {
            continue;
        }
        summary.insert(0, stripped.to_string());
        if is_exception_line(stripped) || summary.len() >= SUMMARY_LINES {
            break;
        }
    }
    summary
}

fn tail_lines(lines: &[&str], keep: usize) -> (usize, Vec<String>) {
    let omitted = lines.len().saturating_sub(keep);
    (omitted, lines[omitted..].iter().map(|l| l.to_string()).collect())
}

pub struct Renderer<W: Write> {
    out: W,
    color: bool,
    verbose: bool,
    crlf: bool,
    display: DisplayConfig,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, color: bool, verbose: bool, display: DisplayConfig) -> Self {
        Self {
            out,
            color,
            verbose,
            crlf: false,
            display,
        }
    }

    /// End lines with `\r\n`, needed while the terminal is in raw mode.
    pub fn set_crlf(&mut self, crlf: bool) {
        self.crlf = crlf;
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.color {
            return text.to_string();
        }
        match tone {
            Tone::Error => text.red().bold().to_string(),
            Tone::Warning => text.yellow().bold().to_string(),
            Tone::Dim => text.dim().to_string(),
            Tone::Location => text.cyan().to_string(),
            Tone::Good => text.green().bold().to_string(),
            Tone::Output => text.blue().bold().to_string(),
            Tone::Target => text.yellow().to_string(),
        }
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        let eol = if self.crlf { "\r\n" } else { "\n" };
        for part in text.split('\n') {
            self.out.write_all(part.as_bytes())?;
            self.out.write_all(eol.as_bytes())?;
        }
        Ok(())
    }

    fn blank(&mut self) -> io::Result<()> {
        self.line("")
    }

    /// A boxed block of text with a title, optionally line-numbered.
    fn panel(&mut self, title: &str, body: &str, numbered: bool, tone: Tone) -> io::Result<()> {
        let top = format!("   ┌─ {}", title);
        self.line(&self.paint(&top, tone))?;
        let lines: Vec<&str> = body.split('\n').collect();
        let width = lines.len().to_string().len();
        let bar = self.paint("   │", tone);
        for (i, text) in lines.iter().enumerate() {
            if numbered {
                let number = self.paint(&format!("{:>width$}", i + 1, width = width), Tone::Dim);
                self.line(&format!("{} {}  {}", bar, number, text))?;
            } else {
                self.line(&format!("{} {}", bar, text))?;
            }
        }
        self.line(&self.paint("   └─", tone))
    }

    /// One issue: header, location, code and traceback.
    pub fn issue(&mut self, issue: &Issue) -> io::Result<()> {
        let (icon, tone) = match issue.level {
            Level::Error => ("✗", Tone::Error),
            Level::Warning => ("⚠", Tone::Warning),
        };
        let header = format!(
            "{} {} {}",
            self.paint(&format!("{} {}", icon, issue.level), tone),
            self.paint(&format!("[{}]", issue.source), Tone::Dim),
            issue.message
        );
        self.line(&header)?;

        if let Some(file) = &issue.file {
            self.line(&self.paint(&format!("   📍 {}", file), Tone::Location))?;
        }

        if let Some(code) = &issue.code {
            self.blank()?;
            let lines: Vec<&str> = code.split('\n').collect();
            let keep = self.display.code_tail_lines;
            let shown = if !self.verbose && lines.len() > keep {
                let (omitted, tail) = tail_lines(&lines, keep);
                format!("  # ... ({} lines above)\n{}", omitted, tail.join("\n"))
            } else {
                code.clone()
            };
            self.panel("Code Block", &dedent_code(&shown), true, Tone::Location)?;
        }

        if let Some(output) = &issue.output {
            if self.verbose {
                let lines: Vec<&str> = output.split('\n').filter(|l| !l.trim().is_empty()).collect();
                let keep = self.display.traceback_tail_lines;
                let shown = if lines.len() > keep {
                    let (omitted, tail) = tail_lines(&lines, keep);
                    format!("... ({} lines omitted)\n{}", omitted, tail.join("\n"))
                } else {
                    output.clone()
                };
                self.panel("Traceback", &dedent_code(&shown), false, Tone::Error)?;
            } else {
                let summary = error_summary(output);
                if !summary.is_empty() {
                    self.panel(
                        "Error Output (use -v for full traceback)",
                        &summary.join("\n"),
                        false,
                        Tone::Error,
                    )?;
                }
            }
        }

        self.blank()?;
        self.out.flush()
    }

    /// Notices grouped by category.
    pub fn info_groups(
        &mut self,
        groups: &BTreeMap<InfoCategory, Vec<InfoMessage>>,
    ) -> io::Result<()> {
        for (category, messages) in groups {
            let (title, description) = category_display(*category);
            self.line(&format!(
                "{} {}",
                self.paint(title, Tone::Location),
                self.paint(
                    &format!("({} files) - {}", messages.len(), description),
                    Tone::Dim
                )
            ))?;

            if category.is_link() {
                self.link_targets(messages)?;
            } else {
                let max = self.display.max_files_shown;
                let shown = if self.verbose { messages.len() } else { max.min(messages.len()) };
                for message in &messages[..shown] {
                    self.line(&format!("  ├ {}", self.paint(&message.file, Tone::Dim)))?;
                }
                if shown < messages.len() {
                    self.line(&format!(
                        "  └ {}",
                        self.paint(&format!("... and {} more", messages.len() - shown), Tone::Dim)
                    ))?;
                }
            }
            self.blank()?;
        }
        self.out.flush()
    }

    fn link_targets(&mut self, messages: &[InfoMessage]) -> io::Result<()> {
        let mut by_target: BTreeMap<&str, Vec<&InfoMessage>> = BTreeMap::new();
        for message in messages {
            by_target
                .entry(message.target.as_deref().unwrap_or("unknown"))
                .or_default()
                .push(message);
        }
        let mut targets: Vec<(&str, Vec<&InfoMessage>)> = by_target.into_iter().collect();
        targets.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

        let max = self.display.max_targets_shown;
        let shown = if self.verbose { targets.len() } else { max.min(targets.len()) };

        for (target, group) in &targets[..shown] {
            let label = self.paint(&format!("'{}'", target), Tone::Target);
            let suggestion = group[0]
                .suggestion
                .as_ref()
                .map(|s| format!(" {}", self.paint(&format!("→ '{}'", s), Tone::Dim)))
                .unwrap_or_default();
            if self.verbose {
                let count = self.paint(&format!("({})", group.len()), Tone::Dim);
                self.line(&format!("  ├ {}{} {}", label, suggestion, count))?;
                for message in group {
                    self.line(&format!("  │   {}", self.paint(&message.file, Tone::Dim)))?;
                }
            } else {
                let count = self.paint(&format!("({} files)", group.len()), Tone::Dim);
                self.line(&format!("  ├ {} {}{}", label, count, suggestion))?;
            }
        }

        let remaining = targets.len() - shown;
        if remaining > 0 {
            self.line(&format!(
                "  └ {}",
                self.paint(&format!("... and {} more targets", remaining), Tone::Dim)
            ))?;
        }
        Ok(())
    }

    /// Counts, build metadata and hints printed once output ends.
    pub fn summary(&mut self, issues: &[Issue], build_info: &BuildInfo) -> io::Result<()> {
        let errors = issues.iter().filter(|i| i.is_error()).count();
        let warnings = issues.len() - errors;

        if !issues.is_empty() {
            self.line(&self.paint(&"─".repeat(40), Tone::Dim))?;
            let mut parts = Vec::new();
            if errors > 0 {
                parts.push(self.paint(&format!("{} error(s)", errors), Tone::Error));
            }
            if warnings > 0 {
                parts.push(self.paint(&format!("{} warning(s)", warnings), Tone::Warning));
            }
            self.line(&format!("Summary: {}", parts.join(", ")))?;
        }

        self.blank()?;
        if let Some(url) = &build_info.server_url {
            self.line(&format!("{} {}", self.paint("🌐 Server:", Tone::Good), url))?;
        }
        if let Some(dir) = &build_info.build_dir {
            self.line(&format!("{} {}", self.paint("📁 Output:", Tone::Output), dir))?;
        }
        if let Some(time) = &build_info.build_time {
            self.line(&self.paint(&format!("Built in {}s", time), Tone::Dim))?;
        }

        if !issues.is_empty() {
            self.blank()?;
            let mut hints = Vec::new();
            if !self.verbose {
                hints.push("-v for verbose output");
            }
            hints.push("--raw for full mkdocs output");
            self.line(&self.paint(&format!("Hint: {}", hints.join(", ")), Tone::Dim))?;

            let missing_page = issues.iter().any(|i| {
                i.source == exec_block::SOURCE
                    && i.file
                        .as_deref()
                        .is_some_and(|f| f.contains("session") && !f.contains(".md"))
            });
            if missing_page {
                self.line(&self.paint(
                    "Tip: Use mkdocs build --verbose to see which file contains code block errors",
                    Tone::Dim,
                ))?;
            }
        }
        self.out.flush()
    }

    pub fn success(&mut self) -> io::Result<()> {
        self.line(&self.paint("✓ No warnings or errors", Tone::Good))?;
        self.out.flush()
    }

    pub fn build_time(&mut self, build_info: &BuildInfo) -> io::Result<()> {
        if let Some(time) = &build_info.build_time {
            self.line(&self.paint(&format!("Built in {}s", time), Tone::Dim))?;
        }
        self.blank()?;
        self.out.flush()
    }

    pub fn server_url(&mut self, build_info: &BuildInfo) -> io::Result<()> {
        if let Some(url) = &build_info.server_url {
            self.line(&format!("{} {}", self.paint("🌐 Server:", Tone::Good), url))?;
            self.blank()?;
        }
        self.out.flush()
    }

    /// A dim `─── text ───` separator.
    pub fn banner(&mut self, text: &str) -> io::Result<()> {
        self.line(&self.paint(&format!("─── {} ───", text), Tone::Dim))?;
        self.out.flush()
    }

    pub fn rebuild(&mut self) -> io::Result<()> {
        self.blank()?;
        self.banner("File change detected, rebuilding...")?;
        self.blank()
    }

    pub fn state_shared(&mut self, path: &Path) -> io::Result<()> {
        self.line(&self.paint(
            &format!("💡 MCP: State shared to {}", path.display()),
            Tone::Dim,
        ))?;
        self.blank()?;
        self.out.flush()
    }

    pub fn raw_line(&mut self, line: &str) -> io::Result<()> {
        self.line(line)?;
        self.out.flush()
    }

    pub fn warning(&mut self, text: &str) -> io::Result<()> {
        self.line(&self.paint(text, Tone::Target))?;
        self.out.flush()
    }

    /// Input that never looked like MkDocs output, echoed back.
    pub fn unrecognized_output(&mut self, raw: &[String]) -> io::Result<()> {
        self.line(&self.paint(
            "Error: mkdocs did not produce expected output",
            Tone::Error,
        ))?;
        self.blank()?;
        self.line(&self.paint("Raw output:", Tone::Dim))?;
        for line in raw {
            self.line(&format!("  {}", line))?;
        }
        self.out.flush()
    }

    pub fn server_error(&mut self, lines: &[String]) -> io::Result<()> {
        self.blank()?;
        self.line(&self.paint("Server error:", Tone::Error))?;
        let start = lines.len().saturating_sub(SERVER_ERROR_TAIL);
        for line in &lines[start..] {
            self.line(&format!("  {}", line))?;
        }
        self.out.flush()
    }

    pub fn server_stopped(&mut self) -> io::Result<()> {
        self.blank()?;
        self.warning("Server stopped unexpectedly.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(verbose: bool) -> Renderer<Vec<u8>> {
        Renderer::new(Vec::new(), false, verbose, DisplayConfig::default())
    }

    fn text(r: Renderer<Vec<u8>>) -> String {
        String::from_utf8(r.into_inner()).unwrap()
    }

    fn exec_issue() -> Issue {
        Issue {
            level: Level::Warning,
            source: "markdown_exec".into(),
            message: "ValueError: bad".into(),
            file: Some("session 'demo' → line 3".into()),
            code: Some((1..=12).map(|i| format!("    x{} = {}", i, i)).collect::<Vec<_>>().join("\n")),
            output: Some(
                "  Traceback (most recent call last):\n    File \"<code block: session demo; n1>\", line 3\n  ValueError: bad".into(),
            ),
        }
    }

    #[test]
    fn summary_stops_at_exception_line() {
        let output = "Traceback (most recent call last):\n  File \"x\", line 1\nKeyError: 'a'\n\nINFO    -  done";
        assert_eq!(error_summary(output), vec!["KeyError: 'a'"]);

        let no_exception = "one\ntwo\nthree\nfour";
        assert_eq!(error_summary(no_exception), vec!["two", "three", "four"]);
    }

    #[test]
    fn compact_issue_shows_code_tail_and_error_panel() {
        let mut r = renderer(false);
        r.issue(&exec_issue()).unwrap();
        let out = text(r);
        assert!(out.starts_with("⚠ WARNING [markdown_exec] ValueError: bad\n"));
        assert!(out.contains("📍 session 'demo' → line 3"));
        assert!(out.contains("# ... (2 lines above)"));
        assert!(!out.contains("x1 = 1\n"));
        assert!(out.contains("x12 = 12"));
        assert!(out.contains("Error Output (use -v for full traceback)"));
        assert!(!out.contains("Traceback (most recent"));
    }

    #[test]
    fn verbose_issue_shows_everything() {
        let mut r = renderer(true);
        r.issue(&exec_issue()).unwrap();
        let out = text(r);
        assert!(out.contains("x1 = 1"));
        assert!(out.contains("┌─ Traceback"));
        assert!(out.contains("Traceback (most recent call last):"));
    }

    #[test]
    fn crlf_in_raw_mode() {
        let mut r = renderer(false);
        r.set_crlf(true);
        r.raw_line("INFO    -  Building").unwrap();
        assert_eq!(text(r), "INFO    -  Building\r\n");
    }

    #[test]
    fn link_groups_sorted_by_count() {
        let mk = |file: &str, target: &str| InfoMessage {
            category: InfoCategory::BrokenLink,
            file: file.into(),
            target: Some(target.into()),
            suggestion: None,
        };
        let mut groups = BTreeMap::new();
        groups.insert(
            InfoCategory::BrokenLink,
            vec![mk("a.md", "z.md"), mk("b.md", "y.md"), mk("c.md", "y.md")],
        );
        let mut r = renderer(false);
        r.info_groups(&groups).unwrap();
        let out = text(r);
        assert!(out.contains("🔗 Broken links (3 files) - Link target not found"));
        let y = out.find("'y.md' (2 files)").unwrap();
        let z = out.find("'z.md' (1 files)").unwrap();
        assert!(y < z);
    }

    #[test]
    fn file_lists_are_truncated() {
        let messages: Vec<_> = (0..5)
            .map(|i| InfoMessage::new(InfoCategory::MissingNav, format!("p{}.md", i)))
            .collect();
        let mut groups = BTreeMap::new();
        groups.insert(InfoCategory::MissingNav, messages);
        let mut r = renderer(false);
        r.info_groups(&groups).unwrap();
        let out = text(r);
        assert!(out.contains("p2.md"));
        assert!(!out.contains("p3.md"));
        assert!(out.contains("... and 2 more"));
    }

    #[test]
    fn summary_counts_and_tip() {
        let issues = vec![
            Issue::new(Level::Error, "mkdocs", "boom"),
            exec_issue(),
        ];
        let info = BuildInfo {
            server_url: None,
            build_dir: Some("/tmp/site".into()),
            build_time: Some("1.5".into()),
        };
        let mut r = renderer(false);
        r.summary(&issues, &info).unwrap();
        let out = text(r);
        assert!(out.contains("Summary: 1 error(s), 1 warning(s)"));
        assert!(out.contains("📁 Output: /tmp/site"));
        assert!(out.contains("Built in 1.5s"));
        assert!(out.contains("Hint: -v for verbose output, --raw for full mkdocs output"));
        assert!(out.contains("Tip: Use mkdocs build --verbose"));
    }

    #[test]
    fn clean_summary_has_no_hints() {
        let mut r = renderer(false);
        r.summary(&[], &BuildInfo::default()).unwrap();
        let out = text(r);
        assert!(!out.contains("Summary"));
        assert!(!out.contains("Hint"));
    }
}
