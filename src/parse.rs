//! Window-level extraction of issues and build metadata.
//!
//! Both functions operate on a finished window of lines (a whole batch input
//! or a flushed streaming buffer) and never fail.

use crate::exec_block::{self, parse_markdown_exec_issue};
use crate::models::{BuildInfo, Issue, Level};
use crate::patterns;

pub const SOURCE: &str = "mkdocs";

/// Extract every warning and error in `lines`, in order of appearance.
///
/// A `markdown_exec` header consumes its whole block; the lines of the block
/// are never re-examined as issues of their own.
pub fn parse_mkdocs_output(lines: &[String]) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].as_str();

        let level = if line.contains("ERROR") {
            Level::Error
        } else if line.contains("WARNING") {
            Level::Warning
        } else {
            i += 1;
            continue;
        };

        if line.contains(exec_block::SOURCE) {
            let (issue, next) = parse_markdown_exec_issue(lines, i, level);
            if let Some(issue) = issue {
                issues.push(issue);
                // The stop index is never the header itself.
                i = next.max(i + 1);
                continue;
            }
        }

        let stripped = line.trim();
        if stripped.starts_with("raise ") || stripped.starts_with("File ") {
            i += 1;
            continue;
        }

        let message = patterns::clean_message(line);
        if !message.is_empty() {
            let file = patterns::md_file_path(&message);
            issues.push(Issue::new(level, SOURCE, message).with_file(file));
        }

        i += 1;
    }

    issues
}

/// Scan `lines` for server URL, output directory and build duration.
///
/// Later matches win within the window.
pub fn extract_build_info(lines: &[String]) -> BuildInfo {
    let mut info = BuildInfo::default();
    for line in lines {
        info.merge(BuildInfo {
            server_url: patterns::server_url(line),
            build_dir: patterns::build_dir(line),
            build_time: patterns::build_time(line),
        });
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn plain_warnings_and_errors() {
        let input = lines(
            "INFO    -  Cleaning site directory\n\
             WARNING -  Doc file 'guide.md' contains a link 'missing.md', but the target is not found\n\
             ERROR   -  Config value 'theme': unrecognised theme name",
        );
        let issues = parse_mkdocs_output(&input);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].level, Level::Warning);
        assert_eq!(issues[0].source, "mkdocs");
        assert_eq!(issues[0].file.as_deref(), Some("guide.md"));
        assert_eq!(issues[1].level, Level::Error);
        assert_eq!(
            issues[1].message,
            "Config value 'theme': unrecognised theme name"
        );
        assert_eq!(issues[1].file, None);
    }

    #[test]
    fn traceback_lines_are_skipped() {
        let input = lines(
            "    raise ValueError('ERROR in config')\n\
             \x20 File \"/x/WARNING.py\", line 3",
        );
        assert!(parse_mkdocs_output(&input).is_empty());
    }

    #[test]
    fn exec_block_is_consumed_once() {
        let input = lines(
            "WARNING -  markdown_exec: Execution of python code block exited with errors\n\
             Output is:\n\
             \x20 RuntimeError: ERROR raised inside the block\n\
             ERROR   -  Aborted with 1 warnings in strict mode",
        );
        let issues = parse_mkdocs_output(&input);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].source, "markdown_exec");
        assert_eq!(
            issues[0].message,
            "RuntimeError: ERROR raised inside the block"
        );
        assert_eq!(issues[1].source, "mkdocs");
        assert_eq!(issues[1].message, "Aborted with 1 warnings in strict mode");
    }

    #[test]
    fn exec_header_on_last_line() {
        let input = lines("ERROR   -  markdown_exec: Execution of bash code block failed");
        let issues = parse_mkdocs_output(&input);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].level, Level::Error);
        assert_eq!(issues[0].message, "Code execution failed");
    }

    #[test]
    fn build_info_takes_latest_values() {
        let input = lines(
            "INFO    -  Building documentation to directory: /tmp/site\n\
             INFO    -  Documentation built in 3.10 seconds\n\
             INFO    -  [10:00:00] Serving on http://127.0.0.1:8000/\n\
             INFO    -  Documentation built in 0.42 seconds",
        );
        let info = extract_build_info(&input);
        assert_eq!(info.build_dir.as_deref(), Some("/tmp/site"));
        assert_eq!(info.build_time.as_deref(), Some("0.42"));
        assert_eq!(info.server_url.as_deref(), Some("http://127.0.0.1:8000/"));
    }

    #[test]
    fn empty_window() {
        assert!(parse_mkdocs_output(&[]).is_empty());
        assert!(extract_build_info(&[]).is_empty());
    }
}
