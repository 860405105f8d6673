//! Fixed textual signatures of MkDocs console output.
//!
//! Every matcher here is a pure function over a single line. Non-matching
//! input yields `None` or `false`; nothing in this module can fail at
//! runtime once the regexes are compiled.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

static TIMESTAMP_PREFIX: Lazy<Regex> = Lazy::new(|| compile(r"^\d{4}-\d{2}-\d{2}"));

static LEVEL_LINE: Lazy<Regex> = Lazy::new(|| compile(r"^(INFO|WARNING|ERROR)\s*-"));

static TIMESTAMPED_LEVEL_LINE: Lazy<Regex> =
    Lazy::new(|| compile(r"^\d{4}-\d{2}-\d{2}.*?(INFO|WARNING|ERROR)"));

static ANY_LEVEL_LINE: Lazy<Regex> = Lazy::new(|| compile(r"^(INFO|DEBUG|WARNING|ERROR)\s*-"));

static MKDOCS_LEVEL_LINE: Lazy<Regex> =
    Lazy::new(|| compile(r"^(INFO|WARNING|ERROR|DEBUG)\s+-"));

static STDERR_TAG: Lazy<Regex> = Lazy::new(|| compile(r"^\[stderr\]\s*"));

static TIMESTAMP_HEADER: Lazy<Regex> = Lazy::new(|| compile(r"^\d{4}-\d{2}-\d{2}.*?-\s*"));

static LEVEL_KEYWORD: Lazy<Regex> = Lazy::new(|| compile(r"^(WARNING|ERROR)\s*-?\s*"));

static MD_SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| compile(r"'([^']+\.md)'"));

static MD_DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| compile(r#""([^"]+\.md)""#));

static BUILD_COMPLETE: Lazy<Regex> =
    Lazy::new(|| compile(r"Documentation built in ([\d.]+) seconds"));

static SERVING_ON: Lazy<Regex> = Lazy::new(|| compile(r"Serving on https?://"));

static SERVER_URL: Lazy<Regex> = Lazy::new(|| compile(r"Serving on (https?://\S+)"));

static BUILD_DIR: Lazy<Regex> =
    Lazy::new(|| compile(r"Building documentation to directory: (.+)"));

static SERVER_ERROR_PREFIX: Lazy<Regex> =
    Lazy::new(|| compile(r"^(OSError|IOError|PermissionError|ConnectionError):"));

static EXCEPTION_LINE: Lazy<Regex> =
    Lazy::new(|| compile(r"^[A-Z][a-zA-Z]*(Error|Exception|Warning):"));

static LOGGER_HEADER: Lazy<Regex> =
    Lazy::new(|| compile(r"^\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2},\d+\s*-\s*"));

static LOGGER_NAME_LEVEL: Lazy<Regex> =
    Lazy::new(|| compile(r"^[\w.]+\s*-\s*(INFO|WARNING|ERROR)\s*-\s*"));

/// Line starts with a `YYYY-MM-DD` timestamp.
pub fn starts_with_timestamp(stripped: &str) -> bool {
    TIMESTAMP_PREFIX.is_match(stripped)
}

/// Canonical MkDocs log line: `LEVEL -` or a timestamp followed by a level.
pub fn is_level_line(stripped: &str) -> bool {
    LEVEL_LINE.is_match(stripped) || TIMESTAMPED_LEVEL_LINE.is_match(stripped)
}

/// Whether a line proves the input came from MkDocs at all.
pub fn is_mkdocs_line(line: &str) -> bool {
    MKDOCS_LEVEL_LINE.is_match(line) || TIMESTAMPED_LEVEL_LINE.is_match(line)
}

/// A line that ends an embedded `markdown_exec` block.
pub fn is_block_terminator(stripped: &str) -> bool {
    ANY_LEVEL_LINE.is_match(stripped)
        || TIMESTAMP_PREFIX.is_match(stripped)
        || stripped.starts_with("[stderr]")
}

/// `LEVEL -` prefix including DEBUG, used when summarising tracebacks.
pub fn is_any_level_line(stripped: &str) -> bool {
    MKDOCS_LEVEL_LINE.is_match(stripped)
}

pub fn is_build_complete(line: &str) -> bool {
    BUILD_COMPLETE.is_match(line)
}

pub fn is_serving(line: &str) -> bool {
    SERVING_ON.is_match(line)
}

/// `Serving on http://127.0.0.1:8000/` → `http://127.0.0.1:8000/`.
pub fn server_url(line: &str) -> Option<String> {
    SERVER_URL
        .captures(line)
        .map(|caps| caps[1].to_string())
}

/// `Documentation built in 78.99 seconds` → `78.99`.
pub fn build_time(line: &str) -> Option<String> {
    BUILD_COMPLETE
        .captures(line)
        .map(|caps| caps[1].to_string())
}

/// `Building documentation to directory: /tmp/site` → `/tmp/site`.
pub fn build_dir(line: &str) -> Option<String> {
    BUILD_DIR
        .captures(line)
        .map(|caps| caps[1].trim().to_string())
}

/// Strip the stream tag, timestamp header and level keyword from a log line.
pub fn clean_message(line: &str) -> String {
    let message = STDERR_TAG.replace(line, "");
    let message = TIMESTAMP_HEADER.replace(&message, "");
    let message = LEVEL_KEYWORD.replace(&message, "");
    message.trim().to_string()
}

/// First quoted `*.md` path in a message, single quotes preferred.
pub fn md_file_path(message: &str) -> Option<String> {
    MD_SINGLE_QUOTED
        .captures(message)
        .or_else(|| MD_DOUBLE_QUOTED.captures(message))
        .map(|caps| caps[1].to_string())
}

/// System-level failure of `mkdocs serve` (port in use, permissions, ...).
pub fn is_server_error(line: &str) -> bool {
    let stripped = line.trim();
    SERVER_ERROR_PREFIX.is_match(stripped)
        || line.contains("Address already in use")
        || (line.contains("Permission denied") && line.contains("OSError"))
}

/// Final line of a Python traceback, e.g. `ValueError: bad value`.
pub fn is_exception_line(stripped: &str) -> bool {
    EXCEPTION_LINE.is_match(stripped)
}

/// Shorten a raw line for the one-line activity display.
pub fn truncate_line(line: &str, max_len: usize) -> String {
    let line = line.trim();
    let line = STDERR_TAG.replace(line, "");
    let line = LOGGER_HEADER.replace(&line, "");
    let line = LOGGER_NAME_LEVEL.replace(&line, "");
    if line.chars().count() > max_len {
        let head: String = line.chars().take(max_len).collect();
        format!("{}...", head)
    } else {
        line.into_owned()
    }
}

/// Remove the indentation shared by all non-blank lines.
pub fn dedent_code(code: &str) -> String {
    let min_indent = code
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min();

    match min_indent {
        Some(indent) if indent > 0 => code
            .split('\n')
            .map(|line| match line.get(indent..) {
                Some(rest) if !rest.is_empty() => rest,
                _ => line.trim_start(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_server_url_and_timing() {
        assert_eq!(
            server_url("INFO    -  [12:00:01] Serving on http://127.0.0.1:8000/docs/"),
            Some("http://127.0.0.1:8000/docs/".to_string())
        );
        assert_eq!(
            build_time("INFO    -  Documentation built in 12.34 seconds"),
            Some("12.34".to_string())
        );
        assert_eq!(
            build_dir("INFO    -  Building documentation to directory: /tmp/site  "),
            Some("/tmp/site".to_string())
        );
        assert_eq!(server_url("INFO - nothing here"), None);
    }

    #[test]
    fn cleans_log_prefixes() {
        assert_eq!(clean_message("WARNING -  Something odd"), "Something odd");
        assert_eq!(
            clean_message("[stderr] 2024-01-15 10:30:00,123 - mkdocs - ERROR - Boom"),
            "mkdocs - ERROR - Boom"
        );
        assert_eq!(clean_message("ERROR   -  Something broke"), "Something broke");
    }

    #[test]
    fn finds_markdown_paths() {
        assert_eq!(
            md_file_path("Doc file 'guide/a.md' contains a link"),
            Some("guide/a.md".to_string())
        );
        assert_eq!(
            md_file_path(r#"page "b.md" is odd"#),
            Some("b.md".to_string())
        );
        assert_eq!(md_file_path("no paths"), None);
    }

    #[test]
    fn recognises_level_lines() {
        assert!(is_level_line("INFO    -  Cleaning site directory"));
        assert!(is_level_line("2024-01-15 10:30:00 WARNING something"));
        assert!(!is_level_line("    raise ValueError"));
        assert!(is_block_terminator("DEBUG   -  Reading: a.md"));
        assert!(is_block_terminator("[stderr] whatever"));
        assert!(!is_block_terminator("Traceback (most recent call last):"));
    }

    #[test]
    fn detects_server_errors() {
        assert!(is_server_error("OSError: [Errno 98] Address already in use"));
        assert!(is_server_error("  PermissionError: denied"));
        assert!(!is_server_error("ValueError: bad value"));
        assert!(is_exception_line("ValueError: bad value"));
        assert!(is_exception_line("UserWarning: careful"));
        assert!(!is_exception_line("  File \"x.py\", line 1"));
    }

    #[test]
    fn truncates_activity_lines() {
        assert_eq!(
            truncate_line("2024-01-15 10:30:00,123 - mkdocs.commands - INFO - Building", 60),
            "Building"
        );
        let long = "x".repeat(80);
        assert_eq!(truncate_line(&long, 10), format!("{}...", "x".repeat(10)));
    }

    #[test]
    fn dedents_shared_indentation() {
        let code = "    def f():\n        return 1\n\n    f()";
        assert_eq!(dedent_code(code), "def f():\n    return 1\n\nf()");
        assert_eq!(dedent_code("flat"), "flat");
    }
}
