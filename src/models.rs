//! Core data models used throughout the filter.
//!
//! These types represent the diagnostics, informational notices, and build
//! metadata that flow from the line classifier to the renderers, the state
//! file, and the MCP tools.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic. Errors and warnings are counted separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Error,
    Warning,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A warning or error extracted from MkDocs output.
///
/// `source` names the subsystem that raised it: `"mkdocs"` for plain log
/// lines, `"markdown_exec"` for failed code block executions. Optional
/// fields are omitted from JSON when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub level: Level,
    pub source: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Issue {
    /// A plain single-line issue with no embedded code or output.
    pub fn new(level: Level, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            source: source.into(),
            message: message.into(),
            file: None,
            code: None,
            output: None,
        }
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

/// Category of a non-actionable build notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoCategory {
    BrokenLink,
    AbsoluteLink,
    UnrecognizedLink,
    MissingNav,
    NoGitLogs,
}

impl InfoCategory {
    pub const ALL: [InfoCategory; 5] = [
        InfoCategory::BrokenLink,
        InfoCategory::AbsoluteLink,
        InfoCategory::UnrecognizedLink,
        InfoCategory::MissingNav,
        InfoCategory::NoGitLogs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InfoCategory::BrokenLink => "broken_link",
            InfoCategory::AbsoluteLink => "absolute_link",
            InfoCategory::UnrecognizedLink => "unrecognized_link",
            InfoCategory::MissingNav => "missing_nav",
            InfoCategory::NoGitLogs => "no_git_logs",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Whether notices in this category point at a link target.
    pub fn is_link(&self) -> bool {
        matches!(
            self,
            InfoCategory::BrokenLink | InfoCategory::AbsoluteLink | InfoCategory::UnrecognizedLink
        )
    }
}

impl fmt::Display for InfoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An INFO-level notice such as a broken link or a page missing from nav.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoMessage {
    pub category: InfoCategory,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl InfoMessage {
    pub fn new(category: InfoCategory, file: impl Into<String>) -> Self {
        Self {
            category,
            file: file.into(),
            target: None,
            suggestion: None,
        }
    }
}

/// Server URL, output directory and build duration seen in the output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_time: Option<String>,
}

impl BuildInfo {
    /// Merge a fresh extraction: known values are replaced, never cleared.
    pub fn merge(&mut self, fresh: BuildInfo) {
        if fresh.server_url.is_some() {
            self.server_url = fresh.server_url;
        }
        if fresh.build_dir.is_some() {
            self.build_dir = fresh.build_dir;
        }
        if fresh.build_time.is_some() {
            self.build_time = fresh.build_time;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.server_url.is_none() && self.build_dir.is_none() && self.build_time.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_known_values() {
        let mut info = BuildInfo {
            server_url: Some("http://127.0.0.1:8000/".into()),
            build_dir: None,
            build_time: Some("1.0".into()),
        };
        info.merge(BuildInfo {
            server_url: None,
            build_dir: Some("site".into()),
            build_time: Some("2.5".into()),
        });
        assert_eq!(info.server_url.as_deref(), Some("http://127.0.0.1:8000/"));
        assert_eq!(info.build_dir.as_deref(), Some("site"));
        assert_eq!(info.build_time.as_deref(), Some("2.5"));

        info.merge(BuildInfo::default());
        assert_eq!(info.build_time.as_deref(), Some("2.5"));
    }

    #[test]
    fn issue_json_omits_missing_fields() {
        let issue = Issue::new(Level::Warning, "mkdocs", "something odd");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["level"], "WARNING");
        assert!(json.get("file").is_none());
        assert!(json.get("code").is_none());
        assert!(json.get("output").is_none());
    }

    #[test]
    fn category_round_trips_through_str() {
        for cat in InfoCategory::ALL {
            assert_eq!(InfoCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(InfoCategory::parse("nope"), None);
    }
}
