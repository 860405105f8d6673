//! State served to MCP clients.
//!
//! [`IssueStore`] owns the issues, notices, build metadata and raw output
//! that the query tools report on. Where that state comes from depends on
//! the [`ServerMode`]:
//!
//! | Mode      | Source                                                |
//! |-----------|-------------------------------------------------------|
//! | `Pipe`    | build output read from stdin once at startup          |
//! | `Watch`   | the snapshot published by a `--share-state` filter    |
//! | `Project` | `mkdocs build --clean` run on demand in the project   |
//!
//! All JSON payloads returned here are the exact tool responses.

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::info::{group_info_messages, parse_info_messages};
use crate::models::{BuildInfo, InfoCategory, InfoMessage, Issue, Level};
use crate::parse::{extract_build_info, parse_mkdocs_output};
use crate::processor::{IssueDedup, NoticeDedup};
use crate::state::{find_project_root, read_state_file};

/// Where the served state comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMode {
    Pipe,
    Watch { state_path: PathBuf },
    Project,
}

/// `filter` argument of `get_issues`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueFilter {
    All,
    Errors,
    Warnings,
}

impl IssueFilter {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "all" => Ok(IssueFilter::All),
            "errors" => Ok(IssueFilter::Errors),
            "warnings" => Ok(IssueFilter::Warnings),
            other => bail!("Unknown filter: {} (expected all, errors or warnings)", other),
        }
    }

    fn accepts(&self, issue: &Issue) -> bool {
        match self {
            IssueFilter::All => true,
            IssueFilter::Errors => issue.level == Level::Error,
            IssueFilter::Warnings => issue.level == Level::Warning,
        }
    }
}

/// Stable short identifier for an issue.
///
/// `issue-` followed by the hex of the first four bytes of the SHA-256 of
/// `LEVEL:source:message[:file]`.
pub fn issue_id(issue: &Issue) -> String {
    let mut content = format!("{}:{}:{}", issue.level, issue.source, issue.message);
    if let Some(file) = &issue.file {
        content.push(':');
        content.push_str(file);
    }
    let digest = Sha256::digest(content.as_bytes());
    format!("issue-{}", hex::encode(&digest[..4]))
}

fn issue_json(issue: &Issue, verbose: bool) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), json!(issue_id(issue)));
    obj.insert("level".into(), json!(issue.level));
    obj.insert("source".into(), json!(issue.source));
    obj.insert("message".into(), json!(issue.message));
    if let Some(file) = &issue.file {
        obj.insert("file".into(), json!(file));
    }
    if verbose {
        if let Some(code) = &issue.code {
            obj.insert("code".into(), json!(code));
        }
        if let Some(output) = &issue.output {
            obj.insert("traceback".into(), json!(output));
        }
    }
    Value::Object(obj)
}

fn count_levels<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> (usize, usize) {
    issues.into_iter().fold((0, 0), |(e, w), issue| match issue.level {
        Level::Error => (e + 1, w),
        Level::Warning => (e, w + 1),
    })
}

/// Served state plus the bookkeeping needed to keep it fresh.
#[derive(Debug)]
pub struct IssueStore {
    mode: ServerMode,
    project_dir: Option<PathBuf>,
    issues: Vec<Issue>,
    info_messages: Vec<InfoMessage>,
    build_info: BuildInfo,
    raw_output: Vec<String>,
    last_state_timestamp: f64,
}

impl IssueStore {
    pub fn new(mode: ServerMode, project_dir: Option<PathBuf>) -> Self {
        Self {
            mode,
            project_dir,
            issues: Vec::new(),
            info_messages: Vec::new(),
            build_info: BuildInfo::default(),
            raw_output: Vec::new(),
            last_state_timestamp: 0.0,
        }
    }

    pub fn mode(&self) -> &ServerMode {
        &self.mode
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Pull in a newer snapshot. Only watch mode has one.
    ///
    /// Returns `true` when the state changed.
    pub fn refresh(&mut self) -> bool {
        let ServerMode::Watch { state_path } = &self.mode else {
            return false;
        };
        let Some(state) = read_state_file(state_path) else {
            return false;
        };
        if state.timestamp <= self.last_state_timestamp {
            return false;
        }

        tracing::debug!(timestamp = state.timestamp, "refreshed from state file");
        self.last_state_timestamp = state.timestamp;
        self.issues = state.issues;
        self.info_messages = state.info_messages;
        self.build_info = state.build_info;
        self.raw_output = state.raw_output;
        true
    }

    /// Replace the state with a parse of complete build output.
    pub fn load_output(&mut self, lines: Vec<String>) {
        let mut dedup = IssueDedup::new(false);
        self.issues = parse_mkdocs_output(&lines)
            .into_iter()
            .filter(|issue| dedup.admit(issue))
            .collect();

        let mut notice_dedup = NoticeDedup::default();
        self.info_messages = parse_info_messages(&lines)
            .into_iter()
            .filter(|m| notice_dedup.admit(m))
            .collect();

        self.build_info = extract_build_info(&lines);
        self.raw_output = lines;
    }

    pub fn get_issues(&self, filter: IssueFilter, verbose: bool) -> Value {
        let selected: Vec<&Issue> = self.issues.iter().filter(|i| filter.accepts(i)).collect();
        let (errors, warnings) = count_levels(selected.iter().copied());
        json!({
            "total": selected.len(),
            "errors": errors,
            "warnings": warnings,
            "issues": selected.iter().map(|i| issue_json(i, verbose)).collect::<Vec<_>>(),
        })
    }

    pub fn get_issue_details(&self, id: &str) -> Option<Value> {
        self.issues
            .iter()
            .find(|issue| issue_id(issue) == id)
            .map(|issue| issue_json(issue, true))
    }

    /// Build metadata; watch mode adds a `diagnostics` object.
    pub fn get_build_info(&self, refreshed: bool, cwd: &Path) -> Value {
        let mut info = serde_json::to_value(&self.build_info).unwrap_or_else(|_| json!({}));

        if let ServerMode::Watch { state_path } = &self.mode {
            let found = refreshed || self.last_state_timestamp > 0.0;
            let home = dirs::home_dir();
            let project_root = find_project_root(cwd, home.as_deref());

            let mut diag = json!({
                "watch_mode": true,
                "state_file_found": found,
                "project_root": project_root.map(|p| p.display().to_string()),
                "state_file_path": state_path.display().to_string(),
                "cwd": cwd.display().to_string(),
            });
            if !found {
                diag["hint"] = json!(
                    "No state file found. Make sure mkdocs-output-filter is running with \
                     --share-state in a directory containing mkdocs.yml"
                );
            }
            info["diagnostics"] = diag;
        }

        info
    }

    /// The last `last_n` raw lines; zero or negative means all of them.
    pub fn get_raw_output(&self, last_n: i64) -> String {
        let lines = match usize::try_from(last_n) {
            Ok(n) if n > 0 => &self.raw_output[self.raw_output.len().saturating_sub(n)..],
            _ => &self.raw_output[..],
        };
        lines.join("\n")
    }

    pub fn get_info(&self, category: Option<InfoCategory>, grouped: bool) -> Value {
        let messages: Vec<InfoMessage> = self
            .info_messages
            .iter()
            .filter(|m| category.map_or(true, |c| m.category == c))
            .cloned()
            .collect();

        if messages.is_empty() {
            return json!({ "info_messages": [], "count": 0 });
        }

        let entry = |m: &InfoMessage| {
            json!({
                "file": m.file,
                "target": m.target,
                "suggestion": m.suggestion,
            })
        };

        if grouped {
            let mut groups = Map::new();
            for (cat, msgs) in group_info_messages(&messages) {
                groups.insert(
                    cat.as_str().to_string(),
                    Value::Array(msgs.iter().map(entry).collect()),
                );
            }
            json!({ "info_messages": groups, "count": messages.len() })
        } else {
            let flat: Vec<Value> = messages
                .iter()
                .map(|m| {
                    let mut v = entry(m);
                    v["category"] = json!(m.category.as_str());
                    v
                })
                .collect();
            json!({ "info_messages": flat, "count": messages.len() })
        }
    }

    /// Rebuild according to the mode.
    ///
    /// `Ok(None)` in watch mode means no newer snapshot was available.
    pub async fn rebuild(&mut self, verbose: bool) -> Result<Option<Value>> {
        match self.mode {
            ServerMode::Pipe => {
                bail!("Cannot rebuild in pipe mode. Run mkdocs manually and pipe output.")
            }
            ServerMode::Watch { .. } => {
                if self.refresh() {
                    Ok(Some(self.get_issues(IssueFilter::All, verbose)))
                } else {
                    Ok(None)
                }
            }
            ServerMode::Project => {
                let dir = self
                    .project_dir
                    .clone()
                    .context("No project directory configured")?;
                let (lines, return_code) = run_mkdocs_build(&dir, verbose).await?;
                self.load_output(lines);

                let (errors, warnings) = count_levels(&self.issues);
                Ok(Some(json!({
                    "success": return_code == 0 || (return_code == 1 && errors == 0),
                    "return_code": return_code,
                    "total_issues": self.issues.len(),
                    "errors": errors,
                    "warnings": warnings,
                    "build_time": self.build_info.build_time,
                    "issues": self.issues.iter().map(|i| issue_json(i, false)).collect::<Vec<_>>(),
                })))
            }
        }
    }
}

/// Run `mkdocs build --clean` in `dir`; stdout lines come before stderr lines.
pub async fn run_mkdocs_build(dir: &Path, verbose: bool) -> Result<(Vec<String>, i32)> {
    let mut cmd = tokio::process::Command::new("mkdocs");
    cmd.args(["build", "--clean"]).current_dir(dir);
    if verbose {
        cmd.arg("--verbose");
    }

    tracing::info!(dir = %dir.display(), verbose, "running mkdocs build");
    let output = cmd
        .output()
        .await
        .with_context(|| format!("Failed to run mkdocs in {}", dir.display()))?;

    let lines = String::from_utf8_lossy(&output.stdout)
        .lines()
        .chain(String::from_utf8_lossy(&output.stderr).lines())
        .map(str::to_string)
        .collect();
    Ok((lines, output.status.code().unwrap_or(-1)))
}
