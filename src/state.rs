//! Shared state snapshot.
//!
//! A filter running with `--share-state` publishes what it has seen to
//! `<root>/.mkdocs-output-filter/state.json` so that an MCP server running in
//! watch mode can answer questions about the live `mkdocs serve` session.
//!
//! Writes are atomic: the snapshot is serialized to a sibling temp file and
//! renamed over the canonical path, so readers only ever observe complete
//! documents. Reads are forgiving: a missing or malformed file is simply "no
//! snapshot", never an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::{BuildInfo, InfoMessage, Issue};

pub const STATE_DIR_NAME: &str = ".mkdocs-output-filter";
pub const STATE_FILE_NAME: &str = "state.json";

/// Raw output lines kept in a serialized snapshot.
pub const RAW_OUTPUT_LIMIT: usize = 500;

/// Everything one filter process shares with the query server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFileData {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub info_messages: Vec<InfoMessage>,
    #[serde(default)]
    pub build_info: BuildInfo,
    #[serde(default, serialize_with = "serialize_tail")]
    pub raw_output: Vec<String>,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub project_dir: Option<String>,
}

fn serialize_tail<S: Serializer>(lines: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    let start = lines.len().saturating_sub(RAW_OUTPUT_LIMIT);
    lines[start..].serialize(serializer)
}

/// Current wall-clock time as float seconds since the epoch.
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Nearest ancestor of `start` holding `mkdocs.yml`.
///
/// The home directory is checked but never passed.
pub fn find_project_root(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if dir.join("mkdocs.yml").is_file() {
            return Some(dir.to_path_buf());
        }
        if home.is_some_and(|h| h == dir) {
            break;
        }
    }
    None
}

/// Nearest ancestor of `start` holding a `.git` entry.
pub fn find_vcs_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Pick the directory the snapshot lives under.
///
/// Explicit directory, then MkDocs project, then repository root, then `cwd`.
pub fn resolve_state_root(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    let home = dirs::home_dir();
    find_project_root(cwd, home.as_deref())
        .or_else(|| find_vcs_root(cwd))
        .unwrap_or_else(|| cwd.to_path_buf())
}

pub fn get_state_file_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR_NAME).join(STATE_FILE_NAME)
}

/// Locate the snapshot for this process, resolving against the working directory.
pub fn locate_state_file(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(get_state_file_path(&resolve_state_root(explicit, &cwd)))
}

/// Atomically replace the snapshot at `path`.
pub fn write_state_file(state: &StateFileData, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
    let temp_path = path.with_extension("tmp");

    let written = write_synced(&temp_path, json.as_bytes()).and_then(|_| {
        fs::rename(&temp_path, path).with_context(|| {
            format!(
                "Failed to rename {} -> {}",
                temp_path.display(),
                path.display()
            )
        })
    });
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", path.display()))?;
    Ok(())
}

/// Read the snapshot at `path`; `None` when missing or unreadable.
pub fn read_state_file(path: &Path) -> Option<StateFileData> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring malformed state file");
            None
        }
    }
}

/// Publishes snapshots for one filter process.
///
/// Timestamps are strictly increasing per writer even when the clock is
/// coarse or steps backwards, so readers can tell every write apart.
#[derive(Debug)]
pub struct StateWriter {
    path: PathBuf,
    project_dir: Option<String>,
    last_timestamp: f64,
}

impl StateWriter {
    pub fn new(path: PathBuf, project_dir: Option<PathBuf>) -> Self {
        Self {
            path,
            project_dir: project_dir.map(|p| p.display().to_string()),
            last_timestamp: 0.0,
        }
    }

    /// Writer for the snapshot location resolved from the working directory.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let root = resolve_state_root(explicit, &cwd);
        let home = dirs::home_dir();
        let project_dir = explicit
            .map(Path::to_path_buf)
            .or_else(|| find_project_root(&cwd, home.as_deref()));
        Ok(Self::new(get_state_file_path(&root), project_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_timestamp(&mut self) -> f64 {
        let now = now_timestamp();
        let ts = if now > self.last_timestamp {
            now
        } else {
            self.last_timestamp + 1e-6
        };
        self.last_timestamp = ts;
        ts
    }

    pub fn write<'a>(
        &mut self,
        issues: &[Issue],
        info_messages: &[InfoMessage],
        build_info: &BuildInfo,
        raw_output: impl IntoIterator<Item = &'a String>,
    ) -> Result<()> {
        let state = StateFileData {
            issues: issues.to_vec(),
            info_messages: info_messages.to_vec(),
            build_info: build_info.clone(),
            raw_output: raw_output.into_iter().cloned().collect(),
            timestamp: self.next_timestamp(),
            project_dir: self.project_dir.clone(),
        };
        write_state_file(&state, &self.path)?;
        tracing::info!(
            path = %self.path.display(),
            issues = state.issues.len(),
            "state snapshot written"
        );
        Ok(())
    }
}
