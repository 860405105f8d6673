use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::processor::ProcessorOptions;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub interactive: InteractiveConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub errors_only: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BufferConfig {
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default = "default_raw_lines")]
    pub raw_lines: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            raw_lines: default_raw_lines(),
        }
    }
}

fn default_context_lines() -> usize {
    200
}
fn default_raw_lines() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StateConfig {
    #[serde(default)]
    pub share: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_max_files_shown")]
    pub max_files_shown: usize,
    #[serde(default = "default_max_targets_shown")]
    pub max_targets_shown: usize,
    #[serde(default = "default_code_tail_lines")]
    pub code_tail_lines: usize,
    #[serde(default = "default_traceback_tail_lines")]
    pub traceback_tail_lines: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_files_shown: default_max_files_shown(),
            max_targets_shown: default_max_targets_shown(),
            code_tail_lines: default_code_tail_lines(),
            traceback_tail_lines: default_traceback_tail_lines(),
        }
    }
}

fn default_max_files_shown() -> usize {
    3
}
fn default_max_targets_shown() -> usize {
    5
}
fn default_code_tail_lines() -> usize {
    10
}
fn default_traceback_tail_lines() -> usize {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct InteractiveConfig {
    #[serde(default = "default_history_lines")]
    pub history_lines: usize,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            history_lines: default_history_lines(),
        }
    }
}

fn default_history_lines() -> usize {
    10_000
}

impl Config {
    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            errors_only: self.filter.errors_only,
            context_lines: self.buffer.context_lines,
            raw_lines: self.buffer.raw_lines,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.buffer.context_lines == 0 {
        anyhow::bail!("buffer.context_lines must be > 0");
    }
    if config.buffer.raw_lines == 0 {
        anyhow::bail!("buffer.raw_lines must be > 0");
    }
    if config.interactive.history_lines == 0 {
        anyhow::bail!("interactive.history_lines must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("filter.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn empty_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&write(&tmp, "")).unwrap();
        assert_eq!(config.buffer.context_lines, 200);
        assert_eq!(config.buffer.raw_lines, 500);
        assert_eq!(config.display.code_tail_lines, 10);
        assert_eq!(config.interactive.history_lines, 10_000);
        assert!(!config.state.share);
    }

    #[test]
    fn sections_override_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&write(
            &tmp,
            "[filter]\nerrors_only = true\n\n[buffer]\ncontext_lines = 50\n\n[state]\nshare = true\ndir = \"/srv/docs\"\n",
        ))
        .unwrap();
        let opts = config.processor_options();
        assert!(opts.errors_only);
        assert_eq!(opts.context_lines, 50);
        assert_eq!(opts.raw_lines, 500);
        assert_eq!(config.state.dir, Some(PathBuf::from("/srv/docs")));
    }

    #[test]
    fn zero_buffers_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(&write(&tmp, "[buffer]\nraw_lines = 0\n")).unwrap_err();
        assert!(err.to_string().contains("buffer.raw_lines"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
