//! MCP server over stdio.
//!
//! Started by `mkdocs-output-filter mcp`. The server runs in exactly one of
//! three modes, chosen by flags:
//!
//! | Flags                        | Mode    |
//! |------------------------------|---------|
//! | `--watch [--project-dir D]`  | Watch   |
//! | `--project-dir D`            | Project |
//! | `--pipe`                     | Pipe    |
//!
//! # Client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "mkdocs-output-filter": {
//!       "command": "mkdocs-output-filter",
//!       "args": ["mcp", "--watch"]
//!     }
//!   }
//! }
//! ```
//!
//! Watch mode pairs with `mkdocs serve 2>&1 | mkdocs-output-filter --share-state`
//! running in the project.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::input::read_all_lines;
use crate::mcp::McpBridge;
use crate::query::{run_mkdocs_build, IssueStore, ServerMode};
use crate::state::locate_state_file;
use crate::traits::{ToolContext, ToolRegistry};

/// Flags of the `mcp` subcommand.
#[derive(Debug, Clone, Default)]
pub struct McpOptions {
    pub project_dir: Option<PathBuf>,
    pub watch: bool,
    pub pipe: bool,
    pub initial_build: bool,
    /// Snapshot directory used by watch mode when no project is given.
    pub state_dir: Option<PathBuf>,
}

impl McpOptions {
    /// Check the flag combination and the project directory.
    pub fn validate(&self) -> Result<()> {
        let project_only = self.project_dir.is_some() && !self.watch;
        let modes = [project_only, self.pipe, self.watch]
            .iter()
            .filter(|m| **m)
            .count();

        if modes == 0 {
            bail!("Specify one of --watch, --project-dir, or --pipe");
        }
        if modes > 1 {
            bail!("Cannot combine --pipe with other modes");
        }

        if let Some(dir) = &self.project_dir {
            if !dir.exists() {
                bail!("Project directory does not exist: {}", dir.display());
            }
            if !dir.join("mkdocs.yml").exists() {
                bail!("No mkdocs.yml found in {}", dir.display());
            }
        }
        Ok(())
    }

    fn mode(&self) -> Result<ServerMode> {
        if self.pipe {
            return Ok(ServerMode::Pipe);
        }
        if self.watch {
            let explicit = self.project_dir.as_deref().or(self.state_dir.as_deref());
            return Ok(ServerMode::Watch {
                state_path: locate_state_file(explicit)?,
            });
        }
        Ok(ServerMode::Project)
    }
}

/// Build the store and load whatever the mode provides up front.
pub async fn prepare_store(opts: &McpOptions) -> Result<IssueStore> {
    opts.validate()?;
    let mode = opts.mode()?;
    let mut store = IssueStore::new(mode.clone(), opts.project_dir.clone());

    match mode {
        ServerMode::Pipe => {
            let lines = tokio::task::spawn_blocking(|| read_all_lines(std::io::stdin().lock()))
                .await
                .context("stdin reader panicked")??;
            tracing::info!(lines = lines.len(), "loaded piped build output");
            store.load_output(lines);
        }
        ServerMode::Watch { state_path } => {
            if !store.refresh() {
                tracing::info!(path = %state_path.display(), "no state file yet");
            }
        }
        ServerMode::Project => {
            if let Some(dir) = opts.project_dir.as_deref().filter(|_| opts.initial_build) {
                initial_build(&mut store, dir).await;
            }
        }
    }

    Ok(store)
}

async fn initial_build(store: &mut IssueStore, dir: &Path) {
    match run_mkdocs_build(dir, false).await {
        Ok((lines, _)) => store.load_output(lines),
        Err(e) => tracing::warn!(error = %e, "initial build failed"),
    }
}

/// Run the MCP server on stdin/stdout until the client disconnects.
pub async fn run_mcp_server(opts: McpOptions) -> Result<()> {
    let store = prepare_store(&opts).await?;
    let ctx = ToolContext::new(Arc::new(Mutex::new(store)));
    let bridge = McpBridge::new(Arc::new(ToolRegistry::with_builtins()), ctx);

    tracing::info!("MCP server listening on stdio");
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(bridge, transport)
        .await
        .context("Failed to start MCP server")?;
    service.waiting().await.context("MCP server terminated")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("mkdocs.yml"), "site_name: test\n").unwrap();
        tmp
    }

    #[test]
    fn needs_a_mode() {
        let err = McpOptions::default().validate().unwrap_err();
        assert!(err.to_string().contains("Specify one of"));
    }

    #[test]
    fn pipe_does_not_combine() {
        let opts = McpOptions {
            pipe: true,
            watch: true,
            ..McpOptions::default()
        };
        assert!(opts.validate().unwrap_err().to_string().contains("Cannot combine"));
    }

    #[test]
    fn watch_with_project_dir_is_allowed() {
        let tmp = project();
        let opts = McpOptions {
            watch: true,
            project_dir: Some(tmp.path().to_path_buf()),
            ..McpOptions::default()
        };
        opts.validate().unwrap();
        assert_eq!(
            opts.mode().unwrap(),
            ServerMode::Watch {
                state_path: tmp
                    .path()
                    .join(".mkdocs-output-filter")
                    .join("state.json")
            }
        );
    }

    #[test]
    fn project_dir_must_hold_mkdocs_yml() {
        let tmp = TempDir::new().unwrap();
        let opts = McpOptions {
            project_dir: Some(tmp.path().to_path_buf()),
            ..McpOptions::default()
        };
        assert!(opts.validate().unwrap_err().to_string().contains("No mkdocs.yml"));

        let missing = McpOptions {
            project_dir: Some(tmp.path().join("nope")),
            ..McpOptions::default()
        };
        assert!(missing.validate().unwrap_err().to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn project_mode_without_initial_build_starts_empty() {
        let tmp = project();
        let opts = McpOptions {
            project_dir: Some(tmp.path().to_path_buf()),
            ..McpOptions::default()
        };
        let store = prepare_store(&opts).await.unwrap();
        assert_eq!(store.mode(), &ServerMode::Project);
        assert!(store.issues().is_empty());
    }
}
