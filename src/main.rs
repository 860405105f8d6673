//! # mkdocs-output-filter CLI
//!
//! Reads MkDocs console output on stdin and prints only what needs
//! attention: warnings, errors, failed code blocks and grouped notices.
//!
//! ## Usage
//!
//! ```bash
//! mkdocs build --verbose 2>&1 | mkdocs-output-filter
//! mkdocs build --verbose 2>&1 | mkdocs-output-filter -v
//! mkdocs serve 2>&1 | mkdocs-output-filter --share-state
//! mkdocs build 2>&1 | mkdocs-output-filter --errors-only
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | *(none)* | Filter stdin (streaming by default) |
//! | `mcp --watch` | Serve the shared state of a running filter over MCP |
//! | `mcp --project-dir D` | Serve issues of on-demand builds of project `D` |
//! | `mcp --pipe` | Serve issues of build output piped on stdin |
//!
//! Exit codes: `0` clean, `1` errors reported, `130` interrupted.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mkdocs_filter::config::{self, Config};
use mkdocs_filter::logging::init_tracing;
use mkdocs_filter::progress::ProgressMode;
use mkdocs_filter::run::{run_filter, FilterOptions, Mode};
use mkdocs_filter::server::{run_mcp_server, McpOptions};

/// Filter MkDocs output down to warnings and errors.
///
/// Use `--verbose` with mkdocs to get file paths for code block errors.
#[derive(Parser)]
#[command(
    name = "mkdocs-output-filter",
    about = "Filter mkdocs output to show only warnings and errors",
    version
)]
struct Cli {
    /// Show full code blocks and tracebacks for markdown_exec issues.
    #[arg(short, long)]
    verbose: bool,

    /// Show only errors, not warnings.
    #[arg(short, long)]
    errors_only: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Disable the activity line on stderr.
    #[arg(long)]
    no_progress: bool,

    /// Pass through raw mkdocs output without filtering.
    #[arg(long)]
    raw: bool,

    /// Process output incrementally (the default; suited to `mkdocs serve`).
    #[arg(long, conflicts_with = "batch")]
    streaming: bool,

    /// Wait for all input before processing.
    #[arg(long)]
    batch: bool,

    /// Toggle between filtered and raw output with r / f, quit with q.
    #[arg(short, long)]
    interactive: bool,

    /// Write state to .mkdocs-output-filter/state.json for the MCP server.
    #[arg(long)]
    share_state: bool,

    /// Directory for the state file (default: mkdocs.yml location, git root, or cwd).
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as an MCP server on stdio for code agents.
    ///
    /// Exactly one of `--watch`, `--project-dir` or `--pipe` selects the
    /// mode; `--watch` may be combined with `--project-dir`.
    Mcp {
        /// MkDocs project directory (must contain mkdocs.yml).
        #[arg(long)]
        project_dir: Option<PathBuf>,

        /// Read state written by a filter running with --share-state.
        #[arg(long)]
        watch: bool,

        /// Read mkdocs output from stdin once at startup.
        #[arg(long)]
        pipe: bool,

        /// Run `mkdocs build` once before serving (project mode).
        #[arg(long)]
        initial_build: bool,
    },
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.raw {
            Mode::Raw
        } else if self.interactive {
            Mode::Interactive
        } else if self.batch && !self.streaming {
            Mode::Batch
        } else {
            Mode::Streaming
        }
    }

    fn filter_options(&self, config: Config) -> FilterOptions {
        let progress = if self.no_progress || self.no_color {
            ProgressMode::Off
        } else {
            ProgressMode::default_for_tty()
        };
        FilterOptions {
            verbose: self.verbose || config.filter.verbose,
            errors_only: self.errors_only || config.filter.errors_only,
            color: !self.no_color && atty::is(atty::Stream::Stdout),
            progress,
            share_state: self.share_state || config.state.share,
            state_dir: self.state_dir.clone().or_else(|| config.state.dir.clone()),
            config,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing(tracing::Level::WARN);
    let mut cli = Cli::parse();

    if let Some(Commands::Mcp {
        project_dir,
        watch,
        pipe,
        initial_build,
    }) = cli.command.take()
    {
        let opts = McpOptions {
            project_dir,
            watch,
            pipe,
            initial_build,
            state_dir: cli.state_dir.clone(),
        };
        if let Err(e) = run_mcp_server(opts).await {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match cli.config.as_deref() {
        Some(path) => match config::load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(2);
            }
        },
        None => Config::default(),
    };

    let mode = cli.mode();
    let opts = cli.filter_options(config);

    let code = tokio::select! {
        result = run_filter(mode, opts) => match result {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n\nInterrupted.");
            130
        }
    };
    std::process::exit(code);
}
