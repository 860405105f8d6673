//! Filter-mode dispatch shared by the CLI.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::batch::run_batch;
use crate::config::Config;
use crate::input::lossy_lines;
use crate::interactive::run_interactive;
use crate::processor::ProcessorOptions;
use crate::progress::ProgressMode;
use crate::render::Renderer;
use crate::stream::run_streaming;

/// How input is consumed and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Copy input to stdout untouched.
    Raw,
    Batch,
    Streaming,
    Interactive,
}

/// Config file merged with command-line flags.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub verbose: bool,
    pub errors_only: bool,
    pub color: bool,
    pub progress: ProgressMode,
    pub share_state: bool,
    pub state_dir: Option<PathBuf>,
    pub config: Config,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            errors_only: false,
            color: false,
            progress: ProgressMode::Off,
            share_state: false,
            state_dir: None,
            config: Config::default(),
        }
    }
}

impl FilterOptions {
    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            errors_only: self.errors_only,
            ..self.config.processor_options()
        }
    }

    pub fn renderer<W: Write>(&self, out: W) -> Renderer<W> {
        Renderer::new(out, self.color, self.verbose, self.config.display.clone())
    }
}

/// Copy every input line to `out`.
pub fn passthrough<R: BufRead, W: Write>(input: R, mut out: W) -> Result<i32> {
    for line in lossy_lines(input) {
        writeln!(out, "{}", line?)?;
    }
    out.flush()?;
    Ok(0)
}

fn run_blocking(mode: Mode, opts: &FilterOptions) -> Result<i32> {
    let stdin = std::io::stdin().lock();
    let mut renderer = opts.renderer(std::io::stdout());
    let mut activity = opts.progress.reporter();
    match mode {
        Mode::Raw => passthrough(stdin, std::io::stdout().lock()),
        Mode::Batch => run_batch(stdin, &mut renderer, activity.as_mut(), opts),
        Mode::Streaming | Mode::Interactive => {
            run_streaming(stdin, &mut renderer, activity.as_mut(), opts)
        }
    }
}

/// Run the filter in `mode` on stdin. Returns the process exit code.
pub async fn run_filter(mode: Mode, opts: FilterOptions) -> Result<i32> {
    tracing::debug!(?mode, "starting filter");
    if mode == Mode::Interactive {
        return run_interactive(opts).await;
    }
    tokio::task::spawn_blocking(move || run_blocking(mode, &opts))
        .await
        .context("filter task panicked")?
}

/// Fallback used by the interactive driver when there is no terminal.
pub(crate) async fn run_streaming_blocking(opts: FilterOptions) -> Result<i32> {
    tokio::task::spawn_blocking(move || run_blocking(Mode::Streaming, &opts))
        .await
        .context("filter task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_copies_lines() {
        let mut out = Vec::new();
        let code = passthrough(&b"INFO    -  a\r\nplain\n"[..], &mut out).unwrap();
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "INFO    -  a\nplain\n");
    }

    #[test]
    fn cli_errors_only_overrides_config() {
        let opts = FilterOptions {
            errors_only: true,
            ..FilterOptions::default()
        };
        let processor = opts.processor_options();
        assert!(processor.errors_only);
        assert_eq!(processor.raw_lines, 500);
    }
}
