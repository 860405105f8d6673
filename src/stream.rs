//! Streaming mode: report each build cycle as soon as it completes.
//!
//! Issues are queued while a build runs and printed together with the build
//! time and grouped notices on the first `BuildComplete` or `ServerStarted`
//! of the cycle. This is the mode for `mkdocs serve`, where input never ends
//! on its own.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::boundary::ChunkBoundary;
use crate::info::group_info_messages;
use crate::input::lossy_lines;
use crate::models::Issue;
use crate::processor::{ProcessorObserver, StreamingProcessor};
use crate::progress::ActivityReporter;
use crate::render::Renderer;
use crate::run::FilterOptions;
use crate::state::StateWriter;

/// Queues issues until the driver is ready to print them.
#[derive(Debug, Default)]
pub struct Pending {
    issues: Vec<Issue>,
    printed: usize,
}

impl ProcessorObserver for Pending {
    fn on_issue(&mut self, issue: &Issue) {
        self.issues.push(issue.clone());
    }
}

impl Pending {
    pub(crate) fn print<W: Write>(&mut self, renderer: &mut Renderer<W>) -> Result<()> {
        for issue in self.issues.drain(..) {
            if self.printed == 0 {
                renderer.raw_line("")?;
            }
            renderer.issue(&issue)?;
            self.printed += 1;
        }
        Ok(())
    }

    /// Forget queued issues; they stay available from the processor.
    pub(crate) fn discard(&mut self) {
        self.issues.clear();
    }

    pub(crate) fn reset(&mut self) {
        self.printed = 0;
    }
}

/// Print the cycle header: build time, notices, then queued issues.
fn print_cycle<W: Write>(
    processor: &mut StreamingProcessor<Pending>,
    renderer: &mut Renderer<W>,
) -> Result<()> {
    renderer.build_time(processor.build_info())?;
    let groups = group_info_messages(processor.info_messages());
    if !groups.is_empty() {
        renderer.info_groups(&groups)?;
    }
    processor.observer_mut().print(renderer)
}

pub fn run_streaming<R: BufRead, W: Write>(
    input: R,
    renderer: &mut Renderer<W>,
    activity: &mut dyn ActivityReporter,
    opts: &FilterOptions,
) -> Result<i32> {
    let mut processor = StreamingProcessor::new(Pending::default(), opts.processor_options());

    let mut shared_path = None;
    if opts.share_state {
        match StateWriter::locate(opts.state_dir.as_deref()) {
            Ok(writer) => {
                shared_path = Some(writer.path().to_path_buf());
                processor = processor.with_state_writer(writer);
            }
            Err(e) => tracing::warn!(error = %e, "cannot locate state file"),
        }
    }

    let mut cycle_shown = false;

    for line in lossy_lines(input) {
        let line = line?;
        let boundary = processor.process_line(&line);
        activity.report(&line, processor.build_info().server_url.as_deref());

        match boundary {
            b if b.ends_build() && !cycle_shown => {
                cycle_shown = true;
                activity.clear();
                print_cycle(&mut processor, renderer)?;
                if let Some(path) = &shared_path {
                    renderer.state_shared(path)?;
                }
            }
            ChunkBoundary::RebuildStarted => {
                cycle_shown = false;
                processor.observer_mut().reset();
                activity.clear();
                renderer.rebuild()?;
            }
            _ => {}
        }
    }
    activity.clear();

    processor.finalize();

    if !processor.observer().issues.is_empty() {
        print_cycle(&mut processor, renderer)?;
        renderer.server_url(processor.build_info())?;
    }

    finish(&processor, renderer)
}

/// Closing report shared with the interactive driver.
pub fn finish<O: ProcessorObserver, W: Write>(
    processor: &StreamingProcessor<O>,
    renderer: &mut Renderer<W>,
) -> Result<i32> {
    let raw = processor.raw_lines();
    if !processor.saw_mkdocs_output() && !raw.is_empty() {
        renderer.unrecognized_output(&raw)?;
        return Ok(1);
    }

    if processor.saw_server_error() {
        let lines = processor.error_lines();
        if !lines.is_empty() {
            renderer.server_error(&lines)?;
            return Ok(1);
        }
    }

    if processor.in_serve_mode() {
        renderer.server_stopped()?;
    }

    let issues = processor.issues();
    if issues.is_empty() {
        renderer.success()?;
    }
    renderer.summary(issues, processor.build_info())?;

    Ok(if issues.iter().any(|i| i.is_error()) { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;
    use crate::progress::NoActivity;
    use tempfile::TempDir;

    fn run(input: &str, opts: &FilterOptions) -> (i32, String) {
        let mut renderer = Renderer::new(Vec::new(), false, false, DisplayConfig::default());
        let code = run_streaming(input.as_bytes(), &mut renderer, &mut NoActivity, opts).unwrap();
        (code, String::from_utf8(renderer.into_inner()).unwrap())
    }

    #[test]
    fn issues_follow_build_time() {
        let input = "INFO    -  Building documentation...\n\
                     WARNING -  Something odd in 'guide.md'\n\
                     INFO    -  Documentation built in 1.25 seconds\n";
        let (code, out) = run(input, &FilterOptions::default());
        assert_eq!(code, 0);
        let built = out.find("Built in 1.25s").unwrap();
        let warning = out.find("⚠ WARNING [mkdocs] Something odd").unwrap();
        assert!(built < warning);
        assert!(out.contains("Summary: 1 warning(s)"));
    }

    #[test]
    fn rebuild_prints_separator_and_resets() {
        let input = "INFO    -  Building documentation...\n\
                     ERROR   -  First failure\n\
                     INFO    -  Documentation built in 1.00 seconds\n\
                     INFO    -  Serving on http://127.0.0.1:8000/\n\
                     INFO    -  Detected file changes\n\
                     INFO    -  Building documentation...\n\
                     INFO    -  Documentation built in 0.50 seconds\n";
        let (code, out) = run(input, &FilterOptions::default());
        assert!(out.contains("─── File change detected, rebuilding... ───"));
        assert!(out.contains("Server stopped unexpectedly."));
        assert!(out.contains("✓ No warnings or errors"));
        assert_eq!(code, 0);
    }

    #[test]
    fn leftovers_print_at_end_of_input() {
        let input = "INFO    -  Building documentation...\nERROR   -  Cut off\n";
        let (code, out) = run(input, &FilterOptions::default());
        assert_eq!(code, 1);
        assert!(out.contains("✗ ERROR [mkdocs] Cut off"));
    }

    #[test]
    fn server_crash_is_reported() {
        let input = "INFO    -  Building documentation...\n\
                     OSError: [Errno 98] Address already in use\n";
        let (code, out) = run(input, &FilterOptions::default());
        assert_eq!(code, 1);
        assert!(out.contains("Server error:"));
        assert!(out.contains("  OSError: [Errno 98] Address already in use"));
    }

    #[test]
    fn shared_state_is_announced() {
        let tmp = TempDir::new().unwrap();
        let opts = FilterOptions {
            share_state: true,
            state_dir: Some(tmp.path().to_path_buf()),
            ..FilterOptions::default()
        };
        let (_, out) = run(
            "INFO    -  Documentation built in 0.10 seconds\n",
            &opts,
        );
        assert!(out.contains("💡 MCP: State shared to"));
        assert!(tmp
            .path()
            .join(".mkdocs-output-filter")
            .join("state.json")
            .exists());
    }
}
