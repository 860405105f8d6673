//! Batch mode: read everything, then report once.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::info::{group_info_messages, parse_info_messages};
use crate::input::lossy_lines;
use crate::parse::{extract_build_info, parse_mkdocs_output};
use crate::patterns::is_mkdocs_line;
use crate::processor::{IssueDedup, NoticeDedup};
use crate::progress::ActivityReporter;
use crate::render::Renderer;
use crate::run::FilterOptions;
use crate::state::StateWriter;

/// Filter a complete build log. Returns the process exit code.
pub fn run_batch<R: BufRead, W: Write>(
    input: R,
    renderer: &mut Renderer<W>,
    activity: &mut dyn ActivityReporter,
    opts: &FilterOptions,
) -> Result<i32> {
    let mut lines = Vec::new();
    for line in lossy_lines(input) {
        let line = line?;
        activity.report(&line, None);
        lines.push(line.trim_end().to_string());
    }
    activity.clear();

    if !lines.is_empty() && !lines.iter().any(|l| is_mkdocs_line(l)) {
        renderer.unrecognized_output(&lines)?;
        return Ok(1);
    }

    let build_info = extract_build_info(&lines);
    let mut dedup = IssueDedup::new(opts.errors_only);
    let issues: Vec<_> = parse_mkdocs_output(&lines)
        .into_iter()
        .filter(|issue| dedup.admit(issue))
        .collect();
    let mut notice_dedup = NoticeDedup::default();
    let info_messages: Vec<_> = parse_info_messages(&lines)
        .into_iter()
        .filter(|message| notice_dedup.admit(message))
        .collect();
    tracing::debug!(
        lines = lines.len(),
        issues = issues.len(),
        notices = info_messages.len(),
        "batch parse finished"
    );

    if opts.share_state {
        match StateWriter::locate(opts.state_dir.as_deref()) {
            Ok(mut writer) => {
                let tail = lines.len().saturating_sub(opts.config.buffer.raw_lines);
                if let Err(e) =
                    writer.write(&issues, &info_messages, &build_info, &lines[tail..])
                {
                    tracing::warn!(error = %e, "failed to write state snapshot");
                }
            }
            Err(e) => tracing::warn!(error = %e, "cannot locate state file"),
        }
    }

    if issues.is_empty() {
        renderer.success()?;
    } else {
        renderer.raw_line("")?;
        for issue in &issues {
            renderer.issue(issue)?;
        }
    }

    let groups = group_info_messages(&info_messages);
    if !groups.is_empty() {
        renderer.info_groups(&groups)?;
    }

    renderer.summary(&issues, &build_info)?;

    Ok(if issues.iter().any(|i| i.is_error()) { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;
    use crate::progress::NoActivity;

    fn run(input: &str, errors_only: bool) -> (i32, String) {
        let mut renderer = Renderer::new(Vec::new(), false, false, DisplayConfig::default());
        let opts = FilterOptions {
            errors_only,
            ..FilterOptions::default()
        };
        let code = run_batch(input.as_bytes(), &mut renderer, &mut NoActivity, &opts).unwrap();
        (code, String::from_utf8(renderer.into_inner()).unwrap())
    }

    #[test]
    fn clean_build_succeeds() {
        let (code, out) = run(
            "INFO    -  Building documentation...\nINFO    -  Documentation built in 0.42 seconds\n",
            false,
        );
        assert_eq!(code, 0);
        assert!(out.contains("✓ No warnings or errors"));
        assert!(out.contains("Built in 0.42s"));
    }

    #[test]
    fn duplicate_errors_reported_once() {
        let (code, out) = run(
            "INFO    -  Building documentation...\nERROR   -  Something broke\nERROR   -  Something broke\n",
            false,
        );
        assert_eq!(code, 1);
        assert_eq!(out.matches("Something broke").count(), 1);
        assert!(out.contains("Summary: 1 error(s)"));
    }

    #[test]
    fn errors_only_drops_warnings() {
        let (code, out) = run(
            "WARNING -  Something odd\nINFO    -  Documentation built in 1.00 seconds\n",
            true,
        );
        assert_eq!(code, 0);
        assert!(!out.contains("Something odd"));
        assert!(out.contains("✓ No warnings or errors"));
    }

    #[test]
    fn notices_are_grouped() {
        let (_, out) = run(
            "WARNING -  Doc file 'a.md' contains a link 'b.md', but the target is not found among documentation files.\n",
            false,
        );
        assert!(out.contains("🔗 Broken links (1 files)"));
    }

    #[test]
    fn repeated_notice_counts_once() {
        let line = "WARNING -  Doc file 'a.md' contains a link 'b.md', but the target is not found among documentation files.";
        let (_, out) = run(&format!("{line}\n{line}\n"), false);
        assert!(out.contains("🔗 Broken links (1 files)"));
        assert!(out.contains("'b.md' (1 files)"));
        assert!(!out.contains("(2 files)"));
    }

    #[test]
    fn shared_snapshot_holds_unique_notices() {
        let tmp = tempfile::TempDir::new().unwrap();
        let line = "WARNING -  Doc file 'a.md' contains a link 'b.md', but the target is not found among documentation files.";
        let mut renderer = Renderer::new(Vec::new(), false, false, DisplayConfig::default());
        let opts = FilterOptions {
            share_state: true,
            state_dir: Some(tmp.path().to_path_buf()),
            ..FilterOptions::default()
        };
        let input = format!("{line}\n{line}\nINFO    -  Documentation built in 1.00 seconds\n");
        run_batch(input.as_bytes(), &mut renderer, &mut NoActivity, &opts).unwrap();

        let state = crate::state::read_state_file(&crate::state::get_state_file_path(tmp.path())).unwrap();
        assert_eq!(state.info_messages.len(), 1);
        assert_eq!(state.info_messages[0].target.as_deref(), Some("b.md"));
    }

    #[test]
    fn foreign_input_is_echoed() {
        let (code, out) = run("command not found: mkdocs\n", false);
        assert_eq!(code, 1);
        assert!(out.contains("Error: mkdocs did not produce expected output"));
        assert!(out.contains("  command not found: mkdocs"));
    }
}
