//! Build-cycle boundary detection.
//!
//! MkDocs never frames its output, so cycle boundaries are inferred from a
//! handful of signature lines. Rules are kept in one ordered table; the first
//! matching rule wins.

use crate::patterns;

/// Kind of boundary a line marks in the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkBoundary {
    /// `Documentation built in X seconds`
    BuildComplete,
    /// `Serving on http://...`
    ServerStarted,
    /// `Detected file changes`, `Reloading docs`, or a timestamped rebuild
    RebuildStarted,
    /// A fresh log line right after a blank line
    ErrorBlockEnd,
    None,
}

impl ChunkBoundary {
    /// Boundaries after which a finished build's results can be shown.
    pub fn ends_build(&self) -> bool {
        matches!(self, ChunkBoundary::BuildComplete | ChunkBoundary::ServerStarted)
    }
}

type Rule = fn(&str, Option<&str>) -> bool;

const RULES: &[(ChunkBoundary, Rule)] = &[
    (ChunkBoundary::BuildComplete, build_complete),
    (ChunkBoundary::ServerStarted, server_started),
    (ChunkBoundary::RebuildStarted, rebuild_started),
    (ChunkBoundary::ErrorBlockEnd, error_block_end),
];

fn build_complete(line: &str, _prev: Option<&str>) -> bool {
    patterns::is_build_complete(line)
}

fn server_started(line: &str, _prev: Option<&str>) -> bool {
    patterns::is_serving(line)
}

fn rebuild_started(line: &str, _prev: Option<&str>) -> bool {
    line.contains("Detected file changes")
        || line.contains("Reloading docs")
        || (patterns::starts_with_timestamp(line.trim()) && line.contains("Building documentation"))
}

// Only fires after a blank line; output that omits the separator is flushed
// at the next cycle boundary instead.
fn error_block_end(line: &str, prev: Option<&str>) -> bool {
    prev.is_some_and(|p| p.trim().is_empty()) && patterns::is_level_line(line.trim())
}

/// Classify `line` given the line that preceded it.
pub fn detect_chunk_boundary(line: &str, prev_line: Option<&str>) -> ChunkBoundary {
    RULES
        .iter()
        .find(|(_, rule)| rule(line, prev_line))
        .map(|(kind, _)| *kind)
        .unwrap_or(ChunkBoundary::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_complete_wins() {
        assert_eq!(
            detect_chunk_boundary("INFO    -  Documentation built in 12.34 seconds", None),
            ChunkBoundary::BuildComplete
        );
    }

    #[test]
    fn serving_line() {
        assert_eq!(
            detect_chunk_boundary("INFO    -  [10:00:00] Serving on https://localhost:8000/", None),
            ChunkBoundary::ServerStarted
        );
    }

    #[test]
    fn rebuild_signatures() {
        assert_eq!(
            detect_chunk_boundary("INFO    -  [10:00:05] Detected file changes", None),
            ChunkBoundary::RebuildStarted
        );
        assert_eq!(
            detect_chunk_boundary("INFO    -  [10:00:05] Reloading docs...", None),
            ChunkBoundary::RebuildStarted
        );
        assert_eq!(
            detect_chunk_boundary("2024-01-15 10:00:05,001 - INFO - Building documentation...", None),
            ChunkBoundary::RebuildStarted
        );
        // Without a leading timestamp, "Building documentation" is ordinary.
        assert_eq!(
            detect_chunk_boundary("INFO    -  Building documentation...", None),
            ChunkBoundary::None
        );
    }

    #[test]
    fn error_block_end_needs_blank_previous_line() {
        let line = "WARNING -  Something odd";
        assert_eq!(detect_chunk_boundary(line, Some("")), ChunkBoundary::ErrorBlockEnd);
        assert_eq!(detect_chunk_boundary(line, Some("   ")), ChunkBoundary::ErrorBlockEnd);
        assert_eq!(
            detect_chunk_boundary(line, Some("    raise ValueError")),
            ChunkBoundary::None
        );
        assert_eq!(detect_chunk_boundary(line, None), ChunkBoundary::None);
        assert_eq!(
            detect_chunk_boundary("2024-01-15 10:00:05 ERROR boom", Some("")),
            ChunkBoundary::ErrorBlockEnd
        );
    }

    #[test]
    fn rebuild_takes_priority_over_block_end() {
        assert_eq!(
            detect_chunk_boundary("INFO    -  Detected file changes", Some("")),
            ChunkBoundary::RebuildStarted
        );
    }
}
