//! Result types returned by a pipeline run.

use serde::{Deserialize, Serialize};

/// The composed document plus a report of how it was produced.
#[derive(Debug, Clone)]
pub struct OptimizeOutput {
    /// The newly composed PDF, one page per rendered image.
    pub pdf: Vec<u8>,
    pub stats: OptimizeStats,
}

/// Per-run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeStats {
    /// Pages reported by the page counter.
    pub total_pages: usize,
    /// Pages that produced an image and appear in the output.
    pub rendered_pages: usize,
    /// 1-indexed pages that rendered to nothing and were left out.
    pub skipped_pages: Vec<usize>,
    /// Size of the source document.
    pub input_bytes: usize,
    /// Size of the composed document.
    pub output_bytes: usize,
    /// Temporary page images that could not be deleted (file mode only).
    pub artifacts_not_removed: usize,
    pub render_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl OptimizeStats {
    /// Output size relative to input size (`0.25` = four times smaller).
    ///
    /// Returns `None` for an empty input.
    pub fn size_ratio(&self) -> Option<f64> {
        (self.input_bytes > 0).then(|| self.output_bytes as f64 / self.input_bytes as f64)
    }

    /// True when at least one page was left out of the output.
    pub fn is_partial(&self) -> bool {
        !self.skipped_pages.is_empty()
    }
}
