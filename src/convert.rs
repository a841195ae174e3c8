//! The orchestrator: count → rasterise every page → compose.
//!
//! [`Pipeline`] is synchronous; every stage completes before the next one
//! starts and pages are processed strictly in order. The async entry points
//! [`convert`] and [`convert_file`] move a run onto Tokio's blocking pool,
//! because pdfium rendering is CPU-bound and must not stall the worker
//! threads.
//!
//! Two modes:
//!
//! * **in memory** ([`Pipeline::optimize`]): images are collected in a `Vec`
//!   and the composed document is returned as bytes;
//! * **file** ([`Pipeline::optimize_to_file`]): each image is written to a
//!   temporary `page.<n>.jpeg`, read back for composition, and deleted after
//!   the output file has been written.

use crate::config::OptimizeConfig;
use crate::error::ShrinkError;
use crate::output::{OptimizeOutput, OptimizeStats};
use crate::pipeline::artifacts::ArtifactDir;
use crate::pipeline::compose::{LopdfComposer, PdfComposer};
use crate::pipeline::count::{LopdfPageCounter, PageCounter};
use crate::pipeline::input;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A configured pipeline with its three capabilities.
///
/// Cheap to clone and safe to share between concurrent runs: it holds no
/// per-run state.
#[derive(Clone)]
pub struct Pipeline {
    counter: Arc<dyn PageCounter>,
    rasterizer: Arc<dyn PageRasterizer>,
    composer: Arc<dyn PdfComposer>,
    config: OptimizeConfig,
}

/// Outcome of the rasterisation loop.
struct RasterPass {
    total_pages: usize,
    rendered_pages: usize,
    skipped_pages: Vec<usize>,
    render_duration_ms: u64,
}

impl Pipeline {
    /// pdfium rasteriser, lopdf counter and composer.
    pub fn new(config: OptimizeConfig) -> Result<Self, ShrinkError> {
        let rasterizer = PdfiumRasterizer::new()?;
        Ok(Self::with_rasterizer(config, Arc::new(rasterizer)))
    }

    /// Custom rasteriser, lopdf counter and composer.
    pub fn with_rasterizer(config: OptimizeConfig, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            counter: Arc::new(LopdfPageCounter),
            rasterizer,
            composer: Arc::new(LopdfComposer),
            config,
        }
    }

    pub fn with_counter(mut self, counter: Arc<dyn PageCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_composer(mut self, composer: Arc<dyn PdfComposer>) -> Self {
        self.composer = composer;
        self
    }

    pub fn config(&self) -> &OptimizeConfig {
        &self.config
    }

    /// Rasterise and recompose a PDF held in memory.
    ///
    /// # Errors
    /// - `DocumentParse` if the page count cannot be read
    /// - `Rasterization` as soon as any page fails to render
    /// - `EmptyResult` if no page produced an image
    /// - `ImageDecode` / `ComposeFailed` from composition
    pub fn optimize(&self, pdf: &[u8]) -> Result<OptimizeOutput, ShrinkError> {
        let total_start = Instant::now();
        info!("Starting in-memory optimisation ({} bytes)", pdf.len());

        let mut images: Vec<Vec<u8>> = Vec::new();
        let pass = self.rasterize_pages(pdf, |_, jpeg| {
            images.push(jpeg);
            Ok(())
        })?;

        let compose_start = Instant::now();
        let out = self.composer.compose(images)?;
        let compose_duration_ms = compose_start.elapsed().as_millis() as u64;

        let stats = self.finish(pass, pdf.len(), out.len(), compose_duration_ms, total_start);
        Ok(OptimizeOutput { pdf: out, stats })
    }

    /// Read `input` from disk, then [`Pipeline::optimize`] it in memory.
    pub fn optimize_path(&self, input: &Path) -> Result<OptimizeOutput, ShrinkError> {
        let pdf = input::read_input(input)?;
        self.optimize(&pdf)
    }

    /// File mode: rasterise through temporary page images and write the
    /// composed document to `output`.
    ///
    /// The output is written atomically (uniquely named temp file in the
    /// output directory, then renamed over the target) and only after
    /// every page has rendered. Temporary images are deleted whether the run
    /// succeeds or fails, unless `cleanup_artifacts` is off.
    pub fn optimize_to_file(&self, input: &Path, output: &Path) -> Result<OptimizeStats, ShrinkError> {
        let total_start = Instant::now();
        info!("Starting optimisation: {} → {}", input.display(), output.display());

        let pdf = input::read_input(input)?;
        let mut artifacts = ArtifactDir::create(self.config.artifact_dir.as_deref())?;
        debug!("Temporary page images in {}", artifacts.root().display());

        let result = self.optimize_via_artifacts(&pdf, &mut artifacts, output, total_start);

        let not_removed = if self.config.cleanup_artifacts {
            artifacts.cleanup()
        } else {
            info!("Keeping page images in {}", artifacts.root().display());
            0
        };
        if not_removed > 0 {
            warn!("{} temporary page image(s) could not be removed", not_removed);
        }

        let mut stats = result?;
        stats.artifacts_not_removed = not_removed;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    fn optimize_via_artifacts(
        &self,
        pdf: &[u8],
        artifacts: &mut ArtifactDir,
        output: &Path,
        total_start: Instant,
    ) -> Result<OptimizeStats, ShrinkError> {
        let pass = self.rasterize_pages(pdf, |page, jpeg| artifacts.write(page, &jpeg).map(|_| ()))?;

        let compose_start = Instant::now();
        let images = artifacts.read_all()?;
        let out = self.composer.compose(images)?;
        let compose_duration_ms = compose_start.elapsed().as_millis() as u64;

        write_output(output, &out)?;
        info!("Saved {} ({} bytes)", output.display(), out.len());

        Ok(self.finish(pass, pdf.len(), out.len(), compose_duration_ms, total_start))
    }

    /// Count pages, then rasterise 1..=N in order, handing each image to `sink`.
    fn rasterize_pages<F>(&self, pdf: &[u8], mut sink: F) -> Result<RasterPass, ShrinkError>
    where
        F: FnMut(usize, Vec<u8>) -> Result<(), ShrinkError>,
    {
        let callback = self.config.progress_callback.as_ref();

        let total_pages = self.counter.count_pages(pdf)?;
        info!("PDF has {} pages", total_pages);
        if let Some(cb) = callback {
            cb.on_conversion_start(total_pages);
        }

        let render_start = Instant::now();
        let mut session = self.rasterizer.open(pdf, &self.config)?;
        let mut rendered_pages = 0;
        let mut skipped_pages = Vec::new();

        for page in 1..=total_pages {
            if let Some(cb) = callback {
                cb.on_page_start(page, total_pages);
            }
            debug!("Rasterising page {}/{}", page, total_pages);

            match session.render(page)? {
                Some(jpeg) if !jpeg.is_empty() => {
                    let len = jpeg.len();
                    sink(page, jpeg)?;
                    rendered_pages += 1;
                    if let Some(cb) = callback {
                        cb.on_page_complete(page, total_pages, len);
                    }
                }
                _ => {
                    warn!("Page {} produced no image; leaving it out", page);
                    skipped_pages.push(page);
                    if let Some(cb) = callback {
                        cb.on_page_skipped(page, total_pages);
                    }
                }
            }
        }

        if rendered_pages == 0 {
            return Err(ShrinkError::EmptyResult { total_pages });
        }

        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        info!(
            "Rendered {}/{} pages in {}ms",
            rendered_pages, total_pages, render_duration_ms
        );

        Ok(RasterPass {
            total_pages,
            rendered_pages,
            skipped_pages,
            render_duration_ms,
        })
    }

    fn finish(
        &self,
        pass: RasterPass,
        input_bytes: usize,
        output_bytes: usize,
        compose_duration_ms: u64,
        total_start: Instant,
    ) -> OptimizeStats {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_complete(pass.total_pages, pass.rendered_pages);
        }

        let stats = OptimizeStats {
            total_pages: pass.total_pages,
            rendered_pages: pass.rendered_pages,
            skipped_pages: pass.skipped_pages,
            input_bytes,
            output_bytes,
            artifacts_not_removed: 0,
            render_duration_ms: pass.render_duration_ms,
            compose_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Optimisation complete: {}/{} pages, {} → {} bytes, {}ms total",
            stats.rendered_pages,
            stats.total_pages,
            stats.input_bytes,
            stats.output_bytes,
            stats.total_duration_ms
        );
        stats
    }
}

/// Write `bytes` to `path` atomically.
///
/// The bytes go to a uniquely named temp file next to `path`, which is then
/// renamed over it. Concurrent runs never share a temp file, and the temp file
/// is removed when anything fails.
fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ShrinkError> {
    let write_err = |e| ShrinkError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(write_err)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".pdfshrink-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

// ── Async entry points ───────────────────────────────────────────────────

/// Run [`Pipeline::optimize`] on the blocking pool.
pub async fn convert(pipeline: Arc<Pipeline>, pdf: Vec<u8>) -> Result<OptimizeOutput, ShrinkError> {
    tokio::task::spawn_blocking(move || pipeline.optimize(&pdf))
        .await
        .map_err(|e| ShrinkError::Internal(format!("Pipeline task panicked: {}", e)))?
}

/// Run [`Pipeline::optimize_to_file`] on the blocking pool.
pub async fn convert_file(
    pipeline: Arc<Pipeline>,
    input: impl Into<PathBuf>,
    output: impl Into<PathBuf>,
) -> Result<OptimizeStats, ShrinkError> {
    let input = input.into();
    let output = output.into();
    tokio::task::spawn_blocking(move || pipeline.optimize_to_file(&input, &output))
        .await
        .map_err(|e| ShrinkError::Internal(format!("Pipeline task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_output_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/out.pdf");

        write_output(&path, b"%PDF-1.5").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");
        assert_eq!(entries(path.parent().unwrap()), vec!["out.pdf"]);
    }

    #[test]
    fn write_output_replaces_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.pdf");
        std::fs::write(&path, b"old").unwrap();

        write_output(&path, b"%PDF-new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-new");
        assert_eq!(entries(tmp.path()), vec!["out.pdf"]);
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn write_output_reports_unwritable_target() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory in place of the output file makes the rename fail.
        let path = tmp.path().join("taken.pdf");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("child"), b"x").unwrap();

        let err = write_output(&path, b"%PDF").unwrap_err();
        assert!(matches!(err, ShrinkError::OutputWriteFailed { .. }));
        // Only the directory that blocked the rename is left behind.
        assert_eq!(entries(tmp.path()), vec!["taken.pdf"]);
        assert_eq!(entries(&path), vec!["child"]);
    }
}
