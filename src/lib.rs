//! # pdfshrink
//!
//! Shrink PDF documents by rasterising every page to a JPEG and assembling
//! the images into a new PDF, trading vector fidelity for file size.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    read a local file or take bytes in memory
//!  ├─ 2. Count    number of pages (lopdf)
//!  ├─ 3. Render   page 1..=N in order → JPEG (pdfium + image)
//!  ├─ 4. Compose  one full-page image per page (lopdf, DCTDecode)
//!  └─ 5. Output   bytes, or an atomically written file
//! ```
//!
//! Pages that render to nothing are left out and reported in
//! [`OptimizeStats::skipped_pages`]; any render error aborts the run and no
//! output is produced.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfshrink::{OptimizeConfig, Pipeline};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(OptimizeConfig::default())?;
//!     let stats = pipeline.optimize_to_file(Path::new("in.pdf"), Path::new("out.pdf"))?;
//!     eprintln!("{} pages, {} → {} bytes",
//!         stats.rendered_pages, stats.input_bytes, stats.output_bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | The `POST /optimize` upload service (axum) |
//! | `cli`    | on      | The `pdfshrink` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `bundled` | off    | Embed the pdfium library named by `PDFIUM_BUNDLE_LIB` at build time |
//!
//! ## PDFium
//!
//! Rendering needs the pdfium shared library at runtime. The `pdfium-auto`
//! crate finds it (`PDFIUM_LIB_PATH`, the working directory, a per-user
//! cache) or downloads a pinned build on first use; the `bundled` feature
//! embeds one in the binary instead. A system-wide install is the last
//! resort. Everything except [`Pipeline::new`] works without pdfium, so a
//! custom [`PageRasterizer`] can be plugged in via
//! [`Pipeline::with_rasterizer`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OptimizeConfig, OptimizeConfigBuilder, RasterSettings, ServerConfig};
pub use convert::{convert, convert_file, Pipeline};
pub use error::ShrinkError;
pub use output::{OptimizeOutput, OptimizeStats};
pub use pipeline::compose::{LopdfComposer, PdfComposer};
pub use pipeline::count::{LopdfPageCounter, PageCounter};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer, RasterSession};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
#[cfg(feature = "server")]
pub use server::{router, Server};
