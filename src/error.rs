//! Error types for the pdfshrink library.
//!
//! Every failure is fatal for the run that produced it: the pipeline never
//! returns a partially composed document. The one locally recovered condition,
//! a temporary artifact that could not be deleted, is not an error at all; it
//! is logged and counted in [`crate::output::OptimizeStats::artifacts_not_removed`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdfshrink library.
#[derive(Debug, Error)]
pub enum ShrinkError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The source document could not be parsed (page counting failed).
    #[error("Unable to parse PDF document: {detail}")]
    DocumentParse { detail: String },

    /// The renderer failed on a specific page. Aborts the whole run.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Rasterization { page: usize, detail: String },

    /// A rendered image is not a decodable JPEG (1-based position in the
    /// image sequence handed to the composer).
    #[error("Image {index} could not be decoded: {detail}")]
    ImageDecode { index: usize, detail: String },

    /// Every page rendered to nothing; there is nothing to compose.
    #[error("No images were generated from {total_pages} page(s)")]
    EmptyResult { total_pages: usize },

    /// The composed document could not be serialised.
    #[error("Failed to compose output PDF: {0}")]
    ComposeFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A temporary page image could not be created, written or read back.
    #[error("Temporary artifact error at '{path}': {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Check network access: the first run downloads pdfium into the\n\
    cache (PDFIUM_AUTO_CACHE_DIR overrides its location).\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory).\n\
  • Build with --features bundled to embed pdfium in the binary.\n\
  • Install pdfium system-wide; prebuilt binaries are published at\n\
    https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Server errors ─────────────────────────────────────────────────────
    /// The HTTP listener could not be bound or stopped unexpectedly.
    #[error("HTTP server error on {addr}: {source}")]
    Server {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
