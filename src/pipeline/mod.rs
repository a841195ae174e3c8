//! Pipeline stages for PDF rasterise-and-recompose.
//!
//! Each submodule implements exactly one step. The three external
//! capabilities (counting, rasterising, composing) sit behind traits so the
//! orchestrator in [`crate::convert`] can be driven by other backends.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ count ──▶ render ──▶ (artifacts) ──▶ compose
//! (path)    (lopdf)   (pdfium     (file mode)     (lopdf)
//!                      + encode)
//! ```
//!
//! 1. [`input`]  — read a local file, validating the `%PDF` header
//! 2. [`count`]  — number of pages in the source document
//! 3. [`render`] — rasterise one page; [`encode`] turns it into a JPEG
//! 4. [`artifacts`] — per-page temporary files in file mode
//! 5. [`compose`] — one full-page JPEG per page in a fresh PDF

pub mod artifacts;
pub mod compose;
pub mod count;
pub mod encode;
pub mod input;
pub mod render;
