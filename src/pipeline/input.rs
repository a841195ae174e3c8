//! Input resolution: turn a user-supplied path into validated PDF bytes.
//!
//! We check the `%PDF` magic bytes before returning so callers get a
//! meaningful error instead of a parser failure deep inside the pipeline.

use crate::error::ShrinkError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Magic bytes every PDF file starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// True when `bytes` start with the PDF header.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Read a local PDF file, validating existence, permissions and magic bytes.
pub fn read_input(path: &Path) -> Result<Vec<u8>, ShrinkError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => ShrinkError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ShrinkError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    if !has_pdf_magic(&bytes) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ShrinkError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}
