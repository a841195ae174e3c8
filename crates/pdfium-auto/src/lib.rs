//! # pdfium-auto
//!
//! Find the pdfium shared library that `pdfium-render` loads at runtime, and
//! fetch it when it is missing.
//!
//! ## Resolution order
//!
//! [`ensure_pdfium_library`] returns the first match:
//!
//! 1. `PDFIUM_LIB_PATH`: a library file, or a directory containing the
//!    platform library.
//! 2. The platform library in the current working directory.
//! 3. The per-version cache directory (see [`pdfium_cache_dir`]).
//! 4. With the `bundled` feature: the library embedded at compile time,
//!    written to the cache directory.
//! 5. A download of the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    extracted into the cache directory.
//!
//! Steps 1–3 never touch the network; [`cached_pdfium_path`] runs only those.
//!
//! ```rust,no_run
//! use pdfium_auto::{bind_pdfium_from_path, ensure_pdfium_library};
//!
//! let path = ensure_pdfium_library(Some(&|done, total| {
//!     if let Some(total) = total {
//!         eprint!("\rpdfium: {done}/{total} bytes");
//!     }
//! }))?;
//! let pdfium = bind_pdfium_from_path(&path)?;
//! # Ok::<(), pdfium_auto::PdfiumAutoError>(())
//! ```
//!
//! ## Environment
//!
//! - `PDFIUM_LIB_PATH`: use this library (file or directory); no download.
//! - `PDFIUM_AUTO_CACHE_DIR`: root of the cache instead of the platform
//!   cache directory.

use pdfium_render::prelude::Pdfium;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// pdfium-binaries release used for downloads (`chromium/<VERSION>`).
pub const PDFIUM_VERSION: &str = "7690";

#[cfg_attr(feature = "bundled", allow(dead_code))]
const RELEASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Download progress: `(bytes_so_far, total_if_known)`.
pub type DownloadProgress<'a> = &'a dyn Fn(u64, Option<u64>);

#[cfg(feature = "bundled")]
mod bundled {
    include!(concat!(env!("OUT_DIR"), "/bundled.rs"));
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PdfiumAutoError {
    /// No prebuilt pdfium exists for this OS/architecture.
    #[error("No prebuilt pdfium for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// The cache directory could not be created or written.
    #[error("pdfium cache error at '{path}': {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pdfium download failed: {0}")]
    Download(String),

    #[error("pdfium archive extraction failed: {0}")]
    Extract(String),

    /// The library file exists but could not be loaded.
    #[error("Failed to load pdfium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

type Result<T> = std::result::Result<T, PdfiumAutoError>;

// ── Platforms ────────────────────────────────────────────────────────────────

/// Where to find pdfium for one OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Release asset, e.g. `pdfium-linux-x64.tgz`.
    pub archive: &'static str,
    /// Path of the library inside the archive.
    pub member: &'static str,
    /// File name on disk.
    pub library: &'static str,
}

const fn prebuilt(archive: &'static str, library: &'static str, member: &'static str) -> Platform {
    Platform {
        archive,
        member,
        library,
    }
}

const PLATFORMS: &[(&str, &str, Platform)] = &[
    ("macos", "aarch64", prebuilt("pdfium-mac-arm64.tgz", "libpdfium.dylib", "lib/libpdfium.dylib")),
    ("macos", "x86_64", prebuilt("pdfium-mac-x64.tgz", "libpdfium.dylib", "lib/libpdfium.dylib")),
    ("linux", "x86_64", prebuilt("pdfium-linux-x64.tgz", "libpdfium.so", "lib/libpdfium.so")),
    ("linux", "aarch64", prebuilt("pdfium-linux-arm64.tgz", "libpdfium.so", "lib/libpdfium.so")),
    ("windows", "x86_64", prebuilt("pdfium-win-x64.tgz", "pdfium.dll", "bin/pdfium.dll")),
    ("windows", "aarch64", prebuilt("pdfium-win-arm64.tgz", "pdfium.dll", "bin/pdfium.dll")),
    ("windows", "x86", prebuilt("pdfium-win-x86.tgz", "pdfium.dll", "bin/pdfium.dll")),
];

/// Look up the prebuilt library for `os`/`arch` (as in `std::env::consts`).
pub fn platform_for(os: &str, arch: &str) -> Result<Platform> {
    PLATFORMS
        .iter()
        .find(|(o, a, _)| *o == os && *a == arch)
        .map(|(_, _, p)| *p)
        .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        })
}

pub fn current_platform() -> Result<Platform> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

// ── Local lookup ─────────────────────────────────────────────────────────────

/// Per-version cache directory.
///
/// `$PDFIUM_AUTO_CACHE_DIR/pdfium-<VERSION>` when set, otherwise
/// `<platform cache dir>/pdfshrink/pdfium-<VERSION>` (e.g.
/// `~/.cache/pdfshrink/pdfium-7690` on Linux).
pub fn pdfium_cache_dir() -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");
    if let Some(root) = std::env::var_os("PDFIUM_AUTO_CACHE_DIR") {
        return PathBuf::from(root).join(versioned);
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("pdfshrink")
        .join(versioned)
}

/// A `PDFIUM_LIB_PATH` value may name the library or its directory.
pub fn resolve_library_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

/// The library, if it is available without a download.
pub fn cached_pdfium_path() -> Option<PathBuf> {
    if let Some(env_path) = std::env::var_os("PDFIUM_LIB_PATH") {
        let path = resolve_library_path(Path::new(&env_path));
        if path.is_file() {
            return Some(path);
        }
        warn!(
            "PDFIUM_LIB_PATH={} has no pdfium library; looking elsewhere",
            path.display()
        );
    }

    let local = Pdfium::pdfium_platform_library_name_at_path(Path::new("./"));
    if local.is_file() {
        return Some(local);
    }

    let platform = current_platform().ok()?;
    Some(pdfium_cache_dir().join(platform.library)).filter(|p| p.is_file())
}

/// True when [`ensure_pdfium_library`] would not need the network.
pub fn is_pdfium_cached() -> bool {
    cfg!(feature = "bundled") || cached_pdfium_path().is_some()
}

// ── Ensure / bind ────────────────────────────────────────────────────────────

static RESOLVED: OnceLock<PathBuf> = OnceLock::new();

/// Path to a usable pdfium library, downloading it on first use.
///
/// The result is remembered for the rest of the process.
pub fn ensure_pdfium_library(progress: Option<DownloadProgress<'_>>) -> Result<PathBuf> {
    if let Some(path) = RESOLVED.get() {
        return Ok(path.clone());
    }

    let path = match cached_pdfium_path() {
        Some(path) => path,
        None => install_into_cache(progress)?,
    };
    debug!("Using pdfium at {}", path.display());
    Ok(RESOLVED.get_or_init(|| path).clone())
}

/// [`ensure_pdfium_library`] and bind it.
pub fn bind_pdfium(progress: Option<DownloadProgress<'_>>) -> Result<Pdfium> {
    let path = ensure_pdfium_library(progress)?;
    bind_pdfium_from_path(&path)
}

pub fn bind_pdfium_silent() -> Result<Pdfium> {
    bind_pdfium(None)
}

/// Bind the library at `path`; no lookup, no download.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// ── Installation ─────────────────────────────────────────────────────────────

fn install_into_cache(progress: Option<DownloadProgress<'_>>) -> Result<PathBuf> {
    let platform = current_platform()?;
    let dir = pdfium_cache_dir();
    std::fs::create_dir_all(&dir).map_err(|e| PdfiumAutoError::Cache {
        path: dir.clone(),
        source: e,
    })?;
    let target = dir.join(platform.library);

    #[cfg(feature = "bundled")]
    {
        let _ = progress;
        info!("Writing embedded pdfium to {}", target.display());
        let mut bytes: &[u8] = bundled::PDFIUM_BYTES;
        place_atomically(&dir, &target, &mut bytes)?;
        return Ok(target);
    }

    #[cfg(not(feature = "bundled"))]
    {
        let url = format!("{RELEASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", platform.archive);
        info!("Downloading pdfium from {}", url);
        let archive = download(&url, progress)?;
        extract_member(&archive, platform.member, &dir, &target)?;
        info!("pdfium cached at {}", target.display());
        Ok(target)
    }
}

#[cfg_attr(feature = "bundled", allow(dead_code))]
fn download(url: &str, progress: Option<DownloadProgress<'_>>) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PdfiumAutoError::Download(format!("reading body: {e}"))),
        };
        body.extend_from_slice(&chunk[..n]);
        if let Some(cb) = progress {
            cb(body.len() as u64, total);
        }
    }
    Ok(body)
}

/// Copy `member` out of a `.tgz` archive to `target`.
pub fn extract_member(archive: &[u8], member: &str, dir: &Path, target: &Path) -> Result<()> {
    let extract_err = |e: std::io::Error| PdfiumAutoError::Extract(e.to_string());
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));

    for entry in tar.entries().map_err(extract_err)? {
        let mut entry = entry.map_err(extract_err)?;
        let matches = entry
            .path()
            .map(|p| p.to_string_lossy() == member)
            .map_err(extract_err)?;
        if matches {
            return place_atomically(dir, target, &mut entry);
        }
    }

    Err(PdfiumAutoError::Extract(format!(
        "'{member}' not found in archive"
    )))
}

/// Stream `bytes` into a temp file in `dir`, then rename it to `target`, so
/// a concurrent reader never sees a half-written library.
fn place_atomically(dir: &Path, target: &Path, bytes: &mut dyn Read) -> Result<()> {
    let cache_err = |e: std::io::Error| PdfiumAutoError::Cache {
        path: target.to_path_buf(),
        source: e,
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdfium-")
        .tempfile_in(dir)
        .map_err(cache_err)?;
    std::io::copy(bytes, &mut tmp).map_err(cache_err)?;
    tmp.persist(target).map_err(|e| cache_err(e.error))?;
    Ok(())
}
