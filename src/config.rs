//! Configuration types for PDF rasterise-and-recompose runs.
//!
//! All pipeline behaviour is controlled through [`OptimizeConfig`], built via
//! its [`OptimizeConfigBuilder`]. The HTTP front end has its own small
//! [`ServerConfig`].

use crate::error::ShrinkError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Default rendering resolution.
pub const DEFAULT_DPI: u32 = 150;
/// Default width of a rendered page, in pixels.
pub const DEFAULT_TARGET_WIDTH: u32 = 800;
/// Default height of a rendered page, in pixels.
pub const DEFAULT_TARGET_HEIGHT: u32 = 1000;
/// Default JPEG quality (0–100).
pub const DEFAULT_QUALITY: u8 = 80;

/// Configuration for one pipeline run.
///
/// Built via [`OptimizeConfig::builder()`] or using
/// [`OptimizeConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfshrink::OptimizeConfig;
///
/// let config = OptimizeConfig::builder()
///     .dpi(120)
///     .quality(70)
///     .build()
///     .unwrap();
/// assert_eq!(config.target_width, 800);
/// ```
#[derive(Clone)]
pub struct OptimizeConfig {
    /// Rendering DPI. Range: 36–600. Default: 150.
    ///
    /// Only scales the page when `preserve_aspect_ratio` is on; otherwise the
    /// target size alone decides the pixel dimensions.
    pub dpi: u32,

    /// Width of a rendered page in pixels. Default: 800.
    ///
    /// Every page is rendered to exactly `target_width × target_height`,
    /// stretching it if its aspect ratio differs. See
    /// [`preserve_aspect_ratio`](Self::preserve_aspect_ratio).
    pub target_width: u32,

    /// Height of a rendered page in pixels. Default: 1000.
    pub target_height: u32,

    /// Render at `dpi` and only cap the result to the target box, keeping
    /// the page's aspect ratio. Default: false.
    pub preserve_aspect_ratio: bool,

    /// JPEG quality, 0–100. Default: 80.
    ///
    /// The encoder accepts 1–100, so 0 is treated as 1.
    pub quality: u8,

    /// Directory for temporary per-page images in file mode.
    /// If None, a fresh temporary directory is created for every run.
    pub artifact_dir: Option<PathBuf>,

    /// Delete temporary per-page images once the run finishes. Default: true.
    pub cleanup_artifacts: bool,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            target_width: DEFAULT_TARGET_WIDTH,
            target_height: DEFAULT_TARGET_HEIGHT,
            preserve_aspect_ratio: false,
            quality: DEFAULT_QUALITY,
            artifact_dir: None,
            cleanup_artifacts: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OptimizeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizeConfig")
            .field("dpi", &self.dpi)
            .field("target_width", &self.target_width)
            .field("target_height", &self.target_height)
            .field("preserve_aspect_ratio", &self.preserve_aspect_ratio)
            .field("quality", &self.quality)
            .field("artifact_dir", &self.artifact_dir)
            .field("cleanup_artifacts", &self.cleanup_artifacts)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl OptimizeConfig {
    /// Create a new builder for `OptimizeConfig`.
    pub fn builder() -> OptimizeConfigBuilder {
        OptimizeConfigBuilder {
            config: Self::default(),
        }
    }

    /// The page-independent raster settings, for logging and reports.
    pub fn raster_settings(&self) -> RasterSettings {
        RasterSettings {
            dpi: self.dpi,
            target_width: self.target_width,
            target_height: self.target_height,
            preserve_aspect_ratio: self.preserve_aspect_ratio,
            quality: self.quality,
        }
    }
}

/// Builder for [`OptimizeConfig`].
#[derive(Debug)]
pub struct OptimizeConfigBuilder {
    config: OptimizeConfig,
}

impl OptimizeConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn target_width(mut self, px: u32) -> Self {
        self.config.target_width = px;
        self
    }

    pub fn target_height(mut self, px: u32) -> Self {
        self.config.target_height = px;
        self
    }

    pub fn preserve_aspect_ratio(mut self, v: bool) -> Self {
        self.config.preserve_aspect_ratio = v;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality.min(100);
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = Some(dir.into());
        self
    }

    pub fn cleanup_artifacts(mut self, v: bool) -> Self {
        self.config.cleanup_artifacts = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OptimizeConfig, ShrinkError> {
        let c = &self.config;
        if !(36..=600).contains(&c.dpi) {
            return Err(ShrinkError::InvalidConfig(format!(
                "DPI must be 36–600, got {}",
                c.dpi
            )));
        }
        if c.target_width == 0 || c.target_height == 0 {
            return Err(ShrinkError::InvalidConfig(format!(
                "Target size must be at least 1×1 px, got {}×{}",
                c.target_width, c.target_height
            )));
        }
        if !c.cleanup_artifacts && c.artifact_dir.is_none() {
            return Err(ShrinkError::InvalidConfig(
                "Keeping page images requires an explicit artifact directory".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Serializable snapshot of the raster knobs of an [`OptimizeConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterSettings {
    pub dpi: u32,
    pub target_width: u32,
    pub target_height: u32,
    pub preserve_aspect_ratio: bool,
    pub quality: u8,
}

// ── Server ───────────────────────────────────────────────────────────────

/// Default upload size limit: 64 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Configuration for the HTTP upload service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to. Default: `0.0.0.0:3000`.
    pub bind: SocketAddr,

    /// Largest accepted request body in bytes. Default: 64 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
