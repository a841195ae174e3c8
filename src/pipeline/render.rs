//! PDF rasterisation: render one page to a compressed JPEG via pdfium.
//!
//! The pipeline opens one [`RasterSession`] per run through
//! [`PageRasterizer::open`] and asks it for pages 1..=N, strictly in order.
//! An `Ok(None)` result means the page rendered to nothing and is left out of
//! the output; an `Err` aborts the run.
//!
//! ## Output size
//!
//! By default every page comes out at exactly `target_width × target_height`
//! pixels, whatever its own proportions; a landscape page is squeezed into the
//! portrait box. With `preserve_aspect_ratio` the page is instead scaled by
//! `dpi / 72` and then capped to the box, keeping its shape:
//!
//! ```text
//! exact (default)              preserve_aspect_ratio
//! Letter 612×792 pt → 800×1000  Letter @150dpi → 773×1000
//! A4 landscape      → 800×1000  A4 landscape   → 800×565
//! ```

use crate::config::OptimizeConfig;
use crate::error::ShrinkError;
use crate::pipeline::encode;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Renders pages of a PDF to compressed image bytes.
pub trait PageRasterizer: Send + Sync {
    /// Rasterise 1-indexed `page` of `pdf`.
    ///
    /// Returns `Ok(None)` when the page produced no image.
    fn rasterize(
        &self,
        pdf: &[u8],
        page: usize,
        config: &OptimizeConfig,
    ) -> Result<Option<Vec<u8>>, ShrinkError>;

    /// Start rendering `pdf`, page by page.
    ///
    /// The default session calls [`rasterize`](Self::rasterize) for every
    /// page. Implementations that parse the document should override this to
    /// parse it once per run.
    fn open<'a>(
        &'a self,
        pdf: &'a [u8],
        config: &'a OptimizeConfig,
    ) -> Result<Box<dyn RasterSession + 'a>, ShrinkError> {
        Ok(Box::new(PerPage {
            rasterizer: self,
            pdf,
            config,
        }))
    }
}

/// One document opened for rendering.
pub trait RasterSession {
    /// Rasterise 1-indexed `page`. Same contract as
    /// [`PageRasterizer::rasterize`].
    fn render(&mut self, page: usize) -> Result<Option<Vec<u8>>, ShrinkError>;
}

struct PerPage<'a, R: ?Sized> {
    rasterizer: &'a R,
    pdf: &'a [u8],
    config: &'a OptimizeConfig,
}

impl<R: PageRasterizer + ?Sized> RasterSession for PerPage<'_, R> {
    fn render(&mut self, page: usize) -> Result<Option<Vec<u8>>, ShrinkError> {
        self.rasterizer.rasterize(self.pdf, page, self.config)
    }
}

/// [`PageRasterizer`] backed by a bound pdfium library.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind pdfium (see [`bind_pdfium`]) and wrap it.
    pub fn new() -> Result<Self, ShrinkError> {
        Ok(Self::from_pdfium(bind_pdfium()?))
    }

    /// Wrap an already bound pdfium instance.
    pub fn from_pdfium(pdfium: Pdfium) -> Self {
        Self { pdfium }
    }

    fn session<'a>(
        &'a self,
        pdf: &'a [u8],
        config: &'a OptimizeConfig,
    ) -> Result<PdfiumSession<'a>, ShrinkError> {
        // Load failures are reported against the first page of the run.
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| ShrinkError::Rasterization {
                page: 1,
                detail: format!("{:?}", e),
            })?;
        debug!("pdfium loaded {} pages", document.pages().len());
        Ok(PdfiumSession { document, config })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        pdf: &[u8],
        page: usize,
        config: &OptimizeConfig,
    ) -> Result<Option<Vec<u8>>, ShrinkError> {
        self.session(pdf, config)?.render(page)
    }

    fn open<'a>(
        &'a self,
        pdf: &'a [u8],
        config: &'a OptimizeConfig,
    ) -> Result<Box<dyn RasterSession + 'a>, ShrinkError> {
        Ok(Box::new(self.session(pdf, config)?))
    }
}

struct PdfiumSession<'a> {
    document: PdfDocument<'a>,
    config: &'a OptimizeConfig,
}

impl RasterSession for PdfiumSession<'_> {
    fn render(&mut self, page: usize) -> Result<Option<Vec<u8>>, ShrinkError> {
        let index = page_index(page)?;
        let fail = |e: PdfiumError| ShrinkError::Rasterization {
            page,
            detail: format!("{:?}", e),
        };

        let pdf_page = self.document.pages().get(index).map_err(fail)?;
        let bitmap = pdf_page
            .render_with_config(&render_config(self.config))
            .map_err(fail)?;

        let image = bitmap.as_image();
        if image.width() == 0 || image.height() == 0 {
            debug!("Page {} rendered to an empty bitmap", page);
            return Ok(None);
        }
        debug!(
            "Rendered page {} → {}x{} px",
            page,
            image.width(),
            image.height()
        );

        let jpeg = encode::encode_page(&image, self.config.quality).map_err(|e| {
            ShrinkError::Rasterization {
                page,
                detail: format!("JPEG encoding failed: {}", e),
            }
        })?;

        Ok((!jpeg.is_empty()).then_some(jpeg))
    }
}

/// Convert a 1-indexed page number to pdfium's 0-indexed page index.
fn page_index(page: usize) -> Result<u16, ShrinkError> {
    page.checked_sub(1)
        .and_then(|i| u16::try_from(i).ok())
        .ok_or_else(|| ShrinkError::Rasterization {
            page,
            detail: "page index out of range".into(),
        })
}

/// How a page is sized on its way to a bitmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RenderSizing {
    /// Stretch to exactly `width × height` pixels.
    Exact { width: i32, height: i32 },
    /// Scale by `scale`, then cap to `max_width × max_height` keeping the
    /// aspect ratio.
    Bounded {
        scale: f32,
        max_width: i32,
        max_height: i32,
    },
}

pub(crate) fn render_sizing(config: &OptimizeConfig) -> RenderSizing {
    let width = clamp_px(config.target_width);
    let height = clamp_px(config.target_height);
    if config.preserve_aspect_ratio {
        RenderSizing::Bounded {
            scale: config.dpi as f32 / 72.0,
            max_width: width,
            max_height: height,
        }
    } else {
        RenderSizing::Exact { width, height }
    }
}

fn clamp_px(px: u32) -> i32 {
    i32::try_from(px).unwrap_or(i32::MAX)
}

fn render_config(config: &OptimizeConfig) -> PdfRenderConfig {
    match render_sizing(config) {
        RenderSizing::Exact { width, height } => {
            PdfRenderConfig::new().set_target_size(width, height)
        }
        RenderSizing::Bounded {
            scale,
            max_width,
            max_height,
        } => PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .set_maximum_width(max_width)
            .set_maximum_height(max_height),
    }
}

/// Bind to a pdfium shared library.
///
/// Resolution order:
///
/// 1. Whatever `pdfium-auto` finds or installs: `PDFIUM_LIB_PATH` (a file or
///    a directory), the platform library in the working directory, the
///    per-user cache (downloading into it on first use), or the library
///    embedded by the `bundled` feature.
/// 2. The system library search path.
pub fn bind_pdfium() -> Result<Pdfium, ShrinkError> {
    match pdfium_auto::bind_pdfium_silent() {
        Ok(pdfium) => Ok(pdfium),
        Err(auto_err) => {
            info!("pdfium-auto could not provide pdfium ({}); trying the system library", auto_err);
            Pdfium::bind_to_system_library()
                .map(Pdfium::new)
                .map_err(|e| {
                    ShrinkError::PdfiumBindingFailed(format!(
                        "{}; system library: {}",
                        auto_err, e
                    ))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdfium_rasterizer_can_be_shared_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfiumRasterizer>();
        assert_send_sync::<crate::convert::Pipeline>();
    }

    #[test]
    fn page_index_is_zero_based() {
        assert_eq!(page_index(1).unwrap(), 0);
        assert_eq!(page_index(12).unwrap(), 11);
    }

    #[test]
    fn page_zero_is_rejected() {
        let err = page_index(0).unwrap_err();
        assert!(matches!(err, ShrinkError::Rasterization { page: 0, .. }));
    }

    #[test]
    fn huge_page_is_rejected() {
        assert!(page_index(usize::from(u16::MAX) + 2).is_err());
    }

    #[test]
    fn default_sizing_is_the_exact_target_box() {
        assert_eq!(
            render_sizing(&OptimizeConfig::default()),
            RenderSizing::Exact {
                width: 800,
                height: 1000
            }
        );
    }

    #[test]
    fn exact_sizing_ignores_dpi() {
        let config = OptimizeConfig::builder()
            .dpi(300)
            .target_width(640)
            .target_height(480)
            .build()
            .unwrap();
        assert_eq!(
            render_sizing(&config),
            RenderSizing::Exact {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn aspect_preserving_sizing_scales_by_dpi_and_caps() {
        let config = OptimizeConfig::builder()
            .dpi(144)
            .preserve_aspect_ratio(true)
            .build()
            .unwrap();
        assert_eq!(
            render_sizing(&config),
            RenderSizing::Bounded {
                scale: 2.0,
                max_width: 800,
                max_height: 1000
            }
        );
    }

    #[test]
    fn oversized_targets_saturate() {
        let config = OptimizeConfig::builder()
            .target_width(u32::MAX)
            .build()
            .unwrap();
        assert!(matches!(
            render_sizing(&config),
            RenderSizing::Exact { width: i32::MAX, height: 1000 }
        ));
    }
}
