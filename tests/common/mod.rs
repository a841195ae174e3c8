//! Shared fixtures for integration tests: synthetic PDFs built with lopdf and
//! a fake rasteriser that paints solid-colour pages, so no pdfium library is
//! needed.

#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use pdfshrink::{OptimizeConfig, PageRasterizer, ShrinkError};
use std::collections::HashSet;
use std::sync::Mutex;

/// A structurally valid PDF with `pages` blank Letter pages.
pub fn synthetic_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A PDF whose pages are each filled with one colour.
///
/// `pages` holds `(colour, (width, height))` per page, sizes in points.
pub fn painted_pdf(pages: &[([u8; 3], (i64, i64))]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for &(color, (width, height)) in pages {
        let [r, g, b] = color.map(|c| f32::from(c) / 255.0);
        let ops = format!("{r:.4} {g:.4} {b:.4} rg 0 0 {width} {height} re f\n");
        let content_id = doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Fake rasteriser: every page becomes a solid-colour JPEG.
///
/// Page `n` is `width + n` pixels wide so tests can tell pages apart by size.
pub struct SolidRasterizer {
    pub color: [u8; 3],
    pub width: u32,
    pub height: u32,
    /// Pages that render to nothing.
    pub empty_pages: HashSet<usize>,
    /// Page whose rendering fails.
    pub fail_page: Option<usize>,
    /// Pages in the order they were requested.
    pub calls: Mutex<Vec<usize>>,
}

impl SolidRasterizer {
    pub fn new(color: [u8; 3]) -> Self {
        Self {
            color,
            width: 40,
            height: 50,
            empty_pages: HashSet::new(),
            fail_page: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_empty_pages(mut self, pages: &[usize]) -> Self {
        self.empty_pages = pages.iter().copied().collect();
        self
    }

    pub fn failing_on(mut self, page: usize) -> Self {
        self.fail_page = Some(page);
        self
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    /// Size of the image produced for `page`.
    pub fn page_size(&self, page: usize) -> (u32, u32) {
        (self.width + page as u32, self.height)
    }
}

impl PageRasterizer for SolidRasterizer {
    fn rasterize(
        &self,
        _pdf: &[u8],
        page: usize,
        config: &OptimizeConfig,
    ) -> Result<Option<Vec<u8>>, ShrinkError> {
        self.calls.lock().unwrap().push(page);

        if self.fail_page == Some(page) {
            return Err(ShrinkError::Rasterization {
                page,
                detail: "simulated renderer failure".into(),
            });
        }
        if self.empty_pages.contains(&page) {
            return Ok(None);
        }

        let (w, h) = self.page_size(page);
        Ok(Some(solid_jpeg(w, h, self.color, config.quality)))
    }
}

pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3], quality: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.max(1))
        .encode_image(&img)
        .unwrap();
    buf
}

/// `(width, height)` of every page's MediaBox, in page order.
pub fn media_boxes(pdf: &[u8]) -> Vec<(i64, i64)> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
            (mb[2].as_i64().unwrap(), mb[3].as_i64().unwrap())
        })
        .collect()
}

/// Decode the image drawn on each page, in page order.
pub fn page_images(pdf: &[u8]) -> Vec<RgbImage> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
            let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
            let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
            let stream = doc.get_object(image_id).unwrap().as_stream().unwrap();
            image::load_from_memory(&stream.content).unwrap().to_rgb8()
        })
        .collect()
}

/// Average colour of an image.
pub fn mean_color(img: &RgbImage) -> [u8; 3] {
    let mut sum = [0u64; 3];
    for px in img.pixels() {
        for c in 0..3 {
            sum[c] += u64::from(px[c]);
        }
    }
    let n = u64::from(img.width() * img.height()).max(1);
    [(sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8]
}

pub fn assert_close(actual: [u8; 3], expected: [u8; 3], tolerance: u8) {
    for c in 0..3 {
        assert!(
            actual[c].abs_diff(expected[c]) <= tolerance,
            "colour {actual:?} not within {tolerance} of {expected:?}"
        );
    }
}
