//! Composition: build a new PDF with one full-page JPEG per page.
//!
//! The JPEG bytes are embedded verbatim as `DCTDecode` image XObjects; they
//! are never decoded and re-encoded. Only the header is parsed, to learn the
//! pixel size and colour components. Each page's MediaBox is the image size
//! in points, and the image is drawn 1:1 at the origin.

use crate::error::ShrinkError;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use tracing::{debug, info};

/// Resource name of the page image inside each page's XObject dictionary.
const IMAGE_NAME: &str = "Im0";

/// Builds a PDF document from an ordered sequence of JPEG images.
///
/// Takes the images by value so they can move into the document without a
/// second copy.
pub trait PdfComposer: Send + Sync {
    fn compose(&self, images: Vec<Vec<u8>>) -> Result<Vec<u8>, ShrinkError>;
}

/// [`PdfComposer`] backed by `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfComposer;

/// Header facts needed to embed a JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegInfo {
    width: u32,
    height: u32,
    grayscale: bool,
}

fn read_jpeg_header(bytes: &[u8]) -> Result<JpegInfo, image::ImageError> {
    let decoder = JpegDecoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions();
    Ok(JpegInfo {
        width,
        height,
        grayscale: matches!(decoder.color_type(), ColorType::L8 | ColorType::L16),
    })
}

impl PdfComposer for LopdfComposer {
    fn compose(&self, images: Vec<Vec<u8>>) -> Result<Vec<u8>, ShrinkError> {
        info!("Composing PDF from {} images", images.len());

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(images.len());

        for (i, jpeg) in images.into_iter().enumerate() {
            let info = read_jpeg_header(&jpeg).map_err(|e| ShrinkError::ImageDecode {
                index: i + 1,
                detail: e.to_string(),
            })?;
            let width = i64::from(info.width);
            let height = i64::from(info.height);

            let image_stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => if info.grayscale { "DeviceGray" } else { "DeviceRGB" },
                    "BitsPerComponent" => 8i64,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            )
            .with_compression(false);
            let image_id = doc.add_object(image_stream);

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            width.into(),
                            0.into(),
                            0.into(),
                            height.into(),
                            0.into(),
                            0.into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_bytes = content
                .encode()
                .map_err(|e| ShrinkError::ComposeFailed(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! {
                        IMAGE_NAME => image_id,
                    },
                },
            });
            kids.push(Object::Reference(page_id));

            debug!("Added page {} ({}x{})", i + 1, width, height);
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
        doc.save_to(&mut out)
            .map_err(|e| ShrinkError::ComposeFailed(e.to_string()))?;
        debug!("Composed PDF: {} bytes", out.len());
        Ok(out)
    }
}
