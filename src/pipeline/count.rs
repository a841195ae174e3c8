//! Page counting: how many pages does the source document have?

use crate::error::ShrinkError;
use lopdf::Document;
use tracing::info;

/// Returns the number of pages in a PDF.
pub trait PageCounter: Send + Sync {
    fn count_pages(&self, pdf: &[u8]) -> Result<usize, ShrinkError>;
}

/// [`PageCounter`] backed by `lopdf`'s page tree walk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfPageCounter;

impl PageCounter for LopdfPageCounter {
    fn count_pages(&self, pdf: &[u8]) -> Result<usize, ShrinkError> {
        let document = Document::load_mem(pdf).map_err(|e| ShrinkError::DocumentParse {
            detail: e.to_string(),
        })?;
        let count = document.get_pages().len();
        info!("PDF loaded: {} pages", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    fn blank_pdf(pages: usize) -> Vec<u8> {
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

    #[test]
    fn counts_pages() {
        assert_eq!(LopdfPageCounter.count_pages(&blank_pdf(3)).unwrap(), 3);
        assert_eq!(LopdfPageCounter.count_pages(&blank_pdf(1)).unwrap(), 1);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = LopdfPageCounter
            .count_pages(b"definitely not a pdf")
            .unwrap_err();
        assert!(matches!(err, ShrinkError::DocumentParse { .. }), "got: {err:?}");
    }
}
