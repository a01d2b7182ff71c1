//! PDF text extraction module
//!
//! Extracts text content from PDF bytes using lopdf. Pages are decoded with
//! lopdf's font-aware extractor first; pages it cannot decode fall back to a
//! walk over the raw text-showing operators of the content stream.

use crate::errors::WorkerError;
use lopdf::content::Content;
use lopdf::{Document, Object};
use tracing::{debug, warn};

/// Opaque `extract(bytes) -> text` capability
pub trait TextExtractor: Send + Sync {
    fn extract(&self, data: &[u8]) -> Result<String, WorkerError>;
}

/// lopdf-backed extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, WorkerError> {
        extract_text_from_pdf(data)
    }
}

/// Extract text content from PDF bytes
pub fn extract_text_from_pdf(data: &[u8]) -> Result<String, WorkerError> {
    let doc = Document::load_mem(data)
        .map_err(|e| WorkerError::InvalidDocument(format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages {
        match extract_page_text(&doc, page_num, page_id) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        return Err(WorkerError::EmptyText);
    }

    debug!(
        original_len = text.len(),
        cleaned_len = cleaned.len(),
        "Text extraction complete"
    );

    Ok(cleaned)
}

fn extract_page_text(doc: &Document, page_num: u32, page_id: lopdf::ObjectId) -> Result<String, String> {
    if let Ok(text) = doc.extract_text(&[page_num]) {
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }

    let content = doc.get_page_content(page_id).map_err(|e| e.to_string())?;
    let content = Content::decode(&content).map_err(|e| e.to_string())?;
    Ok(text_from_operations(&content))
}

/// Collect strings shown by Tj, TJ, ' and " inside BT/ET blocks
fn text_from_operations(content: &Content) -> String {
    let mut text = String::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" | "'" | "\"" => {
                if let Some(Object::String(bytes, _)) = op.operands.last() {
                    text.push_str(&decode_pdf_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        if let Object::String(bytes, _) = item {
                            text.push_str(&decode_pdf_string(bytes));
                        }
                    }
                }
            }
            "ET" => text.push(' '),
            _ => {}
        }
    }

    text
}

/// UTF-16BE when BOM-prefixed, otherwise one byte per character
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Clean extracted text
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    /// Minimal single-page PDF showing `text` in Courier
    pub(crate) fn pdf_with_text(text: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
        pdf_with_content(content.as_bytes())
    }

    pub(crate) fn pdf_with_content(content: &[u8]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extracts_page_text() {
        let text = extract_text_from_pdf(&pdf_with_text("Hello VaultDrop")).unwrap();
        assert!(text.contains("Hello VaultDrop"), "got {:?}", text);
    }

    #[test]
    fn test_page_without_text_is_empty_error() {
        let pdf = pdf_with_content(b"0 0 m 100 100 l S");
        assert!(matches!(extract_text_from_pdf(&pdf), Err(WorkerError::EmptyText)));
    }

    #[test]
    fn test_garbage_is_invalid_document() {
        let err = extract_text_from_pdf(b"not a valid pdf content").unwrap_err();
        assert!(matches!(err, WorkerError::InvalidDocument(_)));
    }

    #[test]
    fn test_operator_walk() {
        let content = Content::decode(b"BT (Hello) Tj [(Wor) -20 (ld)] TJ ET").unwrap();
        assert_eq!(text_from_operations(&content).trim(), "HelloWorld");
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"plain"), "plain");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
    }

    #[test]
    fn test_clean_text() {
        let input = "Hello   World\n\n  Test \u{FEFF}";
        assert_eq!(clean_text(input), "Hello World\nTest");
    }
}
