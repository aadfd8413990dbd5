//! Source document text: plain-text extraction and topic splitting.

mod topics;

pub use topics::{DEFAULT_TOPIC_HEADERS, Topic, TopicSplitter};

use multigrade_abstraction::{DocumentHandle, ExtractionError, TextExtractor};

/// Extracts text from UTF-8 documents (`.txt`, `.md`, text dumps of PDFs).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, document: &DocumentHandle) -> Result<String, ExtractionError> {
        let not_text = |reason: &str| ExtractionError::NotTextDerivable {
            name: document.name.clone(),
            reason: reason.to_string(),
        };
        // NUL bytes mark binary content such as a scanned image.
        if document.bytes.contains(&0) {
            return Err(not_text("document contains binary data"));
        }
        let text = std::str::from_utf8(&document.bytes).map_err(|_| not_text("document is not valid UTF-8"))?;
        let text = text.trim_start_matches('\u{feff}');
        if text.trim().is_empty() {
            return Err(not_text("document contains no text"));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(bytes: &[u8]) -> DocumentHandle {
        DocumentHandle { name: "chapter.txt".into(), bytes: bytes.to_vec() }
    }

    #[test]
    fn test_extracts_utf8_and_strips_bom() {
        let text = PlainTextExtractor.extract(&doc("\u{feff}Two Little Hands".as_bytes())).unwrap();
        assert_eq!(text, "Two Little Hands");
    }

    #[test]
    fn test_rejects_binary_and_empty() {
        for bytes in [&[0x89, b'P', b'N', b'G', 0x00][..], &[0xff, 0xfe, 0xfd][..], b"   \n"] {
            assert!(matches!(
                PlainTextExtractor.extract(&doc(bytes)),
                Err(ExtractionError::NotTextDerivable { .. })
            ));
        }
    }
}
