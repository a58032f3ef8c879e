//! Per-page text extraction from PDF uploads.
//!
//! Extraction returns plain UTF-8 text per page. Pages that yield no text
//! (scanned images, blank pages) are skipped but still counted in
//! [`ExtractedPdf::page_count`], so page numbers on the remaining pages stay
//! true to the source file.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use crate::models::PageText;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Text of an uploaded PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPdf {
    /// Non-empty pages in document order.
    pub pages: Vec<PageText>,
    /// Total number of pages in the file, including empty ones.
    pub page_count: usize,
}

/// Extract text page by page.
///
/// `pdf-extract` panics on some malformed documents (missing `/MediaBox`,
/// unresolved fonts). Those panics are caught and reported as
/// [`ExtractError::Pdf`] like any other parse failure.
pub fn extract_pages(bytes: &[u8]) -> Result<ExtractedPdf, ExtractError> {
    let raw_pages = std::panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|payload| ExtractError::Pdf(panic_message(payload.as_ref())))?
    .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let page_count = raw_pages.len();
    let pages = raw_pages
        .into_iter()
        .enumerate()
        .filter_map(|(idx, text)| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(PageText {
                    number: idx as u32 + 1,
                    text: trimmed.to_string(),
                })
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(page_count, non_empty = pages.len(), "extracted PDF text");
    Ok(ExtractedPdf { pages, page_count })
}

/// Non-failing variant of [`extract_pages`]: a malformed PDF, including one
/// that trips a parser panic, is logged and yields no pages.
pub fn read_pdf(bytes: &[u8]) -> ExtractedPdf {
    match extract_pages(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::error!("Error reading PDF: {}", e);
            ExtractedPdf::default()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown error".to_string());
    format!("malformed PDF ({})", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    /// Assemble a PDF from object bodies numbered from 1; object 1 is the root.
    fn pdf_from_objects(bodies: &[&str]) -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
        for off in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                bodies.len() + 1,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    const CONTENT: &str = "<< /Length 36 >>\nstream\nBT /F1 12 Tf 72 720 Td (Hello) Tj ET\nendstream";

    fn page_without_media_box() -> Vec<u8> {
        pdf_from_objects(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> >> >>",
            CONTENT,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
        ])
    }

    fn page_with_unresolved_font() -> Vec<u8> {
        pdf_from_objects(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
             /Resources << >> >>",
            CONTENT,
        ])
    }

    #[test]
    fn parser_panics_become_errors() {
        for (label, bytes) in [
            ("no media box", page_without_media_box()),
            ("unresolved font", page_with_unresolved_font()),
        ] {
            let result = extract_pages(&bytes);
            assert!(
                matches!(result, Err(ExtractError::Pdf(_))),
                "{}: {:?}",
                label,
                result
            );
            let doc = read_pdf(&bytes);
            assert!(doc.pages.is_empty(), "{}", label);
        }
    }

    #[test]
    fn read_pdf_degrades_to_empty() {
        let doc = read_pdf(b"%PDF-1.4 truncated garbage");
        assert!(doc.pages.is_empty());
        assert_eq!(doc.page_count, 0);
    }
}
