//! PDF text extraction and upload filename handling

use std::path::Path;

use crate::error::{Error, Result};

const NO_TEXT: &str = "Could not extract text from PDF";

/// Plain-text extraction from PDF bytes
///
/// Pages are read one by one with `lopdf`; a page that fails is logged and
/// skipped. When no page yields text, `pdf-extract` gets a pass over the
/// whole document.
pub struct PdfExtractor;

impl PdfExtractor {
    /// Read a saved PDF and extract its text off the async runtime
    pub async fn extract_file(path: &Path) -> Result<String> {
        let data = tokio::fs::read(path).await?;
        Self::extract(data).await
    }

    /// Extract text off the async runtime
    pub async fn extract(data: Vec<u8>) -> Result<String> {
        tokio::task::spawn_blocking(move || Self::extract_blocking(&data))
            .await
            .map_err(|e| Error::Internal(format!("PDF extraction task failed: {}", e)))?
    }

    /// Synchronous extraction
    pub fn extract_blocking(data: &[u8]) -> Result<String> {
        let text = match Self::extract_pages(data) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("Page extraction produced no text, trying pdf-extract");
                Self::extract_whole(data)?
            }
            Err(e) => {
                tracing::warn!("lopdf could not load PDF: {}, trying pdf-extract", e);
                Self::extract_whole(data)?
            }
        };

        if text.trim().is_empty() {
            return Err(Error::input(NO_TEXT));
        }
        Ok(text)
    }

    fn extract_pages(data: &[u8]) -> std::result::Result<String, lopdf::Error> {
        let doc = lopdf::Document::load_mem(data)?;
        let pages = doc.get_pages();
        let mut text = String::new();

        for &page_num in pages.keys() {
            match doc.extract_text(&[page_num]) {
                Ok(page_text) => {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&page_text);
                    tracing::info!("Processed page {}", page_num);
                }
                Err(e) => tracing::error!("Error processing page {}: {}", page_num, e),
            }
        }

        Ok(text)
    }

    fn extract_whole(data: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(data).map_err(|e| {
            tracing::warn!("pdf-extract failed: {}", e);
            Error::input(NO_TEXT)
        })
    }
}

/// Whether an uploaded filename names a PDF
pub fn is_pdf_filename(name: &str) -> bool {
    name.ends_with(".pdf")
}

/// Keep ASCII alphanumerics and `- _ .`; an empty result is rejected
pub fn sanitize_filename(name: &str) -> Result<String> {
    let safe: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let safe = safe.trim_end().to_string();

    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        return Err(Error::input(format!("Invalid filename: {:?}", name)));
    }
    Ok(safe)
}
