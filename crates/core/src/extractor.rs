use crate::error::ExtractionError;
use crate::models::Page;
use crate::ocr::OcrEngine;
use async_trait::async_trait;
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait PdfExtractor: Send + Sync {
    /// Pages in document order, numbered from zero.
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, ExtractionError>;

    /// Non-empty page texts joined by newline.
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let pages = self.extract_pages(path).await?;
        let text = pages
            .iter()
            .map(|page| page.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(ExtractionError::NoText(path.display().to_string()));
        }
        Ok(text)
    }
}

/// Direct text extraction through lopdf, with an optional OCR fallback used
/// when no page yields any text.
#[derive(Default, Clone)]
pub struct LopdfExtractor {
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl LopdfExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ocr(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr: Some(ocr) }
    }
}

fn read_text_layer(path: &Path) -> Result<Vec<Page>, ExtractionError> {
    let document = Document::load(path).map_err(|error| ExtractionError::Open {
        path: path.display().to_string(),
        details: error.to_string(),
    })?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = match document.extract_text(&[page_no]) {
            Ok(text) => text,
            Err(error) => {
                warn!(path = %path.display(), page = page_no, %error, "page text extraction failed");
                String::new()
            }
        };

        pages.push(Page {
            number: page_no.saturating_sub(1),
            text,
        });
    }

    Ok(pages)
}

#[async_trait]
impl PdfExtractor for LopdfExtractor {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, ExtractionError> {
        let owned: PathBuf = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || read_text_layer(&owned))
            .await
            .map_err(std::io::Error::from)??;

        if pages.iter().any(|page| !page.text.trim().is_empty()) {
            return Ok(pages);
        }

        let Some(ocr) = &self.ocr else {
            return Err(ExtractionError::NoText(path.display().to_string()));
        };

        info!(path = %path.display(), pages = pages.len(), "no text layer, falling back to ocr");
        let recognized = ocr
            .recognize(path)
            .await?
            .into_iter()
            .filter(|page| !page.text.trim().is_empty())
            .collect::<Vec<_>>();

        if recognized.is_empty() {
            return Err(ExtractionError::NoText(path.display().to_string()));
        }

        Ok(recognized)
    }
}
