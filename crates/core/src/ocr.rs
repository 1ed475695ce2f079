use crate::config::OcrConfig;
use crate::error::ExtractionError;
use crate::models::Page;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognizes text on every page of the PDF. Pages without text are omitted.
    async fn recognize(&self, path: &Path) -> Result<Vec<Page>, ExtractionError>;
}

/// Renders pages with `pdftoppm` and reads each image with `tesseract`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub resolution_dpi: u32,
    pub timeout: Duration,
    pub language: Option<String>,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            resolution_dpi: config.resolution_dpi,
            timeout: config.timeout,
            language: config.language.clone(),
        }
    }
}

async fn run_with_timeout(
    mut command: Command,
    step: &str,
    timeout: Duration,
) -> Result<Output, ExtractionError> {
    command.kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| ExtractionError::OcrTimeout {
            step: step.to_string(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|error| ExtractionError::OcrFailed(format!("failed to run {step}: {error}")))?;

    if !output.status.success() {
        return Err(ExtractionError::OcrFailed(format!(
            "{step} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(output)
}

fn rendered_images(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut images = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect::<Vec<_>>();

    // pdftoppm zero-pads page suffixes, so lexical order is page order.
    images.sort_unstable();
    Ok(images)
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, path: &Path) -> Result<Vec<Page>, ExtractionError> {
        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");

        let mut render = Command::new("pdftoppm");
        render
            .arg("-r")
            .arg(self.resolution_dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix);
        run_with_timeout(render, "pdftoppm", self.timeout).await?;

        let images = rendered_images(workdir.path())?;
        debug!(path = %path.display(), images = images.len(), "rendered pages for ocr");

        let mut pages = Vec::new();
        for (index, image) in images.iter().enumerate() {
            let mut recognize = Command::new("tesseract");
            recognize.arg(image).arg("stdout");
            if let Some(language) = &self.language {
                recognize.arg("-l").arg(language);
            }

            let output = run_with_timeout(recognize, "tesseract", self.timeout).await?;
            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !text.is_empty() {
                pages.push(Page {
                    number: index as u32,
                    text,
                });
            }
        }

        Ok(pages)
    }
}

#[derive(Debug, Clone, Serialize)]
struct LlmOcrRequest {
    pdf_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrResponse {
    pages: Option<Vec<LlmOcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrPage {
    /// One-based page number as reported by the endpoint.
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// Multimodal OCR over HTTP: the whole PDF is posted as base64.
pub struct HttpOcr {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpOcr {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ExtractionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcr {
    async fn recognize(&self, path: &Path) -> Result<Vec<Page>, ExtractionError> {
        let pdf = tokio::fs::read(path).await?;
        let payload = LlmOcrRequest {
            pdf_base64: STANDARD.encode(pdf),
            source_path: path.to_string_lossy().to_string(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(ExtractionError::OcrFailed(format!(
                "multimodal OCR request to {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let payload: LlmOcrResponse = response.json().await?;
        Ok(payload_to_pages(&payload))
    }
}

fn payload_to_pages(payload: &LlmOcrResponse) -> Vec<Page> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .enumerate()
            .filter_map(|(position, page)| {
                let text = page.text.as_deref().map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    return None;
                }
                let number = page
                    .page
                    .map(|number| number.saturating_sub(1))
                    .unwrap_or(position as u32);
                Some(Page {
                    number,
                    text: text.to_string(),
                })
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return listed;
        }
    }

    payload
        .text
        .as_deref()
        .unwrap_or_default()
        .split('\u{000c}')
        .enumerate()
        .filter_map(|(index, chunk)| {
            let normalized = chunk.trim();
            if normalized.is_empty() {
                None
            } else {
                Some(Page {
                    number: index as u32,
                    text: normalized.to_string(),
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{payload_to_pages, rendered_images, LlmOcrPage, LlmOcrResponse};
    use std::fs;

    #[test]
    fn ocr_payload_with_pages_converts_only_nonempty_text() {
        let response = LlmOcrResponse {
            pages: Some(vec![
                LlmOcrPage {
                    page: Some(2),
                    text: Some("  ".to_string()),
                },
                LlmOcrPage {
                    page: Some(3),
                    text: Some("Page 3".to_string()),
                },
            ]),
            text: None,
        };

        let pages = payload_to_pages(&response);

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 2);
        assert_eq!(pages[0].text, "Page 3");
    }

    #[test]
    fn ocr_payload_fallback_text_split_by_form_feed() {
        let response = LlmOcrResponse {
            pages: None,
            text: Some("First\u{000C}Second\n".to_string()),
        };

        let pages = payload_to_pages(&response);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 0);
        assert_eq!(pages[0].text, "First");
        assert_eq!(pages[1].number, 1);
        assert_eq!(pages[1].text, "Second");
    }

    #[test]
    fn empty_payload_yields_no_pages() {
        let response = LlmOcrResponse {
            pages: Some(Vec::new()),
            text: None,
        };

        assert!(payload_to_pages(&response).is_empty());
    }

    #[test]
    fn rendered_images_are_sorted_and_filtered() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("page-02.png"), b"")?;
        fs::write(dir.path().join("page-01.png"), b"")?;
        fs::write(dir.path().join("notes.txt"), b"")?;

        let images = rendered_images(dir.path())?;
        let names: Vec<_> = images
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(names, vec!["page-01.png", "page-02.png"]);
        Ok(())
    }
}
