//! PDF processor.
//!
//! Text comes from the page content streams. When no page carries embedded text
//! and OCR is enabled, the image XObjects of each page are handed to the
//! configured [`OcrBackend`] instead and the document is flagged as scanned.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::config::ProcessingOptions;
use crate::core::io::{PDF_SIGNATURE, has_signature};
use crate::pdf::error::{PdfError, Result as PdfResult};
use crate::pdf::images::{PageImages, page_images};
use crate::pdf::text::{PageText, assemble, extract_pages, is_blank};
use crate::pdf::{extract_metadata, load_document};
use crate::plugins::{DocumentProcessor, OcrBackend, Plugin};
use crate::types::{DocumentMetadata, Extraction, ProcessingWarning, WarningCode};
use crate::{Result, ThreatdocError};

struct ParsedPdf {
    pages: Vec<PageText>,
    metadata: Option<PdfResult<DocumentMetadata>>,
    page_images: Vec<(u32, PageImages)>,
}

fn parse_pdf(
    content: &[u8],
    password: Option<&str>,
    want_metadata: bool,
    collect_images: bool,
    cancel: &CancellationToken,
) -> PdfResult<ParsedPdf> {
    let document = load_document(content, password)?;
    let pages = extract_pages(&document, cancel)?;
    let metadata = want_metadata.then(|| extract_metadata(&document));

    let mut images = Vec::new();
    if collect_images && is_blank(&pages) {
        for (number, page_id) in document.get_pages() {
            if cancel.is_cancelled() {
                return Err(PdfError::Cancelled);
            }
            images.push((number, page_images(&document, page_id)));
        }
    }

    Ok(ParsedPdf {
        pages,
        metadata,
        page_images: images,
    })
}

/// Marker line opening a page whose text came from OCR.
pub fn ocr_page_marker(number: u32) -> String {
    format!("--- Page {} (OCR) ---", number)
}

/// Built-in PDF strategy with an optional OCR fallback.
#[derive(Default)]
pub struct PdfProcessor {
    ocr: Mutex<Option<Arc<dyn OcrBackend>>>,
}

impl PdfProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ocr(backend: Arc<dyn OcrBackend>) -> Self {
        Self {
            ocr: Mutex::new(Some(backend)),
        }
    }

    fn ocr_backend(&self) -> Option<Arc<dyn OcrBackend>> {
        self.ocr.lock().clone()
    }

    /// Run OCR over the collected page images.
    ///
    /// Returns `None` when no usable backend is configured; the caller keeps the
    /// native (empty) text in that case.
    async fn recognize_pages(
        &self,
        pages: Vec<(u32, PageImages)>,
        options: &ProcessingOptions,
        cancel: &CancellationToken,
        warnings: &mut Vec<ProcessingWarning>,
    ) -> Result<Option<String>> {
        let Some(backend) = self.ocr_backend().filter(|backend| backend.is_available()) else {
            tracing::warn!("PDF has no embedded text and no OCR backend is available");
            warnings.push(ProcessingWarning::new(
                WarningCode::OcrUnavailable,
                "No embedded text found and OCR is unavailable; text left empty",
            ));
            return Ok(None);
        };

        let min_confidence = options.ocr_min_confidence;
        let mut sections = Vec::with_capacity(pages.len());

        for (number, page) in pages {
            if cancel.is_cancelled() {
                return Err(ThreatdocError::Cancelled);
            }

            for reason in page.skipped {
                warnings.push(
                    ProcessingWarning::new(
                        WarningCode::UnsupportedImage,
                        format!("Image on page {} skipped for OCR", number),
                    )
                    .with_context(reason),
                );
            }

            let mut texts = Vec::new();
            for image in page.images {
                match backend
                    .process_image(&image.bytes, &options.ocr_language, min_confidence)
                    .await
                {
                    Ok(result) if result.success => {
                        if result.is_below_threshold(min_confidence) {
                            warnings.push(
                                ProcessingWarning::new(
                                    WarningCode::LowOcrConfidence,
                                    format!(
                                        "OCR confidence {:.0}% on page {} is below the {}% threshold",
                                        result.confidence * 100.0,
                                        number,
                                        min_confidence
                                    ),
                                )
                                .with_context(format!("object {} {}", image.object_id.0, image.object_id.1)),
                            );
                        }
                        if !result.text.trim().is_empty() {
                            texts.push(result.text);
                        }
                    }
                    Ok(result) => {
                        let mut warning =
                            ProcessingWarning::new(WarningCode::OcrFailed, format!("OCR failed on page {}", number));
                        if let Some(message) = result.error_message {
                            warning = warning.with_context(message);
                        }
                        warnings.push(warning);
                    }
                    Err(ThreatdocError::Cancelled) => return Err(ThreatdocError::Cancelled),
                    Err(e) => {
                        tracing::warn!(page = number, error = %e, "OCR failed");
                        warnings.push(
                            ProcessingWarning::new(WarningCode::OcrFailed, format!("OCR failed on page {}", number))
                                .with_cause(&e),
                        );
                    }
                }
            }

            tracing::debug!(page = number, segments = texts.len(), "OCR page done");
            sections.push(if texts.is_empty() {
                ocr_page_marker(number)
            } else {
                format!("{}\n{}", ocr_page_marker(number), texts.join("\n"))
            });
        }

        Ok(Some(sections.join("\n\n")))
    }
}

impl Plugin for PdfProcessor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn initialize(&self) -> Result<()> {
        match self.ocr_backend() {
            Some(backend) => backend.initialize(),
            None => Ok(()),
        }
    }

    fn shutdown(&self) -> Result<()> {
        let backend = self.ocr.lock().take();
        match backend {
            Some(backend) => backend.shutdown(),
            None => Ok(()),
        }
    }

    fn description(&self) -> &str {
        "PDF documents with OCR fallback for scanned pages"
    }
}

#[async_trait]
impl DocumentProcessor for PdfProcessor {
    fn supported_extensions(&self) -> Vec<String> {
        vec!["pdf".to_string()]
    }

    async fn validate(&self, path: &Path) -> Result<bool> {
        has_signature(path, PDF_SIGNATURE).await
    }

    async fn extract(
        &self,
        content: &[u8],
        _path: &Path,
        options: &ProcessingOptions,
        cancel: &CancellationToken,
    ) -> Result<Extraction> {
        let bytes = content.to_vec();
        // Skipping protected files means no password attempt at all.
        let password = if options.skip_password_protected {
            None
        } else {
            options.default_password.clone()
        };
        let want_metadata = options.extract_metadata;
        let want_ocr = options.enable_ocr && options.extract_text_content;
        let task_cancel = cancel.clone();

        let parsed = tokio::task::spawn_blocking(move || {
            parse_pdf(&bytes, password.as_deref(), want_metadata, want_ocr, &task_cancel)
        })
        .await
        .map_err(|e| ThreatdocError::Other(format!("PDF extraction task failed: {}", e)))??;

        let mut warnings = Vec::new();
        let metadata = match parsed.metadata {
            Some(Ok(metadata)) => metadata,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "PDF metadata unavailable");
                warnings.push(
                    ProcessingWarning::new(WarningCode::MetadataUnavailable, "PDF metadata could not be read")
                        .with_cause(&e),
                );
                DocumentMetadata::default()
            }
            None => DocumentMetadata::default(),
        };

        let page_count = parsed.pages.len();
        let is_scanned = want_ocr && is_blank(&parsed.pages);
        let text = if is_scanned {
            match self
                .recognize_pages(parsed.page_images, options, cancel, &mut warnings)
                .await?
            {
                Some(text) => text,
                None => assemble(&parsed.pages),
            }
        } else {
            assemble(&parsed.pages)
        };

        Ok(Extraction {
            text,
            page_count,
            metadata,
            is_scanned,
            warnings,
            ..Default::default()
        })
    }
}
