//! Shared processing template.
//!
//! Every [`DocumentProcessor`] runs the same sequence around its format-specific
//! `extract` step:
//!
//! 1. Option validation, existence and size checks (returned as `Err`)
//! 2. `Pending -> Processing`
//! 3. Container signature check
//! 4. Content read and extraction, cancellable between units
//! 5. TLP classification and truncation
//! 6. `Completed`, or `Failed` with the error recorded on the document

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::core::config::ProcessingOptions;
use crate::core::{formats, io};
use crate::plugins::DocumentProcessor;
use crate::text::truncate::{cut_splits_marker, truncate_chars};
use crate::types::{ContentFidelity, Document, Extraction, ProcessingWarning, WarningCode};
use crate::{Result, ThreatdocError, tlp};

/// Run `processor` over `path`.
///
/// # Errors
///
/// Returns `Err` only for preconditions: invalid options, `NotFound`,
/// `SizeExceeded`. Everything after the attempt begins is captured on the
/// returned document.
pub async fn run<P>(processor: &P, path: &Path, options: &ProcessingOptions, cancel: &CancellationToken) -> Result<Document>
where
    P: DocumentProcessor + ?Sized,
{
    options.validate()?;
    let size_bytes = io::check_preconditions(path, options.max_file_size_mb).await?;

    let mut document = Document::new(path);
    document.size_bytes = size_bytes;
    document.processor = Some(processor.name().to_string());
    document.mime_type = formats::mime_type_for(path).map(str::to_string);
    document.begin()?;

    tracing::debug!(
        file = %document.file_name,
        processor = processor.name(),
        size_bytes,
        "Processing document"
    );

    match attempt(processor, path, options, cancel).await {
        Ok(extraction) => finish(&mut document, extraction, options)?,
        Err(ThreatdocError::PasswordProtected(message)) if options.skip_password_protected => {
            document.is_password_protected = true;
            document.warn(
                ProcessingWarning::new(WarningCode::PasswordSkipped, "Password-protected document skipped")
                    .with_context(message),
            )?;
            document.tlp = tlp::resolve("", options);
            document.complete()?;
        }
        Err(err) => {
            tracing::warn!(
                file = %document.file_name,
                processor = processor.name(),
                kind = %err.kind(),
                "Document processing failed: {}",
                err
            );
            document.fail(&err)?;
        }
    }

    Ok(document)
}

async fn attempt<P>(
    processor: &P,
    path: &Path,
    options: &ProcessingOptions,
    cancel: &CancellationToken,
) -> Result<Extraction>
where
    P: DocumentProcessor + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(ThreatdocError::Cancelled);
    }

    if !processor.validate(path).await? {
        return Err(ThreatdocError::validation(format!(
            "{} does not carry a valid signature for {}",
            path.display(),
            processor.name()
        )));
    }

    let content = io::read_file_async(path).await?;

    if cancel.is_cancelled() {
        return Err(ThreatdocError::Cancelled);
    }

    let extraction = processor.extract(&content, path, options, cancel).await?;

    if cancel.is_cancelled() {
        return Err(ThreatdocError::Cancelled);
    }

    Ok(extraction)
}

fn finish(document: &mut Document, extraction: Extraction, options: &ProcessingOptions) -> Result<()> {
    let Extraction {
        text,
        page_count,
        mut metadata,
        is_scanned,
        fidelity,
        warnings,
    } = extraction;

    for warning in warnings {
        document.warn(warning)?;
    }

    // Classification sees the whole text, including anything truncation removes.
    document.tlp = match fidelity {
        ContentFidelity::Full => tlp::resolve(&text, options),
        ContentFidelity::Degraded { .. } => tlp::resolve("", options),
    };

    let text = if options.extract_text_content { text } else { String::new() };
    let original_length = text.chars().count();
    let limit = options.max_text_content_length;
    let text = match truncate_chars(&text, limit) {
        Some(truncated) => {
            let mut warning = ProcessingWarning::new(
                WarningCode::TextTruncated,
                format!("Extracted text truncated from {} to {} characters", original_length, limit),
            );
            if cut_splits_marker(&text, limit) {
                warning = warning.with_context("cut falls inside a section marker line");
            }
            document.warn(warning)?;
            truncated
        }
        None => text,
    };
    document.set_text(text)?;

    document.page_count = page_count;
    document.is_scanned = is_scanned;

    if options.extract_metadata {
        if metadata.mime_type.is_none() {
            metadata.mime_type = document.mime_type.clone();
        }
        if !fidelity.is_degraded() && metadata.page_count.is_none() {
            metadata.page_count = Some(page_count);
        }
        document.metadata = metadata;
    } else {
        document.metadata.mime_type = document.mime_type.clone();
    }

    if let ContentFidelity::Degraded { reason } = &fidelity {
        document.warn(ProcessingWarning::new(WarningCode::LegacyFormat, reason.clone()))?;
    }
    document.fidelity = fidelity;

    document.complete()?;

    tracing::debug!(
        file = %document.file_name,
        pages = document.page_count,
        chars = document.text_length,
        tlp = %document.tlp,
        "Document completed"
    );

    Ok(())
}
