//! Threat-intelligence document processing.
//!
//! Threatdoc turns incident reports, advisories and indicator spreadsheets into
//! plain text with a Traffic Light Protocol designation attached. Format
//! strategies (PDF, Word, Excel, and anything loaded from a plugin library) are
//! selected by extension and priority, run through one shared template, and
//! produce a [`Document`] that either completed or failed with a recorded error.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use threatdoc::{CancellationToken, ProcessingOptions, process_file};
//!
//! # async fn example() -> threatdoc::Result<()> {
//! let options = ProcessingOptions::default();
//! let document = process_file("advisory.pdf", &options, &CancellationToken::new()).await?;
//!
//! if document.is_completed() {
//!     println!("{} [{}]", document.file_name, document.tlp);
//!     println!("{}", document.extracted_text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! `process_file` returns `Err` only when the request itself is unusable: the
//! file is missing, too large, or has no registered strategy. Everything that
//! goes wrong while reading the content is recorded on the returned document.

#![deny(unsafe_code)]

pub mod core;
pub mod error;
#[cfg(any(feature = "office", feature = "excel"))]
pub mod extraction;
pub mod ocr;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod plugins;
pub mod processors;
pub mod text;
pub mod tlp;
pub mod types;

pub use error::{ErrorKind, Result, ThreatdocError};
pub use types::{
    ContentFidelity, Document, DocumentMetadata, DocumentStatus, Extraction, ProcessingError, ProcessingWarning,
    TlpDesignation, WarningCode,
};

pub use core::config::{OcrSettings, PipelineConfig, PluginSettings, ProcessingOptions};
pub use core::formats::{mime_type_for, mime_type_for_extension};
pub use core::processor::{
    batch_process_files, batch_process_files_with_registry, process_file, process_file_with_registry,
};

pub use plugins::registry::get_strategy_registry;

pub use tokio_util::sync::CancellationToken;
