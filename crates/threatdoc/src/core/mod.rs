//! Core processing orchestration.
//!
//! - **Entry points**: [`process_file`](processor::process_file) and
//!   [`batch_process_files`](processor::batch_process_files)
//! - **Pipeline**: the shared template every strategy runs through
//! - **Formats**: extension to MIME mapping
//! - **Configuration**: processing options and pipeline config files
//! - **I/O**: precondition checks and signature sniffing

pub mod config;
pub mod formats;
pub mod io;
pub mod pipeline;
pub mod processor;

pub use config::{OcrSettings, PipelineConfig, PluginSettings, ProcessingOptions};
