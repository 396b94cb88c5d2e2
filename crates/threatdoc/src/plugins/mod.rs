//! Plugin system for format strategies and OCR backends.
//!
//! # Plugin Types
//!
//! - [`Plugin`] - Base trait that all plugins must implement
//! - [`DocumentProcessor`] - Format strategies selected by extension and priority
//! - [`OcrBackend`] - OCR engines used for scanned content
//! - [`ProcessorPlugin`] - Runtime-loaded bundles of strategies, managed by [`PluginHost`]
//!
//! # Lifecycle Pattern
//!
//! Strategies are stored as `Arc<dyn DocumentProcessor>` and shared across
//! concurrent processing calls. Registration calls [`Plugin::initialize`];
//! unregistration calls [`Plugin::shutdown`].
//!
//! ```rust
//! use async_trait::async_trait;
//! use std::path::Path;
//! use std::sync::Arc;
//! use threatdoc::plugins::{DocumentProcessor, Plugin, StrategyRegistry};
//! use threatdoc::types::Extraction;
//! use threatdoc::{CancellationToken, ProcessingOptions, Result};
//!
//! struct MarkdownProcessor;
//!
//! impl Plugin for MarkdownProcessor {
//!     fn name(&self) -> &str { "markdown" }
//!     fn version(&self) -> String { "1.0.0".to_string() }
//!     fn initialize(&self) -> Result<()> { Ok(()) }
//!     fn shutdown(&self) -> Result<()> { Ok(()) }
//! }
//!
//! #[async_trait]
//! impl DocumentProcessor for MarkdownProcessor {
//!     fn supported_extensions(&self) -> Vec<String> {
//!         vec!["md".to_string()]
//!     }
//!
//!     async fn validate(&self, _path: &Path) -> Result<bool> {
//!         Ok(true)
//!     }
//!
//!     async fn extract(
//!         &self,
//!         content: &[u8],
//!         _path: &Path,
//!         _options: &ProcessingOptions,
//!         _cancel: &CancellationToken,
//!     ) -> Result<Extraction> {
//!         Ok(Extraction {
//!             text: String::from_utf8_lossy(content).into_owned(),
//!             page_count: 1,
//!             ..Default::default()
//!         })
//!     }
//! }
//!
//! let mut registry = StrategyRegistry::new();
//! registry.register(Arc::new(MarkdownProcessor))?;
//! assert!(registry.get(Path::new("notes.MD")).is_some());
//! # Ok::<(), threatdoc::ThreatdocError>(())
//! ```

#[cfg(feature = "dynamic-plugins")]
pub mod abi;
pub mod host;
mod ocr;
mod processor;
pub mod registry;
mod traits;

pub use host::{
    LoadedLibrary, PluginContext, PluginDescriptor, PluginFactory, PluginHost, PluginLoadFailure, PluginLoadReport,
    PluginLoader, ProcessorPlugin, StrategyInfo,
};
pub use ocr::OcrBackend;
pub use processor::DocumentProcessor;
pub use registry::{
    StrategyRegistration, StrategyRegistry, get_strategy_registry, register_strategy, supported_extensions,
    unregister_strategy,
};
pub use traits::Plugin;
