//! Strategy selection across built-in and custom processors.

#![cfg(all(feature = "pdf", feature = "office", feature = "excel"))]

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serial_test::serial;
use tempfile::TempDir;
use threatdoc::plugins::{DocumentProcessor, Plugin, StrategyRegistry};
use threatdoc::types::Extraction;
use threatdoc::{
    CancellationToken, DocumentStatus, ProcessingOptions, Result, ThreatdocError, process_file_with_registry,
};

struct StubProcessor {
    name: &'static str,
    extensions: &'static [&'static str],
    priority: i32,
    shutdowns: AtomicUsize,
}

impl StubProcessor {
    fn new(name: &'static str, extensions: &'static [&'static str], priority: i32) -> Arc<Self> {
        Arc::new(Self {
            name,
            extensions,
            priority,
            shutdowns: AtomicUsize::new(0),
        })
    }
}

impl Plugin for StubProcessor {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentProcessor for StubProcessor {
    fn supported_extensions(&self) -> Vec<String> {
        self.extensions.iter().map(|e| e.to_string()).collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn validate(&self, _path: &Path) -> Result<bool> {
        Ok(true)
    }

    async fn extract(
        &self,
        _content: &[u8],
        _path: &Path,
        _options: &ProcessingOptions,
        _cancel: &CancellationToken,
    ) -> Result<Extraction> {
        Ok(Extraction {
            text: format!("handled by {}", self.name),
            page_count: 1,
            ..Default::default()
        })
    }
}

fn selected(registry: &StrategyRegistry, file: &str) -> Option<String> {
    registry.get(Path::new(file)).map(|p| p.name().to_string())
}

#[test]
fn test_higher_priority_wins() {
    let mut registry = StrategyRegistry::new();
    registry.register(StubProcessor::new("baseline", &["pdf"], 50)).unwrap();
    registry.register(StubProcessor::new("vendor", &["pdf"], 80)).unwrap();
    registry.register(StubProcessor::new("fallback", &["pdf"], 10)).unwrap();

    assert_eq!(selected(&registry, "report.pdf").as_deref(), Some("vendor"));
}

#[test]
fn test_equal_priority_keeps_first_registered() {
    let mut registry = StrategyRegistry::new();
    registry.register(StubProcessor::new("first", &["docx"], 50)).unwrap();
    registry.register(StubProcessor::new("second", &["docx"], 50)).unwrap();

    assert_eq!(selected(&registry, "brief.docx").as_deref(), Some("first"));
    assert_eq!(selected(&registry, "BRIEF.DOCX").as_deref(), Some("first"));
}

#[test]
fn test_duplicate_name_is_ignored() {
    let mut registry = StrategyRegistry::new();
    assert!(registry.register(StubProcessor::new("word", &["docx"], 50)).unwrap());
    assert!(!registry.register(StubProcessor::new("word", &["doc"], 90)).unwrap());

    assert_eq!(registry.len(), 1);
    assert!(selected(&registry, "legacy.doc").is_none());
}

#[test]
fn test_unregister_shuts_down_and_falls_back() {
    let vendor = StubProcessor::new("vendor", &["pdf"], 80);
    let mut registry = StrategyRegistry::new();
    registry.register(StubProcessor::new("baseline", &["pdf"], 50)).unwrap();
    registry.register(vendor.clone()).unwrap();

    assert!(registry.unregister("vendor").unwrap());
    assert_eq!(vendor.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(selected(&registry, "report.pdf").as_deref(), Some("baseline"));
    assert!(!registry.unregister("vendor").unwrap());
}

#[test]
fn test_supported_extensions_union() {
    let mut registry = StrategyRegistry::new();
    registry.register(StubProcessor::new("a", &["PDF", ".xlsx"], 50)).unwrap();
    registry.register(StubProcessor::new("b", &["pdf", "csv"], 50)).unwrap();

    assert_eq!(registry.supported_extensions(), vec!["csv", "pdf", "xlsx"]);
    assert_eq!(registry.list(), vec!["a", "b"]);
}

#[test]
fn test_no_strategy_is_unsupported_format() {
    let registry = StrategyRegistry::new();
    let err = registry.get_strategy(Path::new("dump.rar")).err().unwrap();
    assert!(matches!(err, ThreatdocError::UnsupportedFormat(_)));
}

#[test]
fn test_shutdown_all_empties_registry() {
    let stub = StubProcessor::new("stub", &["txt"], 50);
    let mut registry = StrategyRegistry::new();
    registry.register(stub.clone()).unwrap();

    registry.shutdown_all().unwrap();
    assert!(registry.is_empty());
    assert_eq!(stub.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_override_replaces_builtin_for_processing() {
    let dir = TempDir::new().unwrap();
    let path = common::write_file(&dir, "digest.pdf", &common::pdf(&["TLP:GREEN"]));

    let mut registry = StrategyRegistry::new();
    threatdoc::processors::register_default_processors(&mut registry, None).unwrap();
    registry.register(StubProcessor::new("vendor-pdf", &["pdf"], 90)).unwrap();
    let registry = RwLock::new(registry);

    let doc = process_file_with_registry(&registry, &path, &ProcessingOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(doc.status, DocumentStatus::Completed);
    assert_eq!(doc.processor.as_deref(), Some("vendor-pdf"));
    assert_eq!(doc.extracted_text, "handled by vendor-pdf");
}

#[tokio::test]
#[serial]
async fn test_global_registry_has_builtins() {
    threatdoc::processors::ensure_initialized().unwrap();

    let extensions = threatdoc::plugins::supported_extensions().unwrap();
    for extension in ["doc", "docx", "pdf", "xls", "xlsx"] {
        assert!(extensions.iter().any(|e| e == extension), "missing {}", extension);
    }

    let registry = threatdoc::get_strategy_registry();
    let registry = registry.read().unwrap();
    assert_eq!(selected(&registry, "a.pdf").as_deref(), Some("pdf"));
    assert_eq!(selected(&registry, "a.doc").as_deref(), Some("word"));
    assert_eq!(selected(&registry, "a.xls").as_deref(), Some("excel"));
}

#[tokio::test]
#[serial]
async fn test_global_registration_round_trip() {
    threatdoc::processors::ensure_initialized().unwrap();
    let stub = StubProcessor::new("intel-markdown", &["md"], 50);

    assert!(threatdoc::plugins::register_strategy(stub.clone()).unwrap());
    assert!(threatdoc::plugins::supported_extensions().unwrap().contains(&"md".to_string()));

    assert!(threatdoc::plugins::unregister_strategy("intel-markdown").unwrap());
    assert!(!threatdoc::plugins::supported_extensions().unwrap().contains(&"md".to_string()));
    assert_eq!(stub.shutdowns.load(Ordering::SeqCst), 1);
}
