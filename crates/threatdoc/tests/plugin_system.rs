//! Plugin host behaviour with an in-process loader standing in for native
//! libraries.

#![cfg(all(feature = "pdf", feature = "office", feature = "excel"))]

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tempfile::TempDir;
use threatdoc::plugins::{
    DocumentProcessor, LoadedLibrary, Plugin, PluginContext, PluginFactory, PluginHost, PluginLoader,
    ProcessorPlugin, StrategyRegistry,
};
use threatdoc::types::Extraction;
use threatdoc::{CancellationToken, DocumentStatus, ProcessingOptions, Result, ThreatdocError};

struct LineCounter {
    name: &'static str,
    extension: &'static str,
}

impl Plugin for LineCounter {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> String {
        "0.3.0".to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl DocumentProcessor for LineCounter {
    fn supported_extensions(&self) -> Vec<String> {
        vec![self.extension.to_string()]
    }

    fn priority(&self) -> i32 {
        60
    }

    async fn validate(&self, _path: &Path) -> Result<bool> {
        Ok(true)
    }

    async fn extract(
        &self,
        content: &[u8],
        _path: &Path,
        _options: &ProcessingOptions,
        _cancel: &CancellationToken,
    ) -> Result<Extraction> {
        let text = String::from_utf8_lossy(content).into_owned();
        Ok(Extraction {
            page_count: text.lines().count(),
            text,
            ..Default::default()
        })
    }
}

struct MockPlugin {
    name: &'static str,
    strategy: Arc<LineCounter>,
    fail_initialize: bool,
    disposed: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessorPlugin for MockPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> String {
        "0.3.0".to_string()
    }

    fn description(&self) -> &str {
        "test plugin"
    }

    async fn initialize(&self, context: &PluginContext) -> Result<()> {
        assert!(!context.host_version.is_empty());
        if self.fail_initialize {
            return Err(ThreatdocError::plugin(self.name, "licence file missing"));
        }
        Ok(())
    }

    fn strategies(&self) -> Vec<Arc<dyn DocumentProcessor>> {
        vec![self.strategy.clone()]
    }

    async fn dispose(&self) -> Result<()> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct MockLoader {
    disposed: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

impl MockLoader {
    fn plugin(
        &self,
        name: &'static str,
        strategy: &'static str,
        extension: &'static str,
        fail_initialize: bool,
    ) -> PluginFactory {
        let disposed = Arc::clone(&self.disposed);
        Box::new(move || {
            let plugin: Arc<dyn ProcessorPlugin> = Arc::new(MockPlugin {
                name,
                strategy: Arc::new(LineCounter {
                    name: strategy,
                    extension,
                }),
                fail_initialize,
                disposed,
            });
            Ok(plugin)
        })
    }
}

impl PluginLoader for MockLoader {
    fn load(&self, path: &Path) -> Result<LoadedLibrary> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        let factories = match file_name {
            "libioc_csv.so" => vec![self.plugin("ioc-csv", "csv-import", "csv", false)],
            "libbundle.so" => {
                let broken: PluginFactory =
                    Box::new(|| Err(ThreatdocError::plugin("broken", "constructor returned null")));
                vec![broken, self.plugin("stix", "stix-json", "stix", false)]
            }
            "libunlicensed.so" => vec![self.plugin("unlicensed", "unlicensed-strategy", "lic", true)],
            "libshadow.so" => vec![self.plugin("shadow", "pdf", "pdf", false)],
            _ => return Err(ThreatdocError::plugin(file_name, "missing entry symbol")),
        };

        Ok(LoadedLibrary {
            factories,
            handle: None,
        })
    }
}

struct Fixture {
    dir: TempDir,
    registry: Arc<RwLock<StrategyRegistry>>,
    host: PluginHost,
    disposed: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

fn fixture(libraries: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    for name in libraries {
        common::write_file(&dir, name, b"\x7fELF");
    }
    common::write_file(&dir, "README.md", b"not a plugin");

    let loader = MockLoader::default();
    let disposed = Arc::clone(&loader.disposed);
    let loads = Arc::clone(&loader.loads);
    let registry = Arc::new(RwLock::new(StrategyRegistry::new()));
    let host = PluginHost::new(Arc::clone(&registry), Box::new(loader), PluginContext::default());

    Fixture {
        dir,
        registry,
        host,
        disposed,
        loads,
    }
}

fn registered(registry: &RwLock<StrategyRegistry>) -> Vec<String> {
    registry.read().unwrap().list()
}

#[tokio::test]
async fn test_partial_success_loading() {
    let f = fixture(&["libioc_csv.so", "libbundle.so", "libbroken.so", "libunlicensed.so"]);

    let report = f.host.load_directory(f.dir.path()).await.unwrap();

    let loaded: Vec<_> = report.loaded.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(loaded, vec!["stix", "ioc-csv"]);

    let mut failed: Vec<_> = report
        .failures
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    failed.sort();
    assert_eq!(failed, vec!["libbroken.so", "libunlicensed.so"]);
    assert!(report.skipped.is_empty());

    assert_eq!(registered(&f.registry), vec!["stix-json", "csv-import"]);
    assert_eq!(f.loads.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_failed_initialize_disposes_plugin() {
    let f = fixture(&["libunlicensed.so"]);

    let report = f.host.load_directory(f.dir.path()).await.unwrap();

    assert!(report.loaded.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(f.disposed.load(Ordering::SeqCst), 1);
    assert!(f.registry.read().unwrap().is_empty());
}

#[tokio::test]
async fn test_descriptor_lists_strategies() {
    let f = fixture(&["libioc_csv.so"]);
    f.host.load_directory(f.dir.path()).await.unwrap();

    let descriptors = f.host.descriptors().await;
    assert_eq!(descriptors.len(), 1);
    let descriptor = &descriptors[0];
    assert_eq!(descriptor.version, "0.3.0");
    assert_eq!(descriptor.description, "test plugin");
    assert!(descriptor.library.ends_with("libioc_csv.so"));
    assert_eq!(descriptor.strategies.len(), 1);
    assert_eq!(descriptor.strategies[0].name, "csv-import");
    assert_eq!(descriptor.strategies[0].extensions, vec!["csv"]);
    assert_eq!(descriptor.strategies[0].priority, 60);
}

#[tokio::test]
async fn test_already_loaded_library_is_skipped() {
    let f = fixture(&["libioc_csv.so"]);

    f.host.load_directory(f.dir.path()).await.unwrap();
    let second = f.host.load_directory(f.dir.path()).await.unwrap();

    assert!(second.loaded.is_empty());
    assert_eq!(second.skipped.len(), 1);
    assert!(f.host.load_library(&f.dir.path().join("libioc_csv.so")).await.unwrap().is_empty());
    assert_eq!(f.loads.load(Ordering::SeqCst), 1);
    assert_eq!(registered(&f.registry), vec!["csv-import"]);
}

#[tokio::test]
async fn test_unload_removes_strategies() {
    let f = fixture(&["libioc_csv.so", "libbundle.so"]);
    f.host.load_directory(f.dir.path()).await.unwrap();

    assert!(f.host.unload("ioc-csv").await.unwrap());
    assert_eq!(f.disposed.load(Ordering::SeqCst), 1);
    assert_eq!(registered(&f.registry), vec!["stix-json"]);
    assert!(!f.registry.read().unwrap().supported_extensions().contains(&"csv".to_string()));
    assert!(!f.host.unload("ioc-csv").await.unwrap());

    // The library is released, so it can be loaded again.
    let reloaded = f.host.load_library(&f.dir.path().join("libioc_csv.so")).await.unwrap();
    assert_eq!(reloaded.len(), 1);
}

#[tokio::test]
async fn test_name_clash_keeps_existing_strategy() {
    let f = fixture(&["libshadow.so"]);
    threatdoc::processors::register_default_processors(&mut f.registry.write().unwrap(), None).unwrap();

    let report = f.host.load_directory(f.dir.path()).await.unwrap();

    assert_eq!(report.loaded.len(), 1);
    assert!(report.loaded[0].strategies.is_empty());
    assert_eq!(registered(&f.registry), vec!["pdf", "word", "excel"]);

    f.host.unload("shadow").await.unwrap();
    assert!(f.registry.read().unwrap().contains("pdf"));
}

#[tokio::test]
async fn test_plugin_strategy_processes_files() {
    let f = fixture(&["libioc_csv.so"]);
    f.host.load_directory(f.dir.path()).await.unwrap();
    let path = common::write_file(&f.dir, "feed.csv", b"indicator,type\nevil.example,domain\nTLP:GREEN");

    let doc = threatdoc::process_file_with_registry(
        &f.registry,
        &path,
        &ProcessingOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(doc.status, DocumentStatus::Completed);
    assert_eq!(doc.processor.as_deref(), Some("csv-import"));
    assert_eq!(doc.page_count, 3);
    assert_eq!(doc.tlp, threatdoc::TlpDesignation::Green);
}

#[tokio::test]
async fn test_shutdown_disposes_everything() {
    let f = fixture(&["libioc_csv.so", "libbundle.so"]);
    f.host.load_directory(f.dir.path()).await.unwrap();

    f.host.shutdown().await.unwrap();

    assert_eq!(f.disposed.load(Ordering::SeqCst), 2);
    assert!(f.registry.read().unwrap().is_empty());
    assert!(f.host.descriptors().await.is_empty());
}
