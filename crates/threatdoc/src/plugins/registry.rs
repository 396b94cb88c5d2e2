//! Strategy registration and selection.
//!
//! The [`StrategyRegistry`] holds every registered [`DocumentProcessor`] in
//! registration order, keyed by its
//! [`Plugin::name`](crate::plugins::Plugin::name). Selection filters the
//! processors whose `can_process` accepts the path and picks the highest priority;
//! equal priorities resolve to the processor registered first.
//!
//! The global registry sits behind an `RwLock`. Lookups clone the selected `Arc`
//! and release the lock before processing starts, and every mutation (including a
//! plugin registering several strategies) happens under one write guard, so
//! readers observe either the state before or after a mutation.

use crate::plugins::traits::validate_plugin_name;
use crate::plugins::DocumentProcessor;
use crate::{Result, ThreatdocError};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// One registered processor with its declared extensions and priority.
#[derive(Clone)]
pub struct StrategyRegistration {
    processor: Arc<dyn DocumentProcessor>,
    extensions: Vec<String>,
    priority: i32,
}

impl StrategyRegistration {
    pub fn name(&self) -> &str {
        self.processor.name()
    }

    pub fn processor(&self) -> &Arc<dyn DocumentProcessor> {
        &self.processor
    }

    /// Lower-cased extensions captured at registration time.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl std::fmt::Debug for StrategyRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistration")
            .field("name", &self.name())
            .field("extensions", &self.extensions)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Registry of format strategies.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<StrategyRegistration>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor.
    ///
    /// Returns `Ok(true)` when the processor was added and `Ok(false)` when a
    /// processor with the same name is already registered (logged as a warning,
    /// registry unchanged).
    ///
    /// # Errors
    ///
    /// - `ThreatdocError::Validation` for an invalid name or an empty extension set
    /// - Any error returned by the processor's `initialize()`
    pub fn register(&mut self, processor: Arc<dyn DocumentProcessor>) -> Result<bool> {
        let name = processor.name().to_string();
        validate_plugin_name(&name)?;

        if self.contains(&name) {
            tracing::warn!(processor = %name, "Processor already registered; ignoring duplicate registration");
            return Ok(false);
        }

        let extensions: Vec<String> = processor
            .supported_extensions()
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        if extensions.is_empty() {
            return Err(ThreatdocError::validation(format!(
                "Processor '{}' declares no supported extensions",
                name
            )));
        }

        processor.initialize()?;

        let priority = processor.priority();
        tracing::info!(processor = %name, priority, extensions = ?extensions, "Registered processor");

        self.strategies.push(StrategyRegistration {
            processor,
            extensions,
            priority,
        });
        Ok(true)
    }

    /// Remove a processor by name and shut it down.
    ///
    /// Returns `Ok(false)` when no processor had that name.
    pub fn unregister(&mut self, name: &str) -> Result<bool> {
        let Some(index) = self.strategies.iter().position(|s| s.name() == name) else {
            return Ok(false);
        };

        let registration = self.strategies.remove(index);
        tracing::info!(processor = %name, "Unregistered processor");
        registration.processor.shutdown()?;
        Ok(true)
    }

    /// Best processor for `path`, if any.
    pub fn get(&self, path: &Path) -> Option<Arc<dyn DocumentProcessor>> {
        let mut best: Option<&StrategyRegistration> = None;
        for candidate in self.strategies.iter().filter(|s| s.processor.can_process(path)) {
            // Strictly greater keeps the earliest registration on ties.
            if best.is_none_or(|current| candidate.priority > current.priority) {
                best = Some(candidate);
            }
        }
        best.map(|s| Arc::clone(&s.processor))
    }

    /// Like [`get`](Self::get) but reports a miss as `UnsupportedFormat`.
    pub fn get_strategy(&self, path: &Path) -> Result<Arc<dyn DocumentProcessor>> {
        self.get(path).ok_or_else(|| {
            let extension = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| "(no extension)".to_string());
            ThreatdocError::UnsupportedFormat(format!("No processor handles {} ({})", extension, path.display()))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.iter().any(|s| s.name() == name)
    }

    /// Registered processor names in registration order.
    pub fn list(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn registrations(&self) -> &[StrategyRegistration] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Deduplicated, lower-cased, sorted union of all registered extensions.
    pub fn supported_extensions(&self) -> Vec<String> {
        self.strategies
            .iter()
            .flat_map(|s| s.extensions.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Unregister and shut down every processor, continuing past failures.
    pub fn shutdown_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for registration in self.strategies.drain(..) {
            if let Err(e) = registration.processor.shutdown() {
                tracing::warn!(processor = registration.name(), error = %e, "Processor shutdown failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

static STRATEGY_REGISTRY: Lazy<Arc<RwLock<StrategyRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(StrategyRegistry::new())));

/// Global strategy registry used by [`process_file`](crate::process_file).
pub fn get_strategy_registry() -> Arc<RwLock<StrategyRegistry>> {
    Arc::clone(&STRATEGY_REGISTRY)
}

pub(crate) fn poisoned<T>(err: std::sync::PoisonError<T>) -> ThreatdocError {
    ThreatdocError::LockPoisoned(format!("Strategy registry lock poisoned: {}", err))
}

/// Register a processor with the global registry.
pub fn register_strategy(processor: Arc<dyn DocumentProcessor>) -> Result<bool> {
    let registry = get_strategy_registry();
    let mut registry = registry.write().map_err(poisoned)?;
    registry.register(processor)
}

/// Remove a processor from the global registry.
pub fn unregister_strategy(name: &str) -> Result<bool> {
    let registry = get_strategy_registry();
    let mut registry = registry.write().map_err(poisoned)?;
    registry.unregister(name)
}

/// Extensions handled by the global registry.
pub fn supported_extensions() -> Result<Vec<String>> {
    let registry = get_strategy_registry();
    let registry = registry.read().map_err(poisoned)?;
    Ok(registry.supported_extensions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ProcessingOptions;
    use crate::plugins::Plugin;
    use crate::types::Extraction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    struct MockProcessor {
        name: &'static str,
        extensions: &'static [&'static str],
        priority: i32,
        shutdowns: Arc<AtomicUsize>,
    }

    impl MockProcessor {
        fn new(name: &'static str, extensions: &'static [&'static str], priority: i32) -> Self {
            Self {
                name,
                extensions,
                priority,
                shutdowns: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Plugin for MockProcessor {
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
    impl DocumentProcessor for MockProcessor {
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
            Ok(Extraction::default())
        }
    }

    #[test]
    fn test_highest_priority_wins() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(MockProcessor::new("low", &["pdf"], 90))).unwrap();
        registry.register(Arc::new(MockProcessor::new("high", &["pdf"], 100))).unwrap();

        let selected = registry.get(Path::new("intel.pdf")).unwrap();
        assert_eq!(selected.name(), "high");
    }

    #[test]
    fn test_ties_resolve_to_first_registered() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(MockProcessor::new("first", &["pdf"], 50))).unwrap();
        registry.register(Arc::new(MockProcessor::new("second", &["pdf"], 50))).unwrap();

        for _ in 0..10 {
            assert_eq!(registry.get(Path::new("a.pdf")).unwrap().name(), "first");
        }
    }

    #[test]
    fn test_duplicate_registration_is_noop() {
        let mut registry = StrategyRegistry::new();
        let processor: Arc<dyn DocumentProcessor> = Arc::new(MockProcessor::new("dup", &["pdf"], 50));

        assert!(registry.register(Arc::clone(&processor)).unwrap());
        assert!(!registry.register(processor).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_extensions_rejected() {
        let mut registry = StrategyRegistry::new();
        let err = registry
            .register(Arc::new(MockProcessor::new("none", &[], 50)))
            .unwrap_err();
        assert!(matches!(err, ThreatdocError::Validation { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_strategy_unsupported() {
        let registry = StrategyRegistry::new();
        let err = registry.get_strategy(Path::new("notes.txt")).err().unwrap();
        assert!(matches!(err, ThreatdocError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_supported_extensions_sorted_and_deduplicated() {
        let mut registry = StrategyRegistry::new();
        registry
            .register(Arc::new(MockProcessor::new("word", &["DOCX", "doc"], 50)))
            .unwrap();
        registry
            .register(Arc::new(MockProcessor::new("word-alt", &[".docx"], 40)))
            .unwrap();
        registry.register(Arc::new(MockProcessor::new("pdf", &["pdf"], 50))).unwrap();

        assert_eq!(registry.supported_extensions(), vec!["doc", "docx", "pdf"]);
    }

    #[test]
    fn test_unregister_shuts_down() {
        let mut registry = StrategyRegistry::new();
        let processor = MockProcessor::new("pdf", &["pdf"], 50);
        let shutdowns = Arc::clone(&processor.shutdowns);
        registry.register(Arc::new(processor)).unwrap();

        assert!(registry.unregister("pdf").unwrap());
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(registry.get(Path::new("a.pdf")).is_none());
        assert!(!registry.unregister("pdf").unwrap());
    }

    #[test]
    fn test_shutdown_all() {
        let mut registry = StrategyRegistry::new();
        let a = MockProcessor::new("a", &["pdf"], 50);
        let b = MockProcessor::new("b", &["docx"], 50);
        let (sa, sb) = (Arc::clone(&a.shutdowns), Arc::clone(&b.shutdowns));
        registry.register(Arc::new(a)).unwrap();
        registry.register(Arc::new(b)).unwrap();

        registry.shutdown_all().unwrap();
        assert!(registry.is_empty());
        assert_eq!(sa.load(Ordering::SeqCst) + sb.load(Ordering::SeqCst), 2);
    }
}
