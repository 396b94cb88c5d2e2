//! Runtime plugin host.
//!
//! A plugin library contributes one or more [`ProcessorPlugin`]s, each of which
//! exposes a set of strategies. The host loads libraries from a directory
//! (non-recursively), initialises every plugin with a [`PluginContext`], and
//! registers its strategies with a [`StrategyRegistry`]. Unloading reverses the
//! order: strategies are unregistered, the plugin is disposed, and the library
//! handle is dropped once no plugin from it remains.
//!
//! Loading is partial-success: a library that fails to open, or a plugin that
//! fails to instantiate or initialise, is logged and skipped without affecting the
//! rest of the directory.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::config::ProcessingOptions;
use crate::plugins::registry::{StrategyRegistry, poisoned};
use crate::plugins::{DocumentProcessor, OcrBackend};
use crate::{Result, ThreatdocError};

/// Services handed to plugins during initialisation.
#[derive(Clone)]
pub struct PluginContext {
    pub host_version: &'static str,
    pub options: ProcessingOptions,
    pub plugin_directory: Option<PathBuf>,
    pub ocr_backend: Option<Arc<dyn OcrBackend>>,
}

impl Default for PluginContext {
    fn default() -> Self {
        Self {
            host_version: env!("CARGO_PKG_VERSION"),
            options: ProcessingOptions::default(),
            plugin_directory: None,
            ocr_backend: None,
        }
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("host_version", &self.host_version)
            .field("plugin_directory", &self.plugin_directory)
            .field("ocr_backend", &self.ocr_backend.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

/// Contract implemented by every externally loaded plugin.
#[async_trait]
pub trait ProcessorPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> String;

    fn description(&self) -> &str {
        ""
    }

    async fn initialize(&self, context: &PluginContext) -> Result<()>;

    /// Strategies contributed by this plugin. Called once, after `initialize`.
    fn strategies(&self) -> Vec<Arc<dyn DocumentProcessor>>;

    async fn dispose(&self) -> Result<()>;
}

/// Builds one plugin instance from an opened library.
pub type PluginFactory = Box<dyn FnOnce() -> Result<Arc<dyn ProcessorPlugin>> + Send>;

/// An opened plugin library.
pub struct LoadedLibrary {
    pub factories: Vec<PluginFactory>,
    /// Keeps the library mapped; dropped after all its plugins are disposed.
    pub handle: Option<Arc<dyn Any + Send + Sync>>,
}

/// Opens plugin libraries.
pub trait PluginLoader: Send + Sync {
    /// Whether `path` looks like a library this loader can open.
    fn is_library(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "so" | "dylib" | "dll"))
    }

    fn load(&self, path: &Path) -> Result<LoadedLibrary>;
}

/// Summary of one registered strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub name: String,
    pub extensions: Vec<String>,
    pub priority: i32,
}

/// A loaded plugin and the strategies it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub library: PathBuf,
    pub strategies: Vec<StrategyInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginLoadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of [`PluginHost::load_directory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginLoadReport {
    pub loaded: Vec<PluginDescriptor>,
    /// Libraries skipped because a library with the same file name is loaded.
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<PluginLoadFailure>,
}

struct LoadedPlugin {
    plugin: Arc<dyn ProcessorPlugin>,
    descriptor: PluginDescriptor,
}

struct LibraryEntry {
    plugins: Vec<LoadedPlugin>,
    handle: Option<Arc<dyn Any + Send + Sync>>,
}

/// Loads, tracks and unloads plugin libraries.
pub struct PluginHost {
    registry: Arc<RwLock<StrategyRegistry>>,
    loader: Box<dyn PluginLoader>,
    context: PluginContext,
    libraries: Mutex<IndexMap<String, LibraryEntry>>,
}

fn library_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

impl PluginHost {
    pub fn new(registry: Arc<RwLock<StrategyRegistry>>, loader: Box<dyn PluginLoader>, context: PluginContext) -> Self {
        Self {
            registry,
            loader,
            context,
            libraries: Mutex::new(IndexMap::new()),
        }
    }

    /// Host backed by the native library loader and the global registry.
    #[cfg(feature = "dynamic-plugins")]
    pub fn with_native_loader(context: PluginContext) -> Self {
        Self::new(
            crate::plugins::registry::get_strategy_registry(),
            Box::new(crate::plugins::abi::NativeLibraryLoader),
            context,
        )
    }

    pub fn registry(&self) -> &Arc<RwLock<StrategyRegistry>> {
        &self.registry
    }

    /// Load every plugin library found directly inside `dir`.
    ///
    /// # Errors
    ///
    /// Only an unreadable directory is an error; per-library problems land in
    /// the report.
    pub async fn load_directory(&self, dir: &Path) -> Result<PluginLoadReport> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && self.loader.is_library(&path) {
                candidates.push(path);
            }
        }
        candidates.sort();

        let mut report = PluginLoadReport::default();
        for path in candidates {
            if self.is_library_loaded(&library_key(&path)).await {
                tracing::debug!(library = %path.display(), "Plugin library already loaded; skipping");
                report.skipped.push(path);
                continue;
            }

            match self.load_library(&path).await {
                Ok(descriptors) => report.loaded.extend(descriptors),
                Err(e) => {
                    tracing::warn!(library = %path.display(), error = %e, "Failed to load plugin library");
                    report.failures.push(PluginLoadFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            directory = %dir.display(),
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Plugin directory scanned"
        );
        Ok(report)
    }

    /// Load one library and register the strategies of every plugin it holds.
    ///
    /// Loading a library whose file name is already loaded is a no-op returning
    /// an empty list.
    pub async fn load_library(&self, path: &Path) -> Result<Vec<PluginDescriptor>> {
        let key = library_key(path);
        let mut libraries = self.libraries.lock().await;
        if libraries.contains_key(&key) {
            return Ok(Vec::new());
        }

        let library = self.loader.load(path)?;
        let mut loaded = Vec::new();

        for factory in library.factories {
            let plugin = match factory() {
                Ok(plugin) => plugin,
                Err(e) => {
                    tracing::warn!(library = %path.display(), error = %e, "Failed to instantiate plugin");
                    continue;
                }
            };

            match self.activate(&plugin, path).await {
                Ok(descriptor) => loaded.push(LoadedPlugin { plugin, descriptor }),
                Err(e) => {
                    tracing::warn!(plugin = plugin.name(), error = %e, "Failed to activate plugin");
                }
            }
        }

        if loaded.is_empty() {
            return Err(ThreatdocError::plugin(
                key,
                "library contains no plugin that could be initialised",
            ));
        }

        let descriptors = loaded.iter().map(|p| p.descriptor.clone()).collect();
        libraries.insert(
            key,
            LibraryEntry {
                plugins: loaded,
                handle: library.handle,
            },
        );
        Ok(descriptors)
    }

    async fn activate(&self, plugin: &Arc<dyn ProcessorPlugin>, library: &Path) -> Result<PluginDescriptor> {
        if let Err(e) = plugin.initialize(&self.context).await {
            dispose_quietly(plugin).await;
            return Err(e);
        }

        let strategies = plugin.strategies();
        let registered = {
            let mut registry = self.registry.write().map_err(poisoned)?;
            let mut registered = Vec::new();
            let mut failure = None;
            for strategy in &strategies {
                match registry.register(Arc::clone(strategy)) {
                    Ok(true) => registered.push(StrategyInfo {
                        name: strategy.name().to_string(),
                        extensions: strategy.supported_extensions(),
                        priority: strategy.priority(),
                    }),
                    // Another owner already holds this name; it stays theirs.
                    Ok(false) => {}
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            if let Some(e) = failure {
                for info in &registered {
                    let _ = registry.unregister(&info.name);
                }
                Err(e)
            } else {
                Ok(registered)
            }
        };

        let registered = match registered {
            Ok(registered) => registered,
            Err(e) => {
                dispose_quietly(plugin).await;
                return Err(e);
            }
        };

        tracing::info!(
            plugin = plugin.name(),
            version = %plugin.version(),
            strategies = registered.len(),
            "Plugin loaded"
        );

        Ok(PluginDescriptor {
            name: plugin.name().to_string(),
            version: plugin.version(),
            description: plugin.description().to_string(),
            library: library.to_path_buf(),
            strategies: registered,
        })
    }

    async fn is_library_loaded(&self, key: &str) -> bool {
        self.libraries.lock().await.contains_key(key)
    }

    /// Unload the plugin called `name`.
    ///
    /// Returns `Ok(false)` when no such plugin is loaded.
    pub async fn unload(&self, name: &str) -> Result<bool> {
        let mut libraries = self.libraries.lock().await;

        let Some((key, index)) = libraries.iter().find_map(|(key, entry)| {
            entry
                .plugins
                .iter()
                .position(|p| p.descriptor.name == name)
                .map(|index| (key.clone(), index))
        }) else {
            return Ok(false);
        };

        let Some(entry) = libraries.get_mut(&key) else {
            return Ok(false);
        };
        let plugin = entry.plugins.remove(index);
        let library_empty = entry.plugins.is_empty();

        let result = self.deactivate(plugin).await;

        if library_empty && let Some(entry) = libraries.shift_remove(&key) {
            drop(entry.handle);
            tracing::debug!(library = %key, "Released plugin library");
        }

        result.map(|_| true)
    }

    async fn deactivate(&self, loaded: LoadedPlugin) -> Result<()> {
        {
            let mut registry = self.registry.write().map_err(poisoned)?;
            for strategy in &loaded.descriptor.strategies {
                if let Err(e) = registry.unregister(&strategy.name) {
                    tracing::warn!(strategy = %strategy.name, error = %e, "Strategy shutdown failed");
                }
            }
        }

        loaded.plugin.dispose().await?;
        tracing::info!(plugin = %loaded.descriptor.name, "Plugin unloaded");
        Ok(())
    }

    /// Unload every plugin and release every library.
    pub async fn shutdown(&self) -> Result<()> {
        let mut libraries = self.libraries.lock().await;
        let mut first_error = None;

        for (key, entry) in libraries.drain(..) {
            for plugin in entry.plugins {
                if let Err(e) = self.deactivate(plugin).await {
                    tracing::warn!(library = %key, error = %e, "Plugin dispose failed during shutdown");
                    first_error.get_or_insert(e);
                }
            }
            drop(entry.handle);
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Descriptors of every loaded plugin, in load order.
    pub async fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.libraries
            .lock()
            .await
            .values()
            .flat_map(|entry| entry.plugins.iter().map(|p| p.descriptor.clone()))
            .collect()
    }
}

async fn dispose_quietly(plugin: &Arc<dyn ProcessorPlugin>) {
    if let Err(e) = plugin.dispose().await {
        tracing::warn!(plugin = plugin.name(), error = %e, "Plugin dispose failed");
    }
}
