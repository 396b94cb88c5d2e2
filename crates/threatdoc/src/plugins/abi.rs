//! Native plugin ABI.
//!
//! A plugin library is a `cdylib` exporting
//!
//! ```c
//! const ThreatdocPluginManifest *threatdoc_plugin_entry(void);
//! ```
//!
//! The manifest lists one [`PluginVTable`] per plugin. Structured values cross
//! the boundary as NUL-terminated UTF-8 JSON:
//!
//! - `initialize` receives the host context (`host_version`, `options`,
//!   `plugin_directory`, `ocr_available`) and returns 0 on success.
//! - `strategies` returns `[{"name": "...", "extensions": ["..."], "priority": 50}]`.
//! - `validate` returns 1 for a matching signature, 0 for a mismatch, negative on error.
//! - `process` returns either an extraction object (`text`, `page_count`,
//!   `metadata`, `is_scanned`, `warnings`, `degraded_reason`) or
//!   `{"error": {"kind": "...", "message": "..."}}`.
//!
//! Strings returned by `strategies` and `process` are owned by the plugin and
//! handed back through `free_string`. Strings returned by `name`, `version` and
//! `description` must stay valid for the lifetime of the library.

#![allow(unsafe_code)]

use std::any::Any;
use std::ffi::{CStr, CString, c_char};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::config::ProcessingOptions;
use crate::plugins::host::{LoadedLibrary, PluginContext, PluginFactory, PluginLoader, ProcessorPlugin};
use crate::plugins::{DocumentProcessor, Plugin};
use crate::types::{ContentFidelity, DocumentMetadata, Extraction, ProcessingWarning};
use crate::{Result, ThreatdocError};

pub const PLUGIN_ABI_VERSION: u32 = 1;
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"threatdoc_plugin_entry\0";

#[repr(C)]
pub struct PluginManifest {
    pub abi_version: u32,
    pub plugin_count: usize,
    pub plugins: *const PluginVTable,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct PluginVTable {
    pub name: unsafe extern "C" fn() -> *const c_char,
    pub version: unsafe extern "C" fn() -> *const c_char,
    pub description: unsafe extern "C" fn() -> *const c_char,
    pub initialize: unsafe extern "C" fn(context_json: *const c_char) -> i32,
    pub strategies: unsafe extern "C" fn() -> *mut c_char,
    pub validate: unsafe extern "C" fn(strategy: *const c_char, path: *const c_char) -> i32,
    pub process:
        unsafe extern "C" fn(strategy: *const c_char, path: *const c_char, options_json: *const c_char) -> *mut c_char,
    pub free_string: unsafe extern "C" fn(ptr: *mut c_char),
    pub dispose: unsafe extern "C" fn() -> i32,
}

pub type PluginEntryFn = unsafe extern "C" fn() -> *const PluginManifest;

/// Opens plugin libraries with `libloading`.
pub struct NativeLibraryLoader;

impl PluginLoader for NativeLibraryLoader {
    fn load(&self, path: &Path) -> Result<LoadedLibrary> {
        let library_name = path.display().to_string();

        // SAFETY: loading a library runs its initialisers; plugin directories are
        // operator-controlled.
        let library = unsafe { libloading::Library::new(path) }
            .map_err(|e| ThreatdocError::plugin(&library_name, format!("Failed to open library: {}", e)))?;
        let library = Arc::new(library);

        let entry: PluginEntryFn = {
            // SAFETY: the symbol type is fixed by the ABI contract above.
            let symbol = unsafe { library.get::<PluginEntryFn>(PLUGIN_ENTRY_SYMBOL) }.map_err(|e| {
                ThreatdocError::plugin(&library_name, format!("Missing threatdoc_plugin_entry: {}", e))
            })?;
            *symbol
        };

        // SAFETY: entry point exported by the plugin per the ABI contract.
        let manifest = unsafe { entry() };
        if manifest.is_null() {
            return Err(ThreatdocError::plugin(library_name, "Plugin entry returned a null manifest"));
        }
        // SAFETY: non-null manifest pointer owned by the library, which we keep alive.
        let manifest = unsafe { &*manifest };

        if manifest.abi_version != PLUGIN_ABI_VERSION {
            return Err(ThreatdocError::plugin(
                library_name,
                format!(
                    "Plugin ABI version {} is not supported (host speaks {})",
                    manifest.abi_version, PLUGIN_ABI_VERSION
                ),
            ));
        }

        let vtables: Vec<PluginVTable> = if manifest.plugin_count == 0 || manifest.plugins.is_null() {
            Vec::new()
        } else {
            // SAFETY: the manifest promises `plugin_count` contiguous vtables.
            unsafe { std::slice::from_raw_parts(manifest.plugins, manifest.plugin_count) }.to_vec()
        };

        let factories = vtables
            .into_iter()
            .map(|vtable| {
                let library = Arc::clone(&library);
                let factory: PluginFactory = Box::new(move || {
                    let plugin: Arc<dyn ProcessorPlugin> = Arc::new(ForeignPlugin::new(vtable, library)?);
                    Ok(plugin)
                });
                factory
            })
            .collect();

        Ok(LoadedLibrary {
            factories,
            handle: Some(library as Arc<dyn Any + Send + Sync>),
        })
    }
}

/// Shared handle to one plugin's vtable, keeping its library mapped.
#[derive(Clone)]
struct ForeignHandle {
    vtable: PluginVTable,
    _library: Arc<libloading::Library>,
}

impl ForeignHandle {
    fn static_str(&self, getter: unsafe extern "C" fn() -> *const c_char) -> String {
        // SAFETY: getter is a vtable entry returning a library-lifetime string.
        let ptr = unsafe { getter() };
        if ptr.is_null() {
            return String::new();
        }
        // SAFETY: non-null, NUL-terminated per the ABI contract.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn take_string(&self, ptr: *mut c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        // SAFETY: non-null, NUL-terminated, owned by the plugin until freed below.
        let value = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        // SAFETY: returning the plugin-allocated string to its allocator.
        unsafe { (self.vtable.free_string)(ptr) };
        Some(value)
    }
}

fn c_string(value: &str, what: &str) -> Result<CString> {
    CString::new(value).map_err(|_| ThreatdocError::validation(format!("{} contains an interior NUL byte", what)))
}

#[derive(Debug, Serialize)]
struct ContextPayload<'a> {
    host_version: &'a str,
    options: &'a ProcessingOptions,
    plugin_directory: Option<&'a Path>,
    ocr_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct StrategyEntry {
    name: String,
    extensions: Vec<String>,
    #[serde(default = "default_priority")]
    priority: i32,
}

fn default_priority() -> i32 {
    50
}

#[derive(Debug, Deserialize)]
struct ForeignError {
    kind: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ForeignExtraction {
    #[serde(default)]
    text: String,
    #[serde(default)]
    page_count: usize,
    #[serde(default)]
    metadata: DocumentMetadata,
    #[serde(default)]
    is_scanned: bool,
    #[serde(default)]
    warnings: Vec<ProcessingWarning>,
    #[serde(default)]
    degraded_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ForeignResponse {
    Failure { error: ForeignError },
    Success(ForeignExtraction),
}

impl ForeignError {
    fn into_error(self, plugin_name: &str) -> ThreatdocError {
        match self.kind.as_str() {
            "password_protected" => ThreatdocError::PasswordProtected(self.message),
            "validation_failed" => ThreatdocError::validation(self.message),
            "cancelled" => ThreatdocError::Cancelled,
            "parsing" => ThreatdocError::parsing(self.message),
            _ => ThreatdocError::plugin(plugin_name, self.message),
        }
    }
}

/// A plugin provided by a native library.
pub struct ForeignPlugin {
    handle: ForeignHandle,
    name: String,
    version: String,
    description: String,
    strategies: OnceCell<Vec<StrategyEntry>>,
}

impl ForeignPlugin {
    fn new(vtable: PluginVTable, library: Arc<libloading::Library>) -> Result<Self> {
        let handle = ForeignHandle {
            vtable,
            _library: library,
        };
        let name = handle.static_str(vtable.name);
        if name.is_empty() {
            return Err(ThreatdocError::plugin("<unnamed>", "Plugin reports an empty name"));
        }
        Ok(Self {
            version: handle.static_str(vtable.version),
            description: handle.static_str(vtable.description),
            name,
            handle,
            strategies: OnceCell::new(),
        })
    }
}

#[async_trait]
impl ProcessorPlugin for ForeignPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn initialize(&self, context: &PluginContext) -> Result<()> {
        let payload = ContextPayload {
            host_version: context.host_version,
            options: &context.options,
            plugin_directory: context.plugin_directory.as_deref(),
            ocr_available: context.ocr_backend.as_ref().is_some_and(|b| b.is_available()),
        };
        let context_json = c_string(&serde_json::to_string(&payload)?, "plugin context")?;

        // SAFETY: vtable entry; the argument outlives the call.
        let status = unsafe { (self.handle.vtable.initialize)(context_json.as_ptr()) };
        if status != 0 {
            return Err(ThreatdocError::plugin(&self.name, format!("initialize returned {}", status)));
        }

        // SAFETY: vtable entry returning a plugin-owned string.
        let raw = unsafe { (self.handle.vtable.strategies)() };
        let json = self
            .handle
            .take_string(raw)
            .ok_or_else(|| ThreatdocError::plugin(&self.name, "strategies returned null"))?;
        let entries: Vec<StrategyEntry> = serde_json::from_str(&json)?;
        let _ = self.strategies.set(entries);
        Ok(())
    }

    fn strategies(&self) -> Vec<Arc<dyn DocumentProcessor>> {
        self.strategies
            .get()
            .map(|entries| {
                entries
                    .iter()
                    .cloned()
                    .map(|entry| {
                        let processor: Arc<dyn DocumentProcessor> = Arc::new(ForeignProcessor {
                            handle: self.handle.clone(),
                            plugin_name: self.name.clone(),
                            version: self.version.clone(),
                            entry,
                        });
                        processor
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn dispose(&self) -> Result<()> {
        // SAFETY: vtable entry taking no arguments.
        let status = unsafe { (self.handle.vtable.dispose)() };
        if status != 0 {
            return Err(ThreatdocError::plugin(&self.name, format!("dispose returned {}", status)));
        }
        Ok(())
    }
}

/// A strategy implemented inside a native plugin.
pub struct ForeignProcessor {
    handle: ForeignHandle,
    plugin_name: String,
    version: String,
    entry: StrategyEntry,
}

impl ForeignProcessor {
    fn path_arg(path: &Path) -> Result<CString> {
        c_string(&path.to_string_lossy(), "path")
    }
}

impl Plugin for ForeignProcessor {
    fn name(&self) -> &str {
        &self.entry.name
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn author(&self) -> &str {
        &self.plugin_name
    }
}

#[async_trait]
impl DocumentProcessor for ForeignProcessor {
    fn supported_extensions(&self) -> Vec<String> {
        self.entry.extensions.clone()
    }

    fn priority(&self) -> i32 {
        self.entry.priority
    }

    async fn validate(&self, path: &Path) -> Result<bool> {
        let strategy = c_string(&self.entry.name, "strategy name")?;
        let path = Self::path_arg(path)?;
        let handle = self.handle.clone();

        let status = tokio::task::spawn_blocking(move || {
            // SAFETY: vtable entry; both arguments outlive the call.
            unsafe { (handle.vtable.validate)(strategy.as_ptr(), path.as_ptr()) }
        })
        .await
        .map_err(|e| ThreatdocError::plugin(&self.plugin_name, format!("validate task panicked: {}", e)))?;

        match status {
            1 => Ok(true),
            0 => Ok(false),
            code => Err(ThreatdocError::plugin(&self.plugin_name, format!("validate returned {}", code))),
        }
    }

    async fn extract(
        &self,
        _content: &[u8],
        path: &Path,
        options: &ProcessingOptions,
        cancel: &CancellationToken,
    ) -> Result<Extraction> {
        let strategy = c_string(&self.entry.name, "strategy name")?;
        let path_arg = Self::path_arg(path)?;
        let options_json = c_string(&serde_json::to_string(options)?, "options")?;
        let handle = self.handle.clone();

        let task = tokio::task::spawn_blocking(move || {
            // SAFETY: vtable entry; all arguments outlive the call.
            let raw = unsafe { (handle.vtable.process)(strategy.as_ptr(), path_arg.as_ptr(), options_json.as_ptr()) };
            handle.take_string(raw)
        });

        // The native call cannot be interrupted; on cancellation it finishes in
        // the background and its result is discarded.
        let json = tokio::select! {
            _ = cancel.cancelled() => return Err(ThreatdocError::Cancelled),
            joined = task => joined
                .map_err(|e| ThreatdocError::plugin(&self.plugin_name, format!("process task panicked: {}", e)))?
                .ok_or_else(|| ThreatdocError::plugin(&self.plugin_name, "process returned null"))?,
        };

        match serde_json::from_str::<ForeignResponse>(&json)? {
            ForeignResponse::Failure { error } => Err(error.into_error(&self.plugin_name)),
            ForeignResponse::Success(extraction) => Ok(Extraction {
                text: extraction.text,
                page_count: extraction.page_count,
                metadata: extraction.metadata,
                is_scanned: extraction.is_scanned,
                fidelity: match extraction.degraded_reason {
                    Some(reason) => ContentFidelity::Degraded { reason },
                    None => ContentFidelity::Full,
                },
                warnings: extraction.warnings,
            }),
        }
    }
}
