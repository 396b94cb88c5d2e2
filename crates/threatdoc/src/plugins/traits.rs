//! Base plugin trait definition.
//!
//! Every processor and OCR backend implements [`Plugin`], which provides the
//! stable identifier the registries key on plus lifecycle hooks.

use crate::{Result, ThreatdocError};

/// Base trait that all plugins must implement.
///
/// # Thread Safety
///
/// Plugins are shared across concurrent processing calls and must be `Send + Sync`.
///
/// # Example
///
/// ```rust
/// use threatdoc::plugins::Plugin;
/// use threatdoc::Result;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct FeedCache {
///     initialized: AtomicBool,
/// }
///
/// impl Plugin for FeedCache {
///     fn name(&self) -> &str {
///         "feed-cache"
///     }
///
///     fn version(&self) -> String {
///         "1.0.0".to_string()
///     }
///
///     fn initialize(&self) -> Result<()> {
///         self.initialized.store(true, Ordering::Release);
///         Ok(())
///     }
///
///     fn shutdown(&self) -> Result<()> {
///         self.initialized.store(false, Ordering::Release);
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Stable, unique identifier for this plugin.
    ///
    /// Registries key on this name, so it must not change between calls. It must be
    /// non-empty and contain no whitespace (e.g. `"pdf-processor"`).
    fn name(&self) -> &str;

    /// Semantic version of this plugin (`MAJOR.MINOR.PATCH`).
    fn version(&self) -> String;

    /// Called once when the plugin is registered.
    fn initialize(&self) -> Result<()>;

    /// Called when the plugin is unregistered; release held resources here.
    fn shutdown(&self) -> Result<()>;

    fn description(&self) -> &str {
        ""
    }

    fn author(&self) -> &str {
        ""
    }
}

/// Reject names that cannot serve as registry keys.
pub(crate) fn validate_plugin_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ThreatdocError::validation("Plugin name cannot be empty"));
    }

    if name.contains(char::is_whitespace) {
        return Err(ThreatdocError::validation(format!(
            "Plugin name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(())
}
