//! Native plugin library exercising the threatdoc plugin ABI.
//!
//! The manifest carries two plugins:
//!
//! - `ioc-lines` handles `.iocs` files: a `#iocs` header followed by one
//!   indicator per line.
//! - `sealed-bundle` handles `.sealed` files and always reports them as
//!   password-protected.
//!
//! Two extra exports let tests observe the library from outside:
//! `threatdoc_test_plugin_live_strings` counts strings handed to the host and
//! not yet freed, and `threatdoc_test_plugin_disposed` counts `dispose` calls.

use std::ffi::{CStr, CString, c_char};
use std::sync::atomic::{AtomicUsize, Ordering};

const ABI_VERSION: u32 = 1;
const IOC_HEADER: &str = "#iocs";

#[repr(C)]
pub struct PluginManifest {
    pub abi_version: u32,
    pub plugin_count: usize,
    pub plugins: *const PluginVTable,
}

// Points at an immutable static table.
unsafe impl Sync for PluginManifest {}

#[repr(C)]
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

static LIVE_STRINGS: AtomicUsize = AtomicUsize::new(0);
static DISPOSED: AtomicUsize = AtomicUsize::new(0);

static VTABLES: [PluginVTable; 2] = [
    PluginVTable {
        name: ioc_name,
        version: plugin_version,
        description: ioc_description,
        initialize,
        strategies: ioc_strategies,
        validate: ioc_validate,
        process: ioc_process,
        free_string,
        dispose,
    },
    PluginVTable {
        name: sealed_name,
        version: plugin_version,
        description: sealed_description,
        initialize,
        strategies: sealed_strategies,
        validate: sealed_validate,
        process: sealed_process,
        free_string,
        dispose,
    },
];

static MANIFEST: PluginManifest = PluginManifest {
    abi_version: ABI_VERSION,
    plugin_count: 2,
    plugins: &VTABLES as *const [PluginVTable; 2] as *const PluginVTable,
};

#[unsafe(no_mangle)]
pub extern "C" fn threatdoc_plugin_entry() -> *const PluginManifest {
    &MANIFEST
}

#[unsafe(no_mangle)]
pub extern "C" fn threatdoc_test_plugin_live_strings() -> usize {
    LIVE_STRINGS.load(Ordering::SeqCst)
}

#[unsafe(no_mangle)]
pub extern "C" fn threatdoc_test_plugin_disposed() -> usize {
    DISPOSED.load(Ordering::SeqCst)
}

fn hand_out(value: String) -> *mut c_char {
    match CString::new(value) {
        Ok(value) => {
            LIVE_STRINGS.fetch_add(1, Ordering::SeqCst);
            value.into_raw()
        }
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn borrow_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn json_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn error_response(kind: &str, message: &str) -> *mut c_char {
    hand_out(format!(
        r#"{{"error": {{"kind": {}, "message": {}}}}}"#,
        json_string(kind),
        json_string(message)
    ))
}

unsafe extern "C" fn plugin_version() -> *const c_char {
    c"1.2.0".as_ptr()
}

unsafe extern "C" fn initialize(context_json: *const c_char) -> i32 {
    // SAFETY: the host passes a valid NUL-terminated string.
    match unsafe { borrow_str(context_json) } {
        Some(context) if context.contains("\"host_version\"") => 0,
        _ => -1,
    }
}

unsafe extern "C" fn free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: `ptr` came from `CString::into_raw` in `hand_out`.
    drop(unsafe { CString::from_raw(ptr) });
    LIVE_STRINGS.fetch_sub(1, Ordering::SeqCst);
}

unsafe extern "C" fn dispose() -> i32 {
    DISPOSED.fetch_add(1, Ordering::SeqCst);
    0
}

// ioc-lines

unsafe extern "C" fn ioc_name() -> *const c_char {
    c"ioc-lines".as_ptr()
}

unsafe extern "C" fn ioc_description() -> *const c_char {
    c"Plain indicator lists".as_ptr()
}

unsafe extern "C" fn ioc_strategies() -> *mut c_char {
    hand_out(r#"[{"name": "ioc-lines", "extensions": ["iocs"], "priority": 70}]"#.to_string())
}

unsafe extern "C" fn ioc_validate(_strategy: *const c_char, path: *const c_char) -> i32 {
    // SAFETY: the host passes a valid NUL-terminated string.
    let Some(path) = (unsafe { borrow_str(path) }) else {
        return -1;
    };
    match std::fs::read_to_string(path) {
        Ok(content) if content.starts_with(IOC_HEADER) => 1,
        Ok(_) => 0,
        Err(_) => -1,
    }
}

unsafe extern "C" fn ioc_process(
    _strategy: *const c_char,
    path: *const c_char,
    _options_json: *const c_char,
) -> *mut c_char {
    // SAFETY: the host passes a valid NUL-terminated string.
    let Some(path) = (unsafe { borrow_str(path) }) else {
        return error_response("validation_failed", "path is not valid UTF-8");
    };
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return error_response("parsing", &e.to_string()),
    };

    let indicators: Vec<&str> = content
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let text = indicators.join("\n");

    hand_out(format!(
        r#"{{"text": {}, "page_count": 1, "metadata": {{"title": "IOC list", "custom": {{"indicator_count": {}}}}}}}"#,
        json_string(&text),
        indicators.len()
    ))
}

// sealed-bundle

unsafe extern "C" fn sealed_name() -> *const c_char {
    c"sealed-bundle".as_ptr()
}

unsafe extern "C" fn sealed_description() -> *const c_char {
    c"Encrypted vendor bundles".as_ptr()
}

unsafe extern "C" fn sealed_strategies() -> *mut c_char {
    hand_out(r#"[{"name": "sealed-bundle", "extensions": ["sealed"]}]"#.to_string())
}

unsafe extern "C" fn sealed_validate(_strategy: *const c_char, _path: *const c_char) -> i32 {
    1
}

unsafe extern "C" fn sealed_process(
    _strategy: *const c_char,
    _path: *const c_char,
    _options_json: *const c_char,
) -> *mut c_char {
    error_response("password_protected", "bundle key required")
}
