//! File I/O utilities.
//!
//! Precondition checks run on filesystem metadata only. Reading the body of a file
//! happens after the existence and size checks have passed, so an oversized file is
//! rejected without opening its content.

use crate::{Result, ThreatdocError};
use std::path::Path;
use tokio::fs;

/// Container signatures recognised by the built-in processors.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";
pub const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Read a file asynchronously.
///
/// # Errors
///
/// Returns `ThreatdocError::Io` for I/O errors (these always bubble up).
pub async fn read_file_async(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    fs::read(path.as_ref()).await.map_err(ThreatdocError::Io)
}

/// Check that `path` exists and is no larger than `max_bytes`.
///
/// Returns the file size on success.
///
/// # Errors
///
/// - `ThreatdocError::NotFound` if nothing exists at `path`
/// - `ThreatdocError::SizeExceeded` if the file is larger than the limit
/// - `ThreatdocError::Io` for any other metadata failure
pub async fn check_preconditions(path: &Path, max_file_size_mb: u64) -> Result<u64> {
    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ThreatdocError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(ThreatdocError::Io(e)),
    };

    if !metadata.is_file() {
        return Err(ThreatdocError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let size_bytes = metadata.len();
    let limit = max_file_size_mb.saturating_mul(1024 * 1024);
    if size_bytes > limit {
        return Err(ThreatdocError::SizeExceeded {
            path: path.to_path_buf(),
            size_bytes,
            limit_mb: max_file_size_mb,
        });
    }

    Ok(size_bytes)
}

/// Whether the first bytes of the file at `path` equal `signature`.
///
/// Reads only the signature-sized prefix. Short or missing files yield `false`.
pub async fn has_signature(path: &Path, signature: &[u8]) -> Result<bool> {
    use tokio::io::AsyncReadExt;

    let mut file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ThreatdocError::Io(e)),
    };

    let mut header = vec![0u8; signature.len()];
    match file.read_exact(&mut header).await {
        Ok(_) => Ok(header == signature),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(ThreatdocError::Io(e)),
    }
}

/// Lower-cased extension of `path` without the leading dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
