//! Loading and unlocking PDF documents.

use lopdf::{Document, Object};
use memchr::memmem;

use super::error::{PdfError, Result};

const ENCRYPT_KEY: &[u8] = b"/Encrypt";
// Same length as `/Encrypt` so every xref offset stays valid.
const MASKED_ENCRYPT_KEY: &[u8] = b"/Xncrypt";

/// Whether the raw bytes reference an encryption dictionary.
pub fn has_encrypt_marker(content: &[u8]) -> bool {
    memmem::find_iter(content, ENCRYPT_KEY).any(|pos| ends_name(content, pos + ENCRYPT_KEY.len()))
}

fn ends_name(content: &[u8], pos: usize) -> bool {
    match content.get(pos) {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || b"()<>[]{}/%".contains(byte),
    }
}

/// Parse `content`, unlocking it if it is encrypted.
///
/// The empty user password is tried first. When that fails, `password` is tried
/// exactly once; there is no further retry.
pub fn load_document(content: &[u8], password: Option<&str>) -> Result<Document> {
    let document = match Document::load_mem(content) {
        Ok(document) => document,
        Err(err) if has_encrypt_marker(content) => {
            tracing::debug!("Encrypted PDF could not be parsed: {}", err);
            return Err(match password {
                Some(_) => PdfError::InvalidPassword,
                None => PdfError::PasswordRequired,
            });
        }
        Err(err) => return Err(err.into()),
    };

    if !document.is_encrypted() {
        return Ok(document);
    }

    // lopdf decrypts during parsing when the empty user password works.
    if document.encryption_state.is_some() {
        tracing::debug!("Opened encrypted PDF with the empty user password");
        return Ok(document);
    }

    // Otherwise only the encryption dictionary was parsed.
    if document.authenticate_password("").is_ok() {
        return unlock(content, "");
    }

    match password {
        None => Err(PdfError::PasswordRequired),
        Some(password) => {
            if let Err(err) = document.authenticate_password(password) {
                tracing::debug!("Configured PDF password rejected: {}", err);
                return Err(PdfError::InvalidPassword);
            }
            tracing::debug!("Opened encrypted PDF with the configured password");
            unlock(content, password)
        }
    }
}

/// Re-parse every object with the encryption reference hidden from the
/// reader, then decrypt them with an authenticated password.
fn unlock(content: &[u8], password: &str) -> Result<Document> {
    let mut masked = content.to_vec();
    let positions: Vec<usize> = memmem::find_iter(content, ENCRYPT_KEY)
        .filter(|&pos| ends_name(content, pos + ENCRYPT_KEY.len()))
        .collect();
    for pos in positions {
        masked[pos..pos + MASKED_ENCRYPT_KEY.len()].copy_from_slice(MASKED_ENCRYPT_KEY);
    }

    let mut document = Document::load_mem(&masked)?;
    let reference = document
        .trailer
        .remove(&MASKED_ENCRYPT_KEY[1..])
        .ok_or_else(|| PdfError::InvalidPdf("Encryption dictionary reference missing from trailer".to_string()))?;
    let reference = match reference {
        Object::Reference(id) => Object::Reference(id),
        _ => return Err(PdfError::EncryptionNotSupported("Inline encryption dictionary".to_string())),
    };
    document.trailer.set("Encrypt", reference);

    document.decrypt(password).map_err(|err| {
        tracing::debug!("PDF decryption failed after authentication: {}", err);
        PdfError::InvalidPassword
    })?;

    if document.catalog().is_err() || document.get_pages().is_empty() {
        return Err(PdfError::InvalidPdf(
            "Decrypted PDF has no readable page tree".to_string(),
        ));
    }
    Ok(document)
}
