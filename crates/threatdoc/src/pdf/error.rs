use std::fmt;

#[derive(Debug, Clone)]
pub enum PdfError {
    InvalidPdf(String),
    PasswordRequired,
    InvalidPassword,
    EncryptionNotSupported(String),
    TextExtractionFailed(String),
    MetadataExtractionFailed(String),
    ImageExtractionFailed(String),
    Cancelled,
    IOError(String),
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::InvalidPdf(msg) => write!(f, "Invalid PDF: {}", msg),
            PdfError::PasswordRequired => write!(f, "PDF is password-protected and no password was supplied"),
            PdfError::InvalidPassword => write!(f, "PDF is password-protected and the configured password was rejected"),
            PdfError::EncryptionNotSupported(msg) => write!(f, "Encryption not supported: {}", msg),
            PdfError::TextExtractionFailed(msg) => write!(f, "Text extraction failed: {}", msg),
            PdfError::MetadataExtractionFailed(msg) => write!(f, "Metadata extraction failed: {}", msg),
            PdfError::ImageExtractionFailed(msg) => write!(f, "Image extraction failed: {}", msg),
            PdfError::Cancelled => write!(f, "PDF processing cancelled"),
            PdfError::IOError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<lopdf::Error> for PdfError {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(io_err) => PdfError::IOError(io_err.to_string()),
            _ => PdfError::InvalidPdf(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;
