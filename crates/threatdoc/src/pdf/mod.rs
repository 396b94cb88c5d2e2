//! PDF document processing utilities.
//!
//! Low-level helpers used by the PDF strategy:
//!
//! - **Loading**: parse with `lopdf`, unlock encrypted files with the empty or configured password
//! - **Text extraction**: walk each page's content stream for text-show operators
//! - **Metadata extraction**: read the trailer `Info` dictionary
//! - **Image extraction**: collect page image XObjects for the OCR fallback
//!
//! # Example
//!
//! ```rust,no_run
//! use threatdoc::pdf::{load_document, extract_metadata};
//! use threatdoc::pdf::text::{assemble, extract_pages};
//! use threatdoc::CancellationToken;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("advisory.pdf")?;
//! let document = load_document(&bytes, None)?;
//!
//! let pages = extract_pages(&document, &CancellationToken::new())?;
//! println!("{}", assemble(&pages));
//!
//! let metadata = extract_metadata(&document)?;
//! println!("Title: {:?}", metadata.title);
//! # Ok(())
//! # }
//! ```

mod document;
pub mod error;
pub mod images;
pub mod metadata;
pub mod text;

pub use document::{has_encrypt_marker, load_document};
pub use error::PdfError;
pub use metadata::{extract_metadata, parse_pdf_date};
