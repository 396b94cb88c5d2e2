//! Container-format extraction for Office Open XML packages.

#[cfg(feature = "office")]
pub mod docx;

#[cfg(feature = "excel")]
pub mod excel;

pub mod office_metadata;

#[cfg(feature = "office")]
pub use docx::extract_docx;

#[cfg(feature = "excel")]
pub use excel::extract_xlsx;

pub use office_metadata::{AppProperties, CoreProperties, CustomProperties, read_package_metadata};
