//! Text utilities.

pub mod truncate;
