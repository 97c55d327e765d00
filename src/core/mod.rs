/// Core Module for datareader
///
/// This module contains the shared building blocks: the error taxonomy, the
/// nullable scalar model and the database layer built on top of them.

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{DataReaderError, Result};
pub use value::{ScalarKind, Slot, Value};
