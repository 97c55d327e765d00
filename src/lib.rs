// Core infrastructure modules
pub mod core;

pub mod config;
pub mod test_utils;

pub use crate::core::db::{open_connector, ColumnMeta, Connector, Cursor, TypedRowReader};
pub use crate::core::{DataReaderError, Result, ScalarKind, Value};
