/// Cursor Module
///
/// The seam between drivers and the typed row reader. A driver exposes its
/// result set as a [`Cursor`]: column metadata once, then raw rows decoded from
/// the driver's native cell types into [`Value`]s.

use crate::core::{Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;

static DECLARED_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^(]*?)\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)\s*$").unwrap()
});

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Declared type name without length or precision, e.g. `VARCHAR`
    pub type_name: String,
    pub length: Option<i64>,
    pub precision_scale: Option<(i64, i64)>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        ColumnMeta {
            name: name.into(),
            type_name: type_name.into(),
            length: None,
            precision_scale: None,
        }
    }

    /// Builds metadata from a declared column type such as `VARCHAR(20)` or
    /// `DECIMAL(10,2)`, splitting off the length or precision and scale.
    pub fn from_declared(name: impl Into<String>, declared: &str) -> Self {
        let mut meta = ColumnMeta::new(name, "");
        match DECLARED_TYPE.captures(declared) {
            Some(caps) => {
                meta.type_name = caps[1].to_ascii_uppercase();
                let first = caps[2].parse::<i64>().ok();
                let second = caps.get(3).and_then(|m| m.as_str().parse::<i64>().ok());
                match (first, second) {
                    (Some(p), Some(s)) => meta.precision_scale = Some((p, s)),
                    (len, None) => meta.length = len,
                    _ => {}
                }
            }
            None => {
                meta.type_name = declared
                    .split('(')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_uppercase();
            }
        }
        meta
    }

    /// Type name with its length or precision, e.g. `VARCHAR(20)`.
    pub fn type_detail(&self) -> String {
        if let Some(len) = self.length {
            format!("{}({})", self.type_name, len)
        } else if let Some((precision, scale)) = self.precision_scale {
            format!("{}({},{})", self.type_name, precision, scale)
        } else {
            self.type_name.clone()
        }
    }
}

/// A forward-only result cursor.
pub trait Cursor {
    /// Column metadata in result order.
    fn columns(&self) -> Result<Vec<ColumnMeta>>;

    /// Fetches the next row, or `None` once the result set is exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;

    /// Releases the result set.
    fn close(&mut self) -> Result<()>;
}
