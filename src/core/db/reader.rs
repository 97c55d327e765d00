/// Typed Row Reader Module
///
/// Presents a query's result set as a sequence of rows whose fields are
/// uniform nullable scalars, whatever the driver's native cell types are.
///
/// Column kinds are chosen once, from the declared type names, when the reader
/// is built. Advancing coerces each raw value into its column's kind.

use crate::core::db::cursor::{ColumnMeta, Cursor};
use crate::core::{DataReaderError, Result, ScalarKind, Slot, Value};
use tracing::debug;

/// Reader over one executed query.
///
/// Once the rows are exhausted, or the reader is closed, every field reads as
/// [`Value::Null`].
pub struct TypedRowReader {
    cursor: Option<Box<dyn Cursor>>,
    columns: Vec<ColumnMeta>,
    slots: Vec<Slot>,
    rows_read: usize,
}

impl TypedRowReader {
    /// Creates a reader over `cursor`, classifying every column.
    ///
    /// # Errors
    ///
    /// Returns `DataReaderError::SchemaContract` if the cursor cannot report
    /// its column metadata.
    pub fn new(cursor: Box<dyn Cursor>) -> Result<Self> {
        let columns = cursor.columns().map_err(|e| match e {
            DataReaderError::SchemaContract(_) => e,
            other => DataReaderError::SchemaContract(format!(
                "column metadata unavailable: {}",
                other
            )),
        })?;
        let slots = columns
            .iter()
            .map(|c| Slot::new(ScalarKind::from_type_name(&c.type_name)))
            .collect();

        Ok(TypedRowReader {
            cursor: Some(cursor),
            columns,
            slots,
            rows_read: 0,
        })
    }

    /// Moves to the next row.
    ///
    /// Returns `Ok(false)` when no rows remain; this is not an error.
    ///
    /// # Errors
    ///
    /// Returns `DataReaderError::SchemaContract` if a value cannot be scanned
    /// into its column's kind or the row width differs from the metadata. The
    /// slots are left NULL in that case.
    pub fn advance(&mut self) -> Result<bool> {
        let cursor = match self.cursor.as_mut() {
            Some(cursor) => cursor,
            None => return Ok(false),
        };

        let raw = match cursor.next_row() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Reader exhausted after {} rows", self.rows_read);
                self.clear_slots();
                return Ok(false);
            }
            Err(e) => {
                self.clear_slots();
                return Err(e);
            }
        };

        if raw.len() != self.slots.len() {
            self.clear_slots();
            return Err(DataReaderError::SchemaContract(format!(
                "row has {} values but {} columns were declared",
                raw.len(),
                self.slots.len()
            )));
        }

        for (i, value) in raw.into_iter().enumerate() {
            if let Err(e) = self.slots[i].store(value, &self.columns[i].name) {
                self.clear_slots();
                return Err(e);
            }
        }
        self.rows_read += 1;
        Ok(true)
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows successfully advanced to so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Column name, or `""` when `i` is out of range.
    pub fn column_name(&self, i: usize) -> &str {
        self.columns.get(i).map(|c| c.name.as_str()).unwrap_or("")
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Declared type name (`VARCHAR`, `DECIMAL`, ...), or `""` when `i` is out of range.
    pub fn column_type(&self, i: usize) -> &str {
        self.columns.get(i).map(|c| c.type_name.as_str()).unwrap_or("")
    }

    /// Declared type with its length or precision (`VARCHAR(5)`, `DECIMAL(10,2)`),
    /// or `""` when `i` is out of range.
    pub fn column_type_detail(&self, i: usize) -> String {
        self.columns.get(i).map(|c| c.type_detail()).unwrap_or_default()
    }

    /// The kind column `i` is read as.
    pub fn column_kind(&self, i: usize) -> Option<ScalarKind> {
        self.slots.get(i).map(|s| s.kind())
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Current value of column `i`. SQL NULL and an out-of-range index both
    /// yield [`Value::Null`]; use [`TypedRowReader::try_value`] to tell them apart.
    pub fn value(&self, i: usize) -> Value {
        self.try_value(i).unwrap_or(Value::Null)
    }

    /// Current value of column `i`, or `None` when `i` is out of range.
    pub fn try_value(&self, i: usize) -> Option<Value> {
        self.slots.get(i).map(|s| s.value().clone())
    }

    pub fn is_null(&self, i: usize) -> bool {
        self.slots.get(i).map(|s| s.value().is_null()).unwrap_or(true)
    }

    /// All values of the current row, in column order.
    pub fn values(&self) -> Vec<Value> {
        self.slots.iter().map(|s| s.value().clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    /// Releases the cursor. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.clear_slots();
        match self.cursor.take() {
            Some(mut cursor) => {
                debug!("Closing reader after {} rows", self.rows_read);
                cursor.close()
            }
            None => Ok(()),
        }
    }

    fn clear_slots(&mut self) {
        self.slots.iter_mut().for_each(Slot::clear);
    }
}

impl Iterator for TypedRowReader {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => Some(Ok(self.values())),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for TypedRowReader {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for TypedRowReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedRowReader")
            .field("columns", &self.columns)
            .field("rows_read", &self.rows_read)
            .field("closed", &self.is_closed())
            .finish()
    }
}
