/// SQLite Connector Module
///
/// In-process connector backed by rusqlite. Result sets are read into memory
/// when the statement executes; the cursor hands the buffered rows to the
/// reader one at a time.

use crate::core::db::connection::{not_connected, Connector};
use crate::core::db::cursor::{ColumnMeta, Cursor};
use crate::core::db::reader::TypedRowReader;
use crate::core::{DataReaderError, Result, Value};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::collections::VecDeque;
use tracing::{debug, error, info};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int32(i) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*i))),
            Value::Int64(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Timestamp(_) => ToSqlOutput::Owned(SqlValue::Text(self.to_string())),
        })
    }
}

fn query_failed(context: &str, e: rusqlite::Error) -> DataReaderError {
    DataReaderError::QueryExecution(format!("{}: {}", context, e))
}

/// Cursor over a fully buffered SQLite result set.
#[derive(Debug)]
pub struct SqliteCursor {
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Vec<SqlValue>>,
}

impl SqliteCursor {
    /// Prepares and runs `sql`, buffering every result row.
    pub fn execute(conn: &Connection, sql: &str, args: &[Value]) -> Result<Self> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| query_failed("Failed to prepare statement", e))?;

        let columns: Vec<ColumnMeta> = stmt
            .columns()
            .iter()
            .map(|c| ColumnMeta::from_declared(c.name(), c.decl_type().unwrap_or("")))
            .collect();
        let width = columns.len();

        let mut rows = stmt
            .query(params_from_iter(args.iter()))
            .map_err(|e| query_failed("Query execution failed", e))?;

        let mut buffered = VecDeque::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| query_failed("Result processing failed", e))?
        {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let value: SqlValue = row
                    .get(i)
                    .map_err(|e| query_failed("Result processing failed", e))?;
                values.push(value);
            }
            buffered.push_back(values);
        }

        Ok(SqliteCursor {
            columns,
            rows: buffered,
        })
    }
}

impl Cursor for SqliteCursor {
    fn columns(&self) -> Result<Vec<ColumnMeta>> {
        Ok(self.columns.clone())
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let row = match self.rows.pop_front() {
            Some(row) => row,
            None => return Ok(None),
        };

        row.into_iter()
            .zip(&self.columns)
            .map(|(cell, column)| match cell {
                SqlValue::Null => Ok(Value::Null),
                SqlValue::Integer(i) => Ok(Value::Int64(i)),
                SqlValue::Real(f) => Ok(Value::Float(f)),
                SqlValue::Text(s) => Ok(Value::Text(s)),
                SqlValue::Blob(b) => String::from_utf8(b).map(Value::Text).map_err(|_| {
                    DataReaderError::SchemaContract(format!(
                        "column '{}': blob is not valid UTF-8 text",
                        column.name
                    ))
                }),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn close(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }
}

/// Connector for a SQLite database file, or `:memory:`.
#[derive(Debug)]
pub struct SqliteConnector {
    path: String,
    conn: Option<Connection>,
}

impl SqliteConnector {
    pub fn new(path: impl Into<String>) -> Self {
        SqliteConnector {
            path: path.into(),
            conn: None,
        }
    }

    pub fn in_memory() -> Self {
        SqliteConnector::new(":memory:")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Runs several `;`-separated statements, e.g. schema setup.
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        let conn = self.conn.as_ref().ok_or_else(|| not_connected("sqlite"))?;
        conn.execute_batch(sql)
            .map_err(|e| query_failed("Batch execution failed", e))
    }
}

impl Connector for SqliteConnector {
    fn open(&mut self) -> Result<()> {
        let conn = Connection::open(&self.path).map_err(|e| {
            DataReaderError::Connectivity(format!("cannot open {}: {}", self.path, e))
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .map_err(|e| {
                DataReaderError::Connectivity(format!("{} is not usable: {}", self.path, e))
            })?;

        info!("sqlite: connected to {}", self.path);
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) {
        if self.conn.take().is_some() {
            info!("sqlite: closed {}", self.path);
        }
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn query(&mut self, sql: &str, args: &[Value]) -> Result<TypedRowReader> {
        let conn = self.conn.as_ref().ok_or_else(|| not_connected("sqlite"))?;
        debug!("sqlite: query {} ({} args)", sql, args.len());

        let cursor = SqliteCursor::execute(conn, sql, args).map_err(|e| {
            error!("sqlite: {}", e);
            e
        })?;
        TypedRowReader::new(Box::new(cursor))
    }

    fn non_query(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        let conn = self.conn.as_ref().ok_or_else(|| not_connected("sqlite"))?;
        debug!("sqlite: execute {} ({} args)", sql, args.len());

        let affected = conn
            .execute(sql, params_from_iter(args.iter()))
            .map_err(|e| {
                error!("sqlite: {}", e);
                query_failed("Statement execution failed", e)
            })?;
        Ok(affected as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScalarKind;
    use crate::test_utils::{error_testing, DatabaseFixture};
    use chrono::NaiveDate;

    #[test]
    fn test_round_trip_from_real_table() {
        let mut fixture = DatabaseFixture::with_accounts().unwrap();
        let mut reader = fixture
            .connector
            .query("SELECT id, name, active, balance FROM accounts ORDER BY id", &[])
            .unwrap();

        assert_eq!(reader.column_type(0), "BIGINT");
        assert_eq!(reader.column_type_detail(1), "VARCHAR(40)");
        assert_eq!(reader.column_type_detail(3), "DECIMAL(10,2)");

        assert!(reader.advance().unwrap());
        assert_eq!(
            reader.values(),
            vec![
                Value::Int64(1),
                Value::Text("Alice".into()),
                Value::Bool(true),
                Value::Float(10.5),
            ]
        );

        assert!(reader.advance().unwrap());
        assert_eq!(
            reader.values(),
            vec![Value::Int64(2), Value::Null, Value::Bool(false), Value::Null]
        );
        assert!(!reader.advance().unwrap());
        reader.close().unwrap();
    }

    #[test]
    fn test_positional_arguments() {
        let mut fixture = DatabaseFixture::with_accounts().unwrap();
        let mut reader = fixture
            .connector
            .query(
                "SELECT name FROM accounts WHERE id = ? AND active = ?",
                &[Value::Int64(1), Value::Bool(true)],
            )
            .unwrap();

        assert!(reader.advance().unwrap());
        assert_eq!(reader.value(0), Value::Text("Alice".into()));
        assert!(!reader.advance().unwrap());
    }

    #[test]
    fn test_timestamp_and_int_columns() {
        let mut fixture = DatabaseFixture::with_accounts().unwrap();
        fixture
            .connector
            .non_query(
                "INSERT INTO audit (account_id, happened) VALUES (?, ?)",
                &[
                    Value::Int32(1),
                    Value::Timestamp(
                        NaiveDate::from_ymd_opt(2024, 3, 1)
                            .unwrap()
                            .and_hms_opt(12, 30, 0)
                            .unwrap(),
                    ),
                ],
            )
            .unwrap();

        let mut reader = fixture
            .connector
            .query("SELECT account_id, happened FROM audit", &[])
            .unwrap();
        assert_eq!(reader.column_kind(0), Some(ScalarKind::Int32));
        assert_eq!(reader.column_kind(1), Some(ScalarKind::Timestamp));

        assert!(reader.advance().unwrap());
        assert_eq!(reader.value(0), Value::Int32(1));
        assert_eq!(
            reader.value(1),
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(12, 30, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_expression_columns_read_as_text() {
        let mut conn = SqliteConnector::in_memory();
        conn.open().unwrap();
        let mut reader = conn.query("SELECT 1 + 1 AS two", &[]).unwrap();

        assert_eq!(reader.column_type(0), "");
        assert_eq!(reader.column_kind(0), Some(ScalarKind::Text));
        assert!(reader.advance().unwrap());
        assert_eq!(reader.value(0), Value::Text("2".into()));
    }

    #[test]
    fn test_empty_result_keeps_metadata() {
        let mut fixture = DatabaseFixture::with_accounts().unwrap();
        let mut reader = fixture
            .connector
            .query("SELECT id, name FROM accounts WHERE id < 0", &[])
            .unwrap();

        assert_eq!(reader.field_count(), 2);
        assert_eq!(reader.column_name(1), "name");
        assert!(!reader.advance().unwrap());
        assert!(reader.close().is_ok());
    }

    #[test]
    fn test_query_error_is_recoverable() {
        let mut conn = SqliteConnector::in_memory();
        conn.open().unwrap();

        let result = conn.query("SELECT * FROM nonexistent_table", &[]);
        assert!(matches!(result, Err(DataReaderError::QueryExecution(_))));
        error_testing::assert_error_message(&result, "no such table", "missing table");
    }

    #[test]
    fn test_query_before_open() {
        let mut conn = SqliteConnector::in_memory();
        assert!(matches!(
            conn.query("SELECT 1", &[]),
            Err(DataReaderError::Connectivity(_))
        ));
        assert!(matches!(
            conn.non_query("DELETE FROM x", &[]),
            Err(DataReaderError::Connectivity(_))
        ));
    }

    #[test]
    fn test_open_invalid_path() {
        let mut conn = SqliteConnector::new("/nonexistent/path/database.db");
        let result = conn.open();
        assert!(matches!(result, Err(DataReaderError::Connectivity(_))));
        error_testing::assert_error_message(&result, "/nonexistent/path", "unopenable file");
        assert!(!conn.is_open());
    }

    #[test]
    fn test_non_query_reports_affected_rows() {
        let mut fixture = DatabaseFixture::with_accounts().unwrap();
        let affected = fixture
            .connector
            .non_query("UPDATE accounts SET active = ?", &[Value::Bool(false)])
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[test]
    fn test_close_connector() {
        let mut conn = SqliteConnector::in_memory();
        conn.open().unwrap();
        assert!(conn.is_open());
        conn.close();
        assert!(!conn.is_open());
        conn.close();
    }
}
