/// # Test Utilities Module
///
/// Shared fixtures for unit and integration tests:
/// - An in-memory [`MockCursor`] for driving readers without a database
/// - SQLite database fixtures with a small accounts schema
/// - Error assertion helpers

use crate::core::db::cursor::{ColumnMeta, Cursor};
use crate::core::db::sqlite::SqliteConnector;
use crate::core::db::Connector;
use crate::core::{DataReaderError, Result, Value};
use std::collections::VecDeque;

/// Cursor over rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct MockCursor {
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Vec<Value>>,
    fail_metadata: bool,
    closed: bool,
}

impl MockCursor {
    /// Creates a cursor with `(name, declared type)` columns and no rows.
    pub fn new(columns: &[(&str, &str)]) -> Self {
        MockCursor {
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnMeta::from_declared(*name, ty))
                .collect(),
            ..MockCursor::default()
        }
    }

    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push_back(row);
        self
    }

    /// Makes `columns()` fail, as a driver does when metadata is unavailable.
    pub fn failing_metadata(mut self) -> Self {
        self.fail_metadata = true;
        self
    }
}

impl Cursor for MockCursor {
    fn columns(&self) -> Result<Vec<ColumnMeta>> {
        if self.fail_metadata {
            return Err(DataReaderError::Connectivity(
                "metadata request failed".to_string(),
            ));
        }
        Ok(self.columns.clone())
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }
}

const ACCOUNTS_SCHEMA: &str = "
    CREATE TABLE accounts (
        id BIGINT PRIMARY KEY,
        name VARCHAR(40),
        active BOOL NOT NULL,
        balance DECIMAL(10,2)
    );

    CREATE TABLE audit (
        account_id INT NOT NULL REFERENCES accounts (id),
        happened DATETIME NOT NULL
    );

    INSERT INTO accounts (id, name, active, balance) VALUES (1, 'Alice', 1, 10.5);
    INSERT INTO accounts (id, name, active, balance) VALUES (2, NULL, 0, NULL);
";

/// Isolated in-memory SQLite database with an open connector.
pub struct DatabaseFixture {
    pub connector: SqliteConnector,
}

impl DatabaseFixture {
    /// Opens an empty in-memory database.
    pub fn new() -> Result<Self> {
        let mut connector = SqliteConnector::in_memory();
        connector.open()?;
        Ok(DatabaseFixture { connector })
    }

    /// Opens an in-memory database holding the `accounts` and `audit` tables,
    /// with rows `(1, 'Alice', true, 10.5)` and `(2, NULL, false, NULL)`.
    pub fn with_accounts() -> Result<Self> {
        let mut fixture = DatabaseFixture::new()?;
        fixture.connector.execute_batch(ACCOUNTS_SCHEMA)?;
        Ok(fixture)
    }

    /// Writes the accounts schema into a database file at `path`.
    pub fn seed_file(path: &str) -> Result<()> {
        let mut connector = SqliteConnector::new(path);
        connector.open()?;
        connector.execute_batch(ACCOUNTS_SCHEMA)?;
        connector.close();
        Ok(())
    }
}

/// Error testing utilities
pub mod error_testing {
    /// Asserts that `result` failed with a message containing `fragment`.
    pub fn assert_error_message<T, E>(
        result: &std::result::Result<T, E>,
        fragment: &str,
        context: &str,
    ) where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => panic!("Expected error but got Ok in {}", context),
            Err(e) => {
                let error_str = e.to_string();
                assert!(
                    error_str.to_lowercase().contains(&fragment.to_lowercase()),
                    "Expected '{}' in error message '{}' context: {}",
                    fragment,
                    error_str,
                    context
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_cursor_yields_rows_then_none() {
        let mut cursor = MockCursor::new(&[("id", "INT")])
            .with_row(vec![Value::Int32(1)])
            .with_row(vec![Value::Int32(2)]);

        assert_eq!(cursor.next_row().unwrap(), Some(vec![Value::Int32(1)]));
        assert_eq!(cursor.next_row().unwrap(), Some(vec![Value::Int32(2)]));
        assert_eq!(cursor.next_row().unwrap(), None);
    }

    #[test]
    fn test_mock_cursor_close() {
        let mut cursor = MockCursor::new(&[("id", "INT")]).with_row(vec![Value::Int32(1)]);
        cursor.close().unwrap();
        assert_eq!(cursor.next_row().unwrap(), None);
    }

    #[test]
    fn test_accounts_fixture() {
        let mut fixture = DatabaseFixture::with_accounts().unwrap();
        let mut reader = fixture
            .connector
            .query("SELECT COUNT(*) AS n FROM accounts", &[])
            .unwrap();
        assert!(reader.advance().unwrap());
        assert_eq!(reader.value(0), Value::Text("2".into()));
    }

    #[test]
    fn test_error_message_helper() {
        let result: Result<()> = Err(DataReaderError::QueryExecution("no such table: x".into()));
        error_testing::assert_error_message(&result, "no such table", "helper self-test");
    }
}
