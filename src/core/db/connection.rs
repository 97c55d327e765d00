/// Connection Management Module
///
/// This module defines the [`Connector`] contract shared by every backend and
/// builds connectors from configuration profiles.
///
/// Every operation blocks the calling thread. The async drivers run on a
/// private current-thread runtime owned by their connector. Operations take
/// `&mut self`, so one connection serves one caller at a time.

use crate::config::ConnectionConfig;
use crate::core::db::mssql::MssqlConnector;
use crate::core::db::postgres::PostgresConnector;
use crate::core::db::reader::TypedRowReader;
use crate::core::db::sqlite::SqliteConnector;
use crate::core::{DataReaderError, Result, Value};
use tokio::runtime::Runtime;

/// A database connection that produces typed row readers.
pub trait Connector {
    /// Establishes the connection and verifies it is alive.
    fn open(&mut self) -> Result<()>;

    /// Releases the connection. Closing a closed connector is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Executes a query with positional arguments and returns a reader over
    /// its result set.
    ///
    /// # Errors
    ///
    /// `DataReaderError::Connectivity` if the connector is not open,
    /// `DataReaderError::QueryExecution` if the driver rejects the statement.
    fn query(&mut self, sql: &str, args: &[Value]) -> Result<TypedRowReader>;

    /// Executes a statement without a result set and returns the number of
    /// affected rows.
    fn non_query(&mut self, sql: &str, args: &[Value]) -> Result<u64>;
}

/// Builds the connector described by `config` and opens it.
pub fn open_connector(config: &ConnectionConfig) -> Result<Box<dyn Connector>> {
    let mut connector: Box<dyn Connector> = match config {
        ConnectionConfig::Sqlite(sqlite) => Box::new(SqliteConnector::new(sqlite.path.clone())),
        ConnectionConfig::Postgres(pg) => Box::new(PostgresConnector::from_config(pg.clone())),
        ConnectionConfig::Mssql(mssql) => Box::new(MssqlConnector::from_config(mssql.clone())),
    };
    connector.open()?;
    Ok(connector)
}

pub(crate) fn not_connected(driver: &str) -> DataReaderError {
    DataReaderError::Connectivity(format!("{}: not connected", driver))
}

pub(crate) fn connectivity(e: impl std::fmt::Display) -> DataReaderError {
    DataReaderError::Connectivity(e.to_string())
}

/// Single-threaded runtime used to drive an async driver from blocking code.
pub(crate) fn blocking_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            DataReaderError::Connectivity(format!("failed to start driver runtime: {}", e))
        })
}
