/// Database Module
///
/// This module provides the database layer of datareader, organized into
/// focused submodules.
///
/// ## Architecture
///
/// - **Cursor** (`cursor.rs`): the driver seam, column metadata plus raw rows
/// - **Typed Row Reader** (`reader.rs`): classifies columns and exposes rows as nullable scalars
/// - **Connection Management** (`connection.rs`): the `Connector` contract and profile-based construction
/// - **Drivers** (`sqlite.rs`, `postgres.rs`, `mssql.rs`): one connector and cursor per backend
///
/// ## Error Handling
///
/// All database operations return `DataReaderError`: schema contract
/// violations are fatal, connectivity and execution failures are recoverable.
pub mod connection;
pub mod cursor;
pub mod mssql;
pub mod postgres;
pub mod reader;
pub mod sqlite;

pub use connection::{open_connector, Connector};
pub use cursor::{ColumnMeta, Cursor};
pub use mssql::MssqlConnector;
pub use postgres::PostgresConnector;
pub use reader::TypedRowReader;
pub use sqlite::SqliteConnector;
