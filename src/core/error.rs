/// Datareader Error Module
///
/// This module defines the error taxonomy shared by readers, connectors and the
/// configuration layer. Failures are split by who can act on them: a broken
/// contract between code and schema is fatal, connectivity and execution
/// failures are handed back to the caller.
use thiserror::Error;

/// Error type for every fallible datareader operation.
///
/// SQL NULL is never an error; it is carried as [`crate::core::Value::Null`].
#[derive(Error, Debug)]
pub enum DataReaderError {
    /// Column metadata could not be read or a value does not fit its declared type
    #[error("Schema contract violation: {0}")]
    SchemaContract(String),

    /// The connection could not be established, verified or used
    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    /// The driver rejected the statement (syntax, constraint, missing table, ...)
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataReaderError {
    /// Returns `true` for operational failures the caller may retry or report.
    ///
    /// Schema contract violations are programmer errors and are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DataReaderError::SchemaContract(_))
    }
}

/// Type alias for Result to use DataReaderError as the error type.
pub type Result<T> = std::result::Result<T, DataReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let schema_err = DataReaderError::SchemaContract("bad column".to_string());
        assert!(schema_err.to_string().contains("Schema contract violation"));

        let conn_err = DataReaderError::Connectivity("refused".to_string());
        assert!(conn_err.to_string().contains("Connectivity failure"));

        let query_err = DataReaderError::QueryExecution("syntax error".to_string());
        assert!(query_err.to_string().contains("Query execution failed"));
    }

    #[test]
    fn test_recoverability() {
        assert!(!DataReaderError::SchemaContract("x".into()).is_recoverable());
        assert!(DataReaderError::Connectivity("x".into()).is_recoverable());
        assert!(DataReaderError::QueryExecution("x".into()).is_recoverable());
        assert!(DataReaderError::Config("x".into()).is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DataReaderError = io_err.into();
        match err {
            DataReaderError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err: std::result::Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{ invalid json }");
        let err: DataReaderError = json_err.unwrap_err().into();
        match err {
            DataReaderError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }
}
