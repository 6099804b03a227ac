//! Error types for the data-access layer.
//!
//! Errors are layered: [`DbError`] covers the pool, statement execution and
//! row decoding, [`ScanError`] details decoding failures, and
//! [`RepositoryError`] adds entity-level context on top of both.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        suggestion: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g., "23000" for an integrity constraint violation
        sql_state: Option<String>,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Deadline exceeded: {operation}")]
    DeadlineExceeded { operation: String },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Row decoding failures.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("expected {expected} columns, row has {actual}")]
    ColumnCount { expected: usize, actual: usize },

    #[error("column {index} ({column}) cannot be decoded: {message}")]
    TypeMismatch {
        index: usize,
        column: String,
        message: String,
    },

    #[error("column {index} ({column}) is NULL but the destination is not nullable")]
    UnexpectedNull { index: usize, column: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
            source: None,
        }
    }

    /// Create a connection error carrying the transport failure.
    pub fn connection_from(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        source: sqlx::Error,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
            source: Some(source),
        }
    }

    /// Create a query error with optional SQL state.
    pub fn query(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql_state,
            source: None,
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn deadline_exceeded(operation: impl Into<String>) -> Self {
        Self::DeadlineExceeded {
            operation: operation.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { .. } => Some("Check the SQL syntax and referenced objects"),
            Self::DeadlineExceeded { .. } => {
                Some("Consider increasing the deadline or optimizing the operation")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::DeadlineExceeded { .. }
        )
    }

    /// True when the connection that produced this error can no longer be
    /// trusted and must not go back to the idle set.
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Cancelled { .. } | Self::DeadlineExceeded { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(ref msg) => {
                let message = msg.to_string();
                DbError::connection_from(
                    message,
                    "Check the connection string format and credentials",
                    err,
                )
            }
            sqlx::Error::Database(ref db_err) => {
                let message = db_err.message().to_string();
                let sql_state = db_err.code().map(|c| c.to_string());
                DbError::Query {
                    message,
                    sql_state,
                    source: Some(err),
                }
            }
            sqlx::Error::Io(ref io_err) => {
                let message = format!("I/O error: {}", io_err);
                DbError::connection_from(
                    message,
                    "Check network connectivity and database server status",
                    err,
                )
            }
            sqlx::Error::Tls(ref tls_err) => {
                let message = format!("TLS error: {}", tls_err);
                DbError::connection_from(message, "Verify TLS configuration and certificates", err)
            }
            sqlx::Error::Protocol(ref msg) => {
                let message = format!("Protocol error: {}", msg);
                DbError::connection_from(message, "Check database server compatibility", err)
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => DbError::PoolClosed,
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                DbError::Scan(ScanError::ColumnCount {
                    expected: index + 1,
                    actual: len,
                })
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::Scan(ScanError::TypeMismatch {
                    index: index.parse().unwrap_or_default(),
                    column: index,
                    message: source.to_string(),
                })
            }
            sqlx::Error::ColumnNotFound(col) => DbError::Scan(ScanError::TypeMismatch {
                index: 0,
                message: format!("column not found: {}", col),
                column: col,
            }),
            sqlx::Error::RowNotFound => DbError::query("No rows returned", None),
            sqlx::Error::WorkerCrashed => {
                DbError::connection_from("Database worker crashed", "Reconnect to the database", err)
            }
            other => DbError::internal(format!("Unknown database error: {}", other)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Entity-level errors returned by repositories.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} {operation} failed: {source}")]
    Db {
        entity: &'static str,
        operation: &'static str,
        #[source]
        source: DbError,
    },
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Wrap a lower-level error with entity context.
    pub fn db(entity: &'static str, operation: &'static str, source: DbError) -> Self {
        Self::Db {
            entity,
            operation,
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The wrapped lower-level error, if any.
    pub fn db_error(&self) -> Option<&DbError> {
        match self {
            Self::Db { source, .. } => Some(source),
            Self::NotFound { .. } => None,
        }
    }
}

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;
