//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool with bounded open and idle connections
//! - Statement execution with lazy row streams
//! - Prepared statement sessions
//! - Row decoding into typed values
//! - Database dispatch macros for reducing code duplication

pub mod connection;
pub mod executor;
#[macro_use]
pub mod macros;
pub mod params;
pub mod pool;
pub mod prepared;
pub mod statement;
pub mod types;

pub use connection::{Connector, DbConnection};
pub use executor::{DEFAULT_QUERY_TIMEOUT, ExecResult, QueryExecutor, Rows};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use prepared::PreparedSession;
pub use statement::Statement;
pub use types::{ColumnValue, FromRow, Row};
