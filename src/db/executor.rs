//! Query execution engine.
//!
//! This module provides statement execution on a checked-out connection with
//! support for:
//! - Parameterized statements (`?` placeholders, arity checked before execution)
//! - Lazy, forward-only row streams
//! - Statement timeouts layered on the caller's [`Context`]
//! - Prepared sessions (see [`PreparedSession`])
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetch and execute operations
//! - `sqlite`: SQLite-specific fetch and execute operations
//!
//! Statements without parameters go through the driver's plain text path;
//! statements with parameters are always prepared and bound.

use crate::context::Context;
use crate::db::connection::DbConnection;
use crate::db::pool::PooledConnection;
use crate::db::prepared::PreparedSession;
use crate::db::statement::Statement;
use crate::db::types::{FromRow, Row};
use crate::error::{DbError, DbResult};
use crate::models::Value;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Identifier generated by the statement, if any. Only meaningful for
    /// inserts into a table with an auto-increment key.
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    pub(crate) fn new(rows_affected: u64, last_insert_id: i64) -> Self {
        Self {
            rows_affected,
            last_insert_id: (last_insert_id > 0).then_some(last_insert_id),
        }
    }

    pub(crate) fn from_mysql(result: &sqlx::mysql::MySqlQueryResult) -> Self {
        Self::new(
            result.rows_affected(),
            i64::try_from(result.last_insert_id()).unwrap_or_default(),
        )
    }

    pub(crate) fn from_sqlite(result: &sqlx::sqlite::SqliteQueryResult) -> Self {
        Self::new(result.rows_affected(), result.last_insert_rowid())
    }
}

/// Query executor that runs statements on a checked-out connection.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    default_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new() -> Self {
        Self {
            default_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Create a query executor whose statements time out after `timeout`
    /// unless the caller's context expires first.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            default_timeout: timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn scoped(&self, ctx: &Context) -> Context {
        ctx.timeout(self.default_timeout)
    }

    /// Execute a statement that returns no rows (INSERT, UPDATE, DELETE, DDL).
    pub async fn execute(
        &self,
        ctx: &Context,
        conn: &mut PooledConnection,
        statement: Statement,
        params: &[Value],
    ) -> DbResult<ExecResult> {
        ctx.check("execute")?;
        statement.check_params(conn.db_type(), params)?;

        debug!(
            sql = %statement,
            params = params.len(),
            connection_id = conn.id(),
            "Executing statement"
        );

        let ctx = self.scoped(ctx);
        let result = {
            let raw = conn.raw_mut()?;
            ctx.run("execute", execute_on(raw, statement.sql(), params))
                .await
        };
        conn.observe(&result);
        result
    }

    /// Run a statement and return its rows as a lazy stream.
    ///
    /// The first row is fetched before returning, so a failing statement
    /// fails here rather than on the first [`Rows::next`]. The rows borrow the
    /// connection until they are drained or dropped.
    pub async fn query<'c>(
        &self,
        ctx: &Context,
        conn: &'c mut PooledConnection,
        statement: Statement,
        params: &'c [Value],
    ) -> DbResult<Rows<'c>> {
        ctx.check("query")?;
        statement.check_params(conn.db_type(), params)?;

        debug!(
            sql = %statement,
            params = params.len(),
            connection_id = conn.id(),
            "Executing query"
        );

        let ctx = self.scoped(ctx);
        let (raw, broken) = conn.parts_mut()?;
        let stream = match raw {
            DbConnection::MySql(c) => mysql::fetch(c, statement.sql(), params),
            DbConnection::SQLite(c) => sqlite::fetch(c, statement.sql(), params),
        };

        let mut rows = Rows {
            stream,
            ctx,
            broken,
            peeked: None,
            finished: false,
        };
        rows.peeked = rows.pull().await?;
        Ok(rows)
    }

    /// Run a query and map the first row, if any.
    pub async fn query_one<T: FromRow>(
        &self,
        ctx: &Context,
        conn: &mut PooledConnection,
        statement: Statement,
        params: &[Value],
    ) -> DbResult<Option<T>> {
        let mut rows = self.query(ctx, conn, statement, params).await?;
        rows.next_as::<T>().await.transpose()
    }

    /// Run a query and map every row.
    pub async fn query_all<T: FromRow>(
        &self,
        ctx: &Context,
        conn: &mut PooledConnection,
        statement: Statement,
        params: &[Value],
    ) -> DbResult<Vec<T>> {
        let rows = self.query(ctx, conn, statement, params).await?;
        rows.collect::<T>().await
    }

    /// Compile `statement` once for repeated execution on `conn`.
    pub async fn prepare<'c>(
        &self,
        ctx: &Context,
        conn: &'c mut PooledConnection,
        statement: Statement,
    ) -> DbResult<PreparedSession<'c>> {
        ctx.check("prepare")?;
        let placeholders = statement.placeholder_count(conn.db_type())?;

        debug!(
            sql = %statement,
            placeholders,
            connection_id = conn.id(),
            "Preparing statement"
        );

        PreparedSession::open(
            ctx.child(),
            self.default_timeout,
            conn,
            statement,
            placeholders,
        )
        .await
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

async fn execute_on(
    raw: &mut DbConnection,
    sql: &'static str,
    params: &[Value],
) -> DbResult<ExecResult> {
    match raw {
        DbConnection::MySql(c) => mysql::execute(c, sql, params).await,
        DbConnection::SQLite(c) => sqlite::execute(c, sql, params).await,
    }
}

async fn next_row(
    stream: &mut BoxStream<'_, Result<Row, sqlx::Error>>,
) -> DbResult<Option<Row>> {
    stream.next().await.transpose().map_err(DbError::from)
}

/// Lazy, forward-only result rows.
///
/// Dropping unconsumed rows is fine: the driver discards what is left before
/// the connection runs its next command.
pub struct Rows<'c> {
    stream: BoxStream<'c, Result<Row, sqlx::Error>>,
    ctx: Context,
    broken: &'c mut bool,
    peeked: Option<Row>,
    finished: bool,
}

impl Rows<'_> {
    async fn pull(&mut self) -> DbResult<Option<Row>> {
        if self.finished {
            return Ok(None);
        }

        let next = self.ctx.run("fetch row", next_row(&mut self.stream)).await;
        match next {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                if e.breaks_connection() {
                    *self.broken = true;
                }
                Err(e)
            }
        }
    }

    /// Fetch the next row, or `None` once the rows are exhausted.
    pub async fn next(&mut self) -> Option<DbResult<Row>> {
        if let Some(row) = self.peeked.take() {
            return Some(Ok(row));
        }
        self.pull().await.transpose()
    }

    /// Fetch the next row and map it to `T`.
    pub async fn next_as<T: FromRow>(&mut self) -> Option<DbResult<T>> {
        match self.next().await? {
            Ok(row) => Some(row.scan::<T>()),
            Err(e) => Some(Err(e)),
        }
    }

    /// Drain the remaining rows, mapping each to `T`.
    pub async fn collect<T: FromRow>(mut self) -> DbResult<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = self.next_as::<T>().await {
            out.push(item?);
        }
        Ok(out)
    }

    /// True once every row has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished && self.peeked.is_none()
    }
}

impl std::fmt::Debug for Rows<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.

mod mysql {
    use super::*;
    use crate::db::params::bind_all_mysql;
    use sqlx::MySqlConnection;

    pub fn fetch<'c>(
        conn: &'c mut MySqlConnection,
        sql: &'static str,
        params: &'c [Value],
    ) -> BoxStream<'c, Result<Row, sqlx::Error>> {
        if params.is_empty() {
            sqlx::Executor::fetch(conn, sql)
                .map(|r| r.map(Row::from))
                .boxed()
        } else {
            bind_all_mysql(sqlx::query(sql), params)
                .fetch(conn)
                .map(|r| r.map(Row::from))
                .boxed()
        }
    }

    pub async fn execute(
        conn: &mut MySqlConnection,
        sql: &'static str,
        params: &[Value],
    ) -> DbResult<ExecResult> {
        // Some statements (e.g. CREATE PROCEDURE) cannot be prepared
        let result = if params.is_empty() {
            sqlx::Executor::execute(&mut *conn, sql).await?
        } else {
            bind_all_mysql(sqlx::query(sql), params)
                .execute(&mut *conn)
                .await?
        };
        Ok(ExecResult::from_mysql(&result))
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_all_sqlite;
    use sqlx::SqliteConnection;

    pub fn fetch<'c>(
        conn: &'c mut SqliteConnection,
        sql: &'static str,
        params: &'c [Value],
    ) -> BoxStream<'c, Result<Row, sqlx::Error>> {
        if params.is_empty() {
            sqlx::Executor::fetch(conn, sql)
                .map(|r| r.map(Row::from))
                .boxed()
        } else {
            bind_all_sqlite(sqlx::query(sql), params)
                .fetch(conn)
                .map(|r| r.map(Row::from))
                .boxed()
        }
    }

    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &'static str,
        params: &[Value],
    ) -> DbResult<ExecResult> {
        let result = if params.is_empty() {
            sqlx::Executor::execute(&mut *conn, sql).await?
        } else {
            bind_all_sqlite(sqlx::query(sql), params)
                .execute(&mut *conn)
                .await?
        };
        Ok(ExecResult::from_sqlite(&result))
    }
}
