//! Prepared statement sessions.
//!
//! A [`PreparedSession`] compiles one statement on one connection and executes
//! it repeatedly with different parameters. [`PreparedSession::close`] releases
//! the server-side statement and consumes the session, so it runs at most
//! once. A session dropped without `close` (early return, `?`, panic) marks
//! its connection broken; the pool then closes that physical connection, which
//! frees the statement on the server.

use crate::context::Context;
use crate::db::connection::DbConnection;
use crate::db::executor::ExecResult;
use crate::db::params::{bind_all_mysql, bind_all_sqlite};
use crate::db::pool::PooledConnection;
use crate::db::statement::Statement;
use crate::db::types::{FromRow, Row};
use crate::error::{DbError, DbResult};
use crate::models::Value;
use sqlx::Statement as _;
use sqlx::mysql::MySqlStatement;
use sqlx::sqlite::SqliteStatement;
use std::time::Duration;
use tracing::{debug, warn};

enum Compiled {
    MySql(MySqlStatement<'static>),
    SQLite(SqliteStatement<'static>),
}

/// A statement compiled once on a connection, executable many times.
pub struct PreparedSession<'c> {
    raw: &'c mut DbConnection,
    broken: &'c mut bool,
    connection_id: u64,
    statement: Statement,
    compiled: Compiled,
    placeholders: usize,
    ctx: Context,
    timeout: Duration,
    executions: u64,
    closed: bool,
}

impl<'c> PreparedSession<'c> {
    pub(crate) async fn open(
        ctx: Context,
        timeout: Duration,
        conn: &'c mut PooledConnection,
        statement: Statement,
        placeholders: usize,
    ) -> DbResult<Self> {
        let connection_id = conn.id();
        let (raw, broken) = conn.parts_mut()?;

        let compiled = ctx
            .timeout(timeout)
            .run("prepare", compile(&mut *raw, statement.sql()))
            .await;
        let compiled = match compiled {
            Ok(compiled) => compiled,
            Err(e) => {
                if e.breaks_connection() {
                    *broken = true;
                }
                return Err(e);
            }
        };

        Ok(Self {
            raw,
            broken,
            connection_id,
            statement,
            compiled,
            placeholders,
            ctx,
            timeout,
            executions: 0,
            closed: false,
        })
    }

    pub fn statement(&self) -> Statement {
        self.statement
    }

    /// Number of `?` placeholders each execution must bind.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Number of successful executions so far.
    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Execute the compiled statement with `params`.
    pub async fn execute(&mut self, params: &[Value]) -> DbResult<ExecResult> {
        self.check_arity(params)?;

        let ctx = self.ctx.timeout(self.timeout);
        let result = ctx
            .run(
                "prepared execute",
                execute_compiled(&mut *self.raw, &self.compiled, params),
            )
            .await;
        self.observe(&result);
        if result.is_ok() {
            self.executions += 1;
        }
        result
    }

    /// Run the compiled statement as a query and map every row.
    pub async fn query_all<T: FromRow>(&mut self, params: &[Value]) -> DbResult<Vec<T>> {
        self.check_arity(params)?;

        let ctx = self.ctx.timeout(self.timeout);
        let result = ctx
            .run(
                "prepared query",
                fetch_all_compiled(&mut *self.raw, &self.compiled, params),
            )
            .await;
        self.observe(&result);
        let rows = result?;
        self.executions += 1;
        rows.iter().map(Row::scan::<T>).collect()
    }

    /// Release the server-side statement.
    ///
    /// The driver has no per-statement close, so this clears every statement
    /// cached on the connection, not only this session's. Later statements on
    /// the connection are prepared again on first use.
    pub async fn close(mut self) -> DbResult<()> {
        self.closed = true;
        let result = self
            .ctx
            .timeout(self.timeout)
            .run("close statement", self.raw.clear_cached_statements())
            .await;
        if result.is_err() {
            // The statement may still exist on the server
            *self.broken = true;
        }
        debug!(
            connection_id = self.connection_id,
            executions = self.executions,
            "Prepared statement closed"
        );
        result
    }

    fn check_arity(&self, params: &[Value]) -> DbResult<()> {
        if params.len() != self.placeholders {
            return Err(DbError::invalid_input(format!(
                "Prepared statement expects {} parameter(s), got {}",
                self.placeholders,
                params.len()
            )));
        }
        Ok(())
    }

    fn observe<T>(&mut self, result: &DbResult<T>) {
        if let Err(e) = result {
            if e.breaks_connection() {
                *self.broken = true;
            }
        }
    }
}

impl Drop for PreparedSession<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        *self.broken = true;
        warn!(
            connection_id = self.connection_id,
            sql = %self.statement,
            "Prepared session dropped without close(); connection will be discarded"
        );
    }
}

impl std::fmt::Debug for PreparedSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedSession")
            .field("connection_id", &self.connection_id)
            .field("statement", &self.statement)
            .field("placeholders", &self.placeholders)
            .field("executions", &self.executions)
            .finish_non_exhaustive()
    }
}

async fn compile(raw: &mut DbConnection, sql: &'static str) -> DbResult<Compiled> {
    let compiled = match raw {
        DbConnection::MySql(c) => {
            Compiled::MySql(sqlx::Executor::prepare(&mut *c, sql).await?)
        }
        DbConnection::SQLite(c) => {
            Compiled::SQLite(sqlx::Executor::prepare(&mut *c, sql).await?)
        }
    };
    Ok(compiled)
}

async fn execute_compiled(
    raw: &mut DbConnection,
    compiled: &Compiled,
    params: &[Value],
) -> DbResult<ExecResult> {
    match (raw, compiled) {
        (DbConnection::MySql(c), Compiled::MySql(stmt)) => {
            let result = bind_all_mysql(stmt.query(), params)
                .execute(&mut *c)
                .await?;
            Ok(ExecResult::from_mysql(&result))
        }
        (DbConnection::SQLite(c), Compiled::SQLite(stmt)) => {
            let result = bind_all_sqlite(stmt.query(), params)
                .execute(&mut *c)
                .await?;
            Ok(ExecResult::from_sqlite(&result))
        }
        _ => Err(DbError::internal(
            "prepared statement does not belong to this connection",
        )),
    }
}

async fn fetch_all_compiled(
    raw: &mut DbConnection,
    compiled: &Compiled,
    params: &[Value],
) -> DbResult<Vec<Row>> {
    match (raw, compiled) {
        (DbConnection::MySql(c), Compiled::MySql(stmt)) => {
            let rows = bind_all_mysql(stmt.query(), params)
                .fetch_all(&mut *c)
                .await?;
            Ok(rows.into_iter().map(Row::from).collect())
        }
        (DbConnection::SQLite(c), Compiled::SQLite(stmt)) => {
            let rows = bind_all_sqlite(stmt.query(), params)
                .fetch_all(&mut *c)
                .await?;
            Ok(rows.into_iter().map(Row::from).collect())
        }
        _ => Err(DbError::internal(
            "prepared statement does not belong to this connection",
        )),
    }
}
