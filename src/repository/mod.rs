//! Generic per-entity repositories.
//!
//! A [`Repository<E>`] performs parameterized CRUD for one [`Entity`] type. The
//! entity supplies its static statements, its parameter lists and its row
//! mapping; the repository takes care of checking connections out of the pool,
//! running statements and wrapping errors with entity context.

use crate::context::Context;
use crate::db::{
    ConnectionPool, ExecResult, FromRow, PooledConnection, QueryExecutor, Statement,
};
use crate::error::{DbError, RepositoryError, RepositoryResult};
use crate::models::Value;
use std::marker::PhantomData;
use tracing::debug;

/// A record stored in one table with a store-generated integer identifier.
///
/// Statements are `'static` templates with `?` placeholders:
///
/// - `INSERT` binds [`insert_params`](Entity::insert_params)
/// - `SELECT_BY_ID`, `DELETE` bind the identifier
/// - `UPDATE` binds [`update_params`](Entity::update_params)
/// - the `SELECT_*` statements return columns in the order
///   [`FromRow::from_row`] expects
pub trait Entity: FromRow + Send + Sync {
    /// Entity name used in errors and logs.
    const NAME: &'static str;

    const INSERT: Statement;
    const SELECT_BY_ID: Statement;
    /// All rows in store-defined order.
    const SELECT_ALL: Statement;
    const SELECT_ALL_ASC: Statement;
    const SELECT_ALL_DESC: Statement;
    const UPDATE: Statement;
    const DELETE: Statement;
    /// Must return a single integer column.
    const COUNT: Statement;

    /// The identifier, absent until the entity has been persisted.
    fn id(&self) -> Option<i64>;

    /// Attach the identifier assigned by the store.
    fn with_id(self, id: i64) -> Self;

    /// Values for `INSERT`, in placeholder order.
    fn insert_params(&self) -> Vec<Value>;

    /// Values for `UPDATE`, in placeholder order; the identifier is last.
    fn update_params(&self, id: i64) -> Vec<Value>;
}

/// Ordering for [`Repository::find_all_ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdOrder {
    #[default]
    Ascending,
    Descending,
}

/// CRUD access to one entity type.
pub struct Repository<E> {
    pool: ConnectionPool,
    executor: QueryExecutor,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            executor: self.executor,
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &std::any::type_name::<E>())
            .field("pool", &self.pool)
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(pool: ConnectionPool) -> Self {
        Self::with_executor(pool, QueryExecutor::new())
    }

    pub fn with_executor(pool: ConnectionPool, executor: QueryExecutor) -> Self {
        Self {
            pool,
            executor,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn wrap(operation: &'static str) -> impl Fn(DbError) -> RepositoryError {
        move |e| RepositoryError::db(E::NAME, operation, e)
    }

    async fn acquire(
        &self,
        ctx: &Context,
        operation: &'static str,
    ) -> RepositoryResult<PooledConnection> {
        self.pool.acquire(ctx).await.map_err(Self::wrap(operation))
    }

    /// Persist a new entity and return it with its generated identifier.
    pub async fn insert(&self, ctx: &Context, entity: E) -> RepositoryResult<E> {
        if let Some(id) = entity.id() {
            return Err(RepositoryError::db(
                E::NAME,
                "insert",
                DbError::invalid_input(format!("entity already has id {}", id)),
            ));
        }

        let params = entity.insert_params();
        let mut conn = self.acquire(ctx, "insert").await?;
        let result = self
            .executor
            .execute(ctx, &mut conn, E::INSERT, &params)
            .await;
        conn.release().await;

        let id = generated_id(result).map_err(Self::wrap("insert"))?;
        debug!(entity = E::NAME, id, "Inserted");
        Ok(entity.with_id(id))
    }

    /// Persist several entities through one prepared statement.
    ///
    /// Entities are inserted one execution at a time without a surrounding
    /// transaction: on failure, entities inserted before the failing one stay
    /// persisted.
    pub async fn insert_batch(
        &self,
        ctx: &Context,
        entities: Vec<E>,
    ) -> RepositoryResult<Vec<E>> {
        if let Some(id) = entities.iter().find_map(|e| e.id()) {
            return Err(RepositoryError::db(
                E::NAME,
                "insert_batch",
                DbError::invalid_input(format!("entity already has id {}", id)),
            ));
        }
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.acquire(ctx, "insert_batch").await?;
        let outcome = self.insert_each(ctx, &mut conn, entities).await;
        conn.release().await;

        let inserted = outcome.map_err(Self::wrap("insert_batch"))?;
        debug!(entity = E::NAME, count = inserted.len(), "Inserted batch");
        Ok(inserted)
    }

    async fn insert_each(
        &self,
        ctx: &Context,
        conn: &mut PooledConnection,
        entities: Vec<E>,
    ) -> Result<Vec<E>, DbError> {
        let mut session = self.executor.prepare(ctx, conn, E::INSERT).await?;

        let mut inserted = Vec::with_capacity(entities.len());
        let mut failure = None;
        for entity in entities {
            let params = entity.insert_params();
            match generated_id(session.execute(&params).await) {
                Ok(id) => inserted.push(entity.with_id(id)),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let closed = session.close().await;
        if let Some(e) = failure {
            return Err(e);
        }
        closed?;
        Ok(inserted)
    }

    /// Load the entity with `id`.
    pub async fn find_by_id(&self, ctx: &Context, id: i64) -> RepositoryResult<E> {
        let mut conn = self.acquire(ctx, "find_by_id").await?;
        let found = self
            .executor
            .query_one::<E>(ctx, &mut conn, E::SELECT_BY_ID, &[Value::Int(id)])
            .await;
        conn.release().await;

        found
            .map_err(Self::wrap("find_by_id"))?
            .ok_or_else(|| RepositoryError::not_found(E::NAME, id))
    }

    /// Load every entity, in store-defined order.
    pub async fn find_all(&self, ctx: &Context) -> RepositoryResult<Vec<E>> {
        self.fetch_all(ctx, "find_all", E::SELECT_ALL).await
    }

    /// Load every entity ordered by identifier.
    pub async fn find_all_ordered(
        &self,
        ctx: &Context,
        order: IdOrder,
    ) -> RepositoryResult<Vec<E>> {
        let statement = match order {
            IdOrder::Ascending => E::SELECT_ALL_ASC,
            IdOrder::Descending => E::SELECT_ALL_DESC,
        };
        self.fetch_all(ctx, "find_all_ordered", statement).await
    }

    async fn fetch_all(
        &self,
        ctx: &Context,
        operation: &'static str,
        statement: Statement,
    ) -> RepositoryResult<Vec<E>> {
        let mut conn = self.acquire(ctx, operation).await?;
        let rows = self
            .executor
            .query_all::<E>(ctx, &mut conn, statement, &[])
            .await;
        conn.release().await;
        rows.map_err(Self::wrap(operation))
    }

    /// Overwrite the stored fields of an already persisted entity.
    pub async fn update(&self, ctx: &Context, entity: &E) -> RepositoryResult<()> {
        let Some(id) = entity.id() else {
            return Err(RepositoryError::db(
                E::NAME,
                "update",
                DbError::invalid_input("entity has no id; insert it first"),
            ));
        };

        let params = entity.update_params(id);
        let result = self.execute(ctx, "update", E::UPDATE, &params).await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found(E::NAME, id));
        }
        Ok(())
    }

    /// Delete the entity with `id`.
    pub async fn delete(&self, ctx: &Context, id: i64) -> RepositoryResult<()> {
        let result = self
            .execute(ctx, "delete", E::DELETE, &[Value::Int(id)])
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found(E::NAME, id));
        }
        Ok(())
    }

    /// Number of stored entities.
    pub async fn count(&self, ctx: &Context) -> RepositoryResult<i64> {
        let mut conn = self.acquire(ctx, "count").await?;
        let counted = self
            .executor
            .query_one::<(i64,)>(ctx, &mut conn, E::COUNT, &[])
            .await;
        conn.release().await;

        let (count,) = counted.map_err(Self::wrap("count"))?.ok_or_else(|| {
            RepositoryError::db(
                E::NAME,
                "count",
                DbError::query("COUNT returned no row", None),
            )
        })?;
        Ok(count)
    }

    async fn execute(
        &self,
        ctx: &Context,
        operation: &'static str,
        statement: Statement,
        params: &[Value],
    ) -> RepositoryResult<ExecResult> {
        let mut conn = self.acquire(ctx, operation).await?;
        let result = self
            .executor
            .execute(ctx, &mut conn, statement, params)
            .await;
        conn.release().await;
        result.map_err(Self::wrap(operation))
    }
}

/// The identifier generated by an entity INSERT.
///
/// An INSERT that stored nothing has no identifier of its own; SQLite would
/// still report the connection's previous rowid.
fn generated_id(result: Result<ExecResult, DbError>) -> Result<i64, DbError> {
    let result = result?;
    if result.rows_affected == 0 {
        return Err(DbError::query("INSERT stored no row", None));
    }
    result
        .last_insert_id
        .ok_or_else(|| DbError::query("the store did not report a generated identifier", None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_requires_a_stored_row() {
        assert_eq!(generated_id(Ok(ExecResult::new(1, 42))).unwrap(), 42);

        let err = generated_id(Ok(ExecResult::new(0, 42))).unwrap_err();
        assert!(matches!(err, DbError::Query { .. }), "got {err:?}");

        let err = generated_id(Ok(ExecResult::new(1, 0))).unwrap_err();
        assert!(matches!(err, DbError::Query { .. }), "got {err:?}");
    }
}
