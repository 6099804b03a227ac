//! Shared setup for the SQLite-backed integration tests.

#![allow(dead_code)]

use db_repository::Context;
use db_repository::config::PoolOptions;
use db_repository::db::{ConnectionPool, QueryExecutor, Statement};
use db_repository::models::ConnectTarget;
use std::time::Duration;
use tempfile::TempDir;

pub const CREATE_COMMENTS: Statement = Statement::new(
    "CREATE TABLE comments (\
     id INTEGER PRIMARY KEY AUTOINCREMENT, \
     email TEXT NOT NULL, \
     comment TEXT NOT NULL)",
);

pub const CREATE_CUSTOMER: Statement = Statement::new(
    "CREATE TABLE customer (\
     id INTEGER PRIMARY KEY AUTOINCREMENT, \
     name TEXT NOT NULL, \
     email TEXT, \
     balance INTEGER NOT NULL DEFAULT 0, \
     rating REAL NOT NULL DEFAULT 0, \
     birth_date DATE, \
     married BOOLEAN NOT NULL DEFAULT 0, \
     created_at DATETIME NOT NULL)",
);

pub const CREATE_USER: Statement = Statement::new(
    "CREATE TABLE user (username TEXT PRIMARY KEY, password TEXT NOT NULL)",
);

/// A SQLite database file that lives as long as the value.
pub struct TestDb {
    pub pool: ConnectionPool,
    pub executor: QueryExecutor,
    dir: TempDir,
}

impl TestDb {
    /// Database with the `comments`, `customer` and `user` tables.
    pub async fn new() -> Self {
        Self::with_options(test_options()).await
    }

    pub async fn with_options(options: PoolOptions) -> Self {
        let dir = TempDir::new().unwrap();
        let target = ConnectTarget::sqlite(dir.path().join("test.db"));
        let pool = ConnectionPool::new(target, options).unwrap();
        let db = Self {
            pool,
            executor: QueryExecutor::with_timeout(Duration::from_secs(10)),
            dir,
        };
        db.create_tables().await;
        db
    }

    async fn create_tables(&self) {
        let ctx = ctx();
        let mut conn = self.pool.acquire(&ctx).await.unwrap();
        for statement in [CREATE_COMMENTS, CREATE_CUSTOMER, CREATE_USER] {
            self.executor
                .execute(&ctx, &mut conn, statement, &[])
                .await
                .unwrap();
        }
        conn.release().await;
    }

    /// A second pool over the same database file.
    pub fn open_pool(&self, options: PoolOptions) -> ConnectionPool {
        let target = ConnectTarget::sqlite(self.dir.path().join("test.db"));
        ConnectionPool::new(target, options).unwrap()
    }
}

/// Small pool limits that keep tests fast and deterministic.
pub fn test_options() -> PoolOptions {
    PoolOptions::default()
        .with_max_open(4)
        .with_max_idle(2)
        .with_acquire_timeout(Some(Duration::from_secs(5)))
}

/// A context generous enough for any single test step.
pub fn ctx() -> Context {
    Context::with_timeout(Duration::from_secs(10))
}
