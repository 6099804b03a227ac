//! Pooled, parameterized access to MySQL and SQLite.
//!
//! The crate is layered bottom-up:
//! - [`db::ConnectionPool`] hands out exclusively owned connections
//! - [`db::QueryExecutor`] runs `?`-parameterized statements on them, returning
//!   lazy [`db::Rows`] or an [`db::ExecResult`]
//! - [`db::PreparedSession`] compiles a statement once for repeated execution
//! - [`repository::Repository`] offers CRUD for any [`repository::Entity`]
//!
//! Every blocking operation takes a [`Context`] carrying a cancellation token
//! and an optional deadline.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;

pub use config::{Config, PoolOptions};
pub use context::Context;
pub use error::{DbError, DbResult, RepositoryError, RepositoryResult, ScanError};
pub use repository::{Entity, IdOrder, Repository};
