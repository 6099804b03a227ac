//! Data models.
//!
//! Connection targets, bind values and the example entities stored through
//! [`Repository`](crate::repository::Repository).

pub mod comment;
pub mod connection;
pub mod customer;
pub mod value;

pub use comment::Comment;
pub use connection::{ConnectTarget, DEFAULT_MYSQL_PORT, DatabaseType};
pub use customer::Customer;
pub use value::Value;
