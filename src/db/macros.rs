//! Database dispatch macros for reducing code duplication.
//!
//! The backend connection is an enum with one variant per store; these macros
//! expand the per-variant match arms at compile time.

/// Macro for generating database dispatch match arms.
///
/// This macro generates match arms for `DbConnection` variants, reducing the
/// need to manually write repetitive match statements.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(conn, {
///     MySql(c) => c.ping().await,
///     SQLite(c) => c.ping().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::connection::DbConnection::$variant($c) => $body,
            )+
        }
    };
}

/// Build a parameter list from heterogeneous values.
///
/// ```ignore
/// let params = params!["a@example.com", 42_i64, None::<String>];
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::models::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::models::Value::from($value)),+]
    };
}

pub use impl_db_dispatch;
pub use params;
