//! Typed row decoding.
//!
//! Rows are decoded by position into statically typed destinations:
//!
//! 1. [`ColumnValue`] decodes a single column of a backend row into a Rust value
//! 2. [`FromRow`] maps a whole [`Row`] to a record, checking the column count
//!
//! `Option<T>` is the nullable wrapper. A NULL column decoded into a
//! non-`Option` destination is a [`ScanError::UnexpectedNull`], never a zero
//! value.

use crate::error::{DbError, DbResult, ScanError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, ValueRef};

// =============================================================================
// Row
// =============================================================================

enum RowInner {
    MySql(MySqlRow),
    SQLite(SqliteRow),
}

/// A single result row.
pub struct Row {
    inner: RowInner,
}

impl From<MySqlRow> for Row {
    fn from(row: MySqlRow) -> Self {
        Self {
            inner: RowInner::MySql(row),
        }
    }
}

impl From<SqliteRow> for Row {
    fn from(row: SqliteRow) -> Self {
        Self {
            inner: RowInner::SQLite(row),
        }
    }
}

impl Row {
    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        match &self.inner {
            RowInner::MySql(r) => r.len(),
            RowInner::SQLite(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        match &self.inner {
            RowInner::MySql(r) => r.columns().get(index).map(|c| c.name()),
            RowInner::SQLite(r) => r.columns().get(index).map(|c| c.name()),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        (0..self.len())
            .filter_map(|i| self.column_name(i).map(str::to_string))
            .collect()
    }

    /// Fail unless the row has exactly `expected` columns.
    pub fn expect_columns(&self, expected: usize) -> DbResult<()> {
        let actual = self.len();
        if actual != expected {
            return Err(ScanError::ColumnCount { expected, actual }.into());
        }
        Ok(())
    }

    pub fn is_null(&self, index: usize) -> DbResult<bool> {
        self.check_index(index)?;
        let null = match &self.inner {
            RowInner::MySql(r) => r.try_get_raw(index)?.is_null(),
            RowInner::SQLite(r) => r.try_get_raw(index)?.is_null(),
        };
        Ok(null)
    }

    /// Decode the column at `index`.
    pub fn try_get<T: ColumnValue>(&self, index: usize) -> DbResult<T> {
        if !T::NULLABLE && self.is_null(index)? {
            return Err(ScanError::UnexpectedNull {
                index,
                column: self.column_label(index),
            }
            .into());
        }

        let decoded = match &self.inner {
            RowInner::MySql(r) => T::decode_mysql(r, index),
            RowInner::SQLite(r) => T::decode_sqlite(r, index),
        };

        decoded.map_err(|e| {
            DbError::Scan(ScanError::TypeMismatch {
                index,
                column: self.column_label(index),
                message: decode_message(e),
            })
        })
    }

    /// Map the whole row to `T`.
    pub fn scan<T: FromRow>(&self) -> DbResult<T> {
        T::from_row(self)
    }

    fn check_index(&self, index: usize) -> DbResult<()> {
        let len = self.len();
        if index >= len {
            return Err(ScanError::ColumnCount {
                expected: index + 1,
                actual: len,
            }
            .into());
        }
        Ok(())
    }

    fn column_label(&self, index: usize) -> String {
        self.column_name(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index))
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("columns", &self.column_names())
            .finish_non_exhaustive()
    }
}

fn decode_message(err: sqlx::Error) -> String {
    match err {
        sqlx::Error::ColumnDecode { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Column decoding
// =============================================================================

/// A Rust type that a single column can be decoded into.
pub trait ColumnValue: Sized {
    /// Whether a NULL column is a valid value for this type.
    const NULLABLE: bool = false;

    fn decode_mysql(row: &MySqlRow, index: usize) -> Result<Self, sqlx::Error>;
    fn decode_sqlite(row: &SqliteRow, index: usize) -> Result<Self, sqlx::Error>;
}

macro_rules! impl_column_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ColumnValue for $ty {
                fn decode_mysql(row: &MySqlRow, index: usize) -> Result<Self, sqlx::Error> {
                    row.try_get::<$ty, _>(index)
                }

                fn decode_sqlite(row: &SqliteRow, index: usize) -> Result<Self, sqlx::Error> {
                    row.try_get::<$ty, _>(index)
                }
            }
        )+
    };
}

impl_column_value!(
    bool,
    i32,
    i64,
    f64,
    String,
    Vec<u8>,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
);

impl<T: ColumnValue> ColumnValue for Option<T> {
    const NULLABLE: bool = true;

    fn decode_mysql(row: &MySqlRow, index: usize) -> Result<Self, sqlx::Error> {
        if row.try_get_raw(index)?.is_null() {
            return Ok(None);
        }
        T::decode_mysql(row, index).map(Some)
    }

    fn decode_sqlite(row: &SqliteRow, index: usize) -> Result<Self, sqlx::Error> {
        if row.try_get_raw(index)?.is_null() {
            return Ok(None);
        }
        T::decode_sqlite(row, index).map(Some)
    }
}

// =============================================================================
// Row mapping
// =============================================================================

/// A record that can be built from one result row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> DbResult<Self>;
}

macro_rules! impl_from_row_tuple {
    ($len:expr; $($idx:tt => $name:ident),+) => {
        impl<$($name: ColumnValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> DbResult<Self> {
                row.expect_columns($len)?;
                Ok(($(row.try_get::<$name>($idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(1; 0 => A);
impl_from_row_tuple!(2; 0 => A, 1 => B);
impl_from_row_tuple!(3; 0 => A, 1 => B, 2 => C);
impl_from_row_tuple!(4; 0 => A, 1 => B, 2 => C, 3 => D);
impl_from_row_tuple!(5; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
impl_from_row_tuple!(6; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);
impl_from_row_tuple!(7; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F, 6 => G);
impl_from_row_tuple!(8; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F, 6 => G, 7 => H);
