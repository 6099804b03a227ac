//! Customer entity, exercising nullable and temporal columns.

use crate::db::{FromRow, Row, Statement};
use crate::error::DbResult;
use crate::models::Value;
use crate::repository::Entity;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A customer record stored in table `customer`.
///
/// `email` and `birth_date` are nullable columns; `None` is stored as NULL
/// and read back as `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub balance: i64,
    pub rating: f64,
    pub birth_date: Option<NaiveDate>,
    pub married: bool,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: None,
            balance: 0,
            rating: 0.0,
            birth_date: None,
            married: false,
            created_at,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }
}

impl FromRow for Customer {
    fn from_row(row: &Row) -> DbResult<Self> {
        row.expect_columns(8)?;
        Ok(Self {
            id: Some(row.try_get(0)?),
            name: row.try_get(1)?,
            email: row.try_get(2)?,
            balance: row.try_get(3)?,
            rating: row.try_get(4)?,
            birth_date: row.try_get(5)?,
            married: row.try_get(6)?,
            created_at: row.try_get(7)?,
        })
    }
}

impl Entity for Customer {
    const NAME: &'static str = "customer";

    const INSERT: Statement = Statement::new(
        "INSERT INTO customer(name, email, balance, rating, birth_date, married, created_at) \
         VALUES(?, ?, ?, ?, ?, ?, ?)",
    );
    const SELECT_BY_ID: Statement = Statement::new(
        "SELECT id, name, email, balance, rating, birth_date, married, created_at \
         FROM customer WHERE id = ?",
    );
    const SELECT_ALL: Statement = Statement::new(
        "SELECT id, name, email, balance, rating, birth_date, married, created_at FROM customer",
    );
    const SELECT_ALL_ASC: Statement = Statement::new(
        "SELECT id, name, email, balance, rating, birth_date, married, created_at \
         FROM customer ORDER BY id ASC",
    );
    const SELECT_ALL_DESC: Statement = Statement::new(
        "SELECT id, name, email, balance, rating, birth_date, married, created_at \
         FROM customer ORDER BY id DESC",
    );
    const UPDATE: Statement = Statement::new(
        "UPDATE customer SET name = ?, email = ?, balance = ?, rating = ?, birth_date = ?, \
         married = ?, created_at = ? WHERE id = ?",
    );
    const DELETE: Statement = Statement::new("DELETE FROM customer WHERE id = ?");
    const COUNT: Statement = Statement::new("SELECT COUNT(*) FROM customer");

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    fn insert_params(&self) -> Vec<Value> {
        vec![
            Value::from(self.name.as_str()),
            Value::from(self.email.clone()),
            Value::Int(self.balance),
            Value::Float(self.rating),
            Value::from(self.birth_date),
            Value::Bool(self.married),
            Value::Timestamp(self.created_at),
        ]
    }

    fn update_params(&self, id: i64) -> Vec<Value> {
        let mut params = self.insert_params();
        params.push(Value::Int(id));
        params
    }
}
