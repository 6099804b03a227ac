//! Comment entity.

use crate::db::{FromRow, Row, Statement};
use crate::error::DbResult;
use crate::models::Value;
use crate::repository::Entity;
use serde::Serialize;

/// A comment left by an email address. Stored in table `comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    id: Option<i64>,
    pub email: String,
    pub comment: String,
}

impl Comment {
    pub fn new(email: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            id: None,
            email: email.into(),
            comment: comment.into(),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }
}

impl FromRow for Comment {
    fn from_row(row: &Row) -> DbResult<Self> {
        row.expect_columns(3)?;
        Ok(Self {
            id: Some(row.try_get(0)?),
            email: row.try_get(1)?,
            comment: row.try_get(2)?,
        })
    }
}

impl Entity for Comment {
    const NAME: &'static str = "comment";

    const INSERT: Statement =
        Statement::new("INSERT INTO comments(email, comment) VALUES(?, ?)");
    const SELECT_BY_ID: Statement =
        Statement::new("SELECT id, email, comment FROM comments WHERE id = ?");
    const SELECT_ALL: Statement = Statement::new("SELECT id, email, comment FROM comments");
    const SELECT_ALL_ASC: Statement =
        Statement::new("SELECT id, email, comment FROM comments ORDER BY id ASC");
    const SELECT_ALL_DESC: Statement =
        Statement::new("SELECT id, email, comment FROM comments ORDER BY id DESC");
    const UPDATE: Statement =
        Statement::new("UPDATE comments SET email = ?, comment = ? WHERE id = ?");
    const DELETE: Statement = Statement::new("DELETE FROM comments WHERE id = ?");
    const COUNT: Statement = Statement::new("SELECT COUNT(*) FROM comments");

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    fn insert_params(&self) -> Vec<Value> {
        vec![
            Value::from(self.email.as_str()),
            Value::from(self.comment.as_str()),
        ]
    }

    fn update_params(&self, id: i64) -> Vec<Value> {
        vec![
            Value::from(self.email.as_str()),
            Value::from(self.comment.as_str()),
            Value::Int(id),
        ]
    }
}
