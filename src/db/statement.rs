//! Statement templates with positional placeholders.
//!
//! A [`Statement`] can only be built from a `&'static str`, so its text is
//! fixed at compile time and caller data can only reach the store as bound
//! parameters. Before a statement runs, its text is tokenized with the
//! store's SQL dialect to count `?` placeholders; string literals, quoted
//! identifiers and comments are skipped by the tokenizer, so a `?` inside
//! `'...'` is not mistaken for a placeholder.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Value};
use sqlparser::dialect::{Dialect, MySqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt;

/// A query template using `?` positional placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Statement {
    sql: &'static str,
}

impl Statement {
    pub const fn new(sql: &'static str) -> Self {
        Self { sql }
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    /// Count the `?` placeholders in the template.
    ///
    /// Named or numbered placeholders (`:name`, `$1`, `?1`, `@p`) are rejected:
    /// parameters bind strictly by position.
    pub fn placeholder_count(&self, db_type: DatabaseType) -> DbResult<usize> {
        let dialect = get_dialect(db_type);
        let tokens = Tokenizer::new(dialect.as_ref(), self.sql)
            .tokenize()
            .map_err(|e| DbError::invalid_input(format!("Cannot tokenize statement: {}", e)))?;

        let mut count = 0;
        for token in &tokens {
            if let Token::Placeholder(p) = token {
                if p != "?" {
                    return Err(DbError::invalid_input(format!(
                        "Unsupported placeholder '{}'; use positional '?' placeholders",
                        p
                    )));
                }
                count += 1;
            }
        }
        Ok(count)
    }

    /// Verify that `params` supplies exactly one value per placeholder.
    pub fn check_params(&self, db_type: DatabaseType, params: &[Value]) -> DbResult<usize> {
        let expected = self.placeholder_count(db_type)?;
        if expected != params.len() {
            return Err(DbError::invalid_input(format!(
                "Statement expects {} parameter(s), got {}",
                expected,
                params.len()
            )));
        }
        Ok(expected)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql)
    }
}

/// Get the appropriate SQL dialect for the database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSERT: Statement = Statement::new("INSERT INTO comments(email, comment) VALUES(?, ?)");

    #[test]
    fn test_counts_positional_placeholders() {
        assert_eq!(INSERT.placeholder_count(DatabaseType::MySQL).unwrap(), 2);
        assert_eq!(INSERT.placeholder_count(DatabaseType::SQLite).unwrap(), 2);
    }

    #[test]
    fn test_no_placeholders() {
        let stmt = Statement::new("SELECT id, email, comment FROM comments");
        assert_eq!(stmt.placeholder_count(DatabaseType::SQLite).unwrap(), 0);
    }

    #[test]
    fn test_question_mark_inside_literal_is_not_a_placeholder() {
        let stmt = Statement::new("SELECT id FROM comments WHERE comment = 'why?' AND id = ?");
        assert_eq!(stmt.placeholder_count(DatabaseType::MySQL).unwrap(), 1);
        assert_eq!(stmt.placeholder_count(DatabaseType::SQLite).unwrap(), 1);
    }

    #[test]
    fn test_rejects_numbered_placeholders() {
        let stmt = Statement::new("SELECT id FROM comments WHERE id = ?1");
        let result = stmt.placeholder_count(DatabaseType::SQLite);
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));
    }

    #[test]
    fn test_rejects_dollar_placeholders() {
        let stmt = Statement::new("SELECT id FROM comments WHERE id = $1");
        let result = stmt.placeholder_count(DatabaseType::SQLite);
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));
    }

    #[test]
    fn test_check_params_arity() {
        let params = vec![Value::from("a@example.com")];
        let result = INSERT.check_params(DatabaseType::SQLite, &params);
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));

        let params = vec![Value::from("a@example.com"), Value::from("hello")];
        assert_eq!(INSERT.check_params(DatabaseType::SQLite, &params).unwrap(), 2);
    }

    #[test]
    fn test_display_is_template_text() {
        assert_eq!(
            INSERT.to_string(),
            "INSERT INTO comments(email, comment) VALUES(?, ?)"
        );
    }
}
