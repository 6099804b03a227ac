//! Integration tests for statement execution and row decoding.

mod common;

use common::{TestDb, ctx};
use db_repository::db::{Row, Statement};
use db_repository::models::Value;
use db_repository::{Context, DbError, ScanError, params};
use std::time::Duration;

const INSERT_COMMENT: Statement =
    Statement::new("INSERT INTO comments(email, comment) VALUES(?, ?)");
const SELECT_COMMENTS: Statement =
    Statement::new("SELECT id, email, comment FROM comments ORDER BY id");
const SELECT_EMAIL_BY_ID: Statement = Statement::new("SELECT email FROM customer WHERE id = ?");
const INSERT_CUSTOMER_NO_EMAIL: Statement = Statement::new(
    "INSERT INTO customer(name, email, created_at) VALUES(?, NULL, '2024-01-02 03:04:05')",
);

async fn seed_comments(db: &TestDb, count: usize) {
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();
    for i in 0..count {
        let params = params![format!("user{i}@example.com"), format!("comment {i}")];
        db.executor
            .execute(&ctx, &mut conn, INSERT_COMMENT, &params)
            .await
            .unwrap();
    }
    conn.release().await;
}

#[tokio::test]
async fn test_execute_reports_rows_and_generated_id() {
    let db = TestDb::new().await;
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let first = db
        .executor
        .execute(&ctx, &mut conn, INSERT_COMMENT, &params!["a@example.com", "first"])
        .await
        .unwrap();
    assert_eq!(first.rows_affected, 1);
    assert_eq!(first.last_insert_id, Some(1));

    let second = db
        .executor
        .execute(&ctx, &mut conn, INSERT_COMMENT, &params!["b@example.com", "second"])
        .await
        .unwrap();
    assert_eq!(second.last_insert_id, Some(2));

    let deleted = db
        .executor
        .execute(
            &ctx,
            &mut conn,
            Statement::new("DELETE FROM comments"),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(deleted.rows_affected, 2);
    assert_eq!(deleted.last_insert_id, None);

    conn.release().await;
}

#[tokio::test]
async fn test_rows_are_streamed_in_order() {
    let db = TestDb::new().await;
    seed_comments(&db, 5).await;

    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();
    {
        let mut rows = db
            .executor
            .query(&ctx, &mut conn, SELECT_COMMENTS, &[])
            .await
            .unwrap();

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await {
            let row: Row = row.unwrap();
            assert_eq!(row.len(), 3);
            assert_eq!(row.column_name(1), Some("email"));
            ids.push(row.try_get::<i64>(0).unwrap());
        }
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(rows.is_finished());
        assert!(rows.next().await.is_none());
    }
    conn.release().await;
}

#[tokio::test]
async fn test_dropping_unconsumed_rows_keeps_connection_usable() {
    let db = TestDb::new().await;
    seed_comments(&db, 5).await;

    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();
    {
        let mut rows = db
            .executor
            .query(&ctx, &mut conn, SELECT_COMMENTS, &[])
            .await
            .unwrap();
        let first = rows.next_as::<(i64, String, String)>().await.unwrap().unwrap();
        assert_eq!(first.0, 1);
    }

    let (count,): (i64,) = db
        .executor
        .query_one(
            &ctx,
            &mut conn,
            Statement::new("SELECT COUNT(*) FROM comments"),
            &[],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(count, 5);
    assert!(!conn.is_broken());
    conn.release().await;
}

#[tokio::test]
async fn test_invalid_sql_fails_at_query() {
    let db = TestDb::new().await;
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let err = db
        .executor
        .query(
            &ctx,
            &mut conn,
            Statement::new("SELECT nope FROM missing_table"),
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }), "got {err:?}");
    assert!(!conn.is_broken());

    conn.ping(&ctx).await.unwrap();
    conn.release().await;
}

#[tokio::test]
async fn test_nullable_column_scans_to_none() {
    let db = TestDb::new().await;
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let inserted = db
        .executor
        .execute(&ctx, &mut conn, INSERT_CUSTOMER_NO_EMAIL, &params!["Budi"])
        .await
        .unwrap();
    let id = inserted.last_insert_id.unwrap();

    let (email,): (Option<String>,) = db
        .executor
        .query_one(&ctx, &mut conn, SELECT_EMAIL_BY_ID, &params![id])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(email, None);

    let err = db
        .executor
        .query_one::<(String,)>(&ctx, &mut conn, SELECT_EMAIL_BY_ID, &params![id])
        .await
        .unwrap_err();
    assert!(
        matches!(err, DbError::Scan(ScanError::UnexpectedNull { index: 0, .. })),
        "got {err:?}"
    );

    conn.release().await;
}

#[tokio::test]
async fn test_type_mismatch_and_column_count() {
    let db = TestDb::new().await;
    seed_comments(&db, 1).await;

    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let err = db
        .executor
        .query_one::<(i64, i64, String)>(&ctx, &mut conn, SELECT_COMMENTS, &[])
        .await
        .unwrap_err();
    match err {
        DbError::Scan(ScanError::TypeMismatch { index, column, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(column, "email");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }

    let err = db
        .executor
        .query_one::<(i64, String)>(&ctx, &mut conn, SELECT_COMMENTS, &[])
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            DbError::Scan(ScanError::ColumnCount {
                expected: 2,
                actual: 3
            })
        ),
        "got {err:?}"
    );

    let row = db
        .executor
        .query(&ctx, &mut conn, SELECT_COMMENTS, &[])
        .await
        .unwrap()
        .next()
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        row.try_get::<String>(7),
        Err(DbError::Scan(ScanError::ColumnCount { .. }))
    ));

    conn.release().await;
}

#[tokio::test]
async fn test_parameter_arity_is_checked_before_execution() {
    let db = TestDb::new().await;
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let err = db
        .executor
        .execute(&ctx, &mut conn, INSERT_COMMENT, &params!["only-one"])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }), "got {err:?}");

    let (count,): (i64,) = db
        .executor
        .query_one(
            &ctx,
            &mut conn,
            Statement::new("SELECT COUNT(*) FROM comments"),
            &[],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(count, 0);
    conn.release().await;
}

#[tokio::test]
async fn test_numbered_placeholders_are_rejected() {
    let db = TestDb::new().await;
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let err = db
        .executor
        .query_one::<(i64,)>(&ctx, &mut conn, Statement::new("SELECT ?1"), &params![1])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }), "got {err:?}");
    conn.release().await;
}

#[tokio::test]
async fn test_question_mark_inside_literal_is_not_a_placeholder() {
    let db = TestDb::new().await;
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let (text, n): (String, i64) = db
        .executor
        .query_one(
            &ctx,
            &mut conn,
            Statement::new("SELECT 'why?', ?"),
            &params![42_i64],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(text, "why?");
    assert_eq!(n, 42);
    conn.release().await;
}

#[tokio::test]
async fn test_query_one_on_empty_result() {
    let db = TestDb::new().await;
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let found = db
        .executor
        .query_one::<(i64, String, String)>(&ctx, &mut conn, SELECT_COMMENTS, &[])
        .await
        .unwrap();
    assert!(found.is_none());
    conn.release().await;
}

#[tokio::test]
async fn test_deadline_marks_connection_broken() {
    let db = TestDb::new().await;
    let mut conn = db.pool.acquire(&ctx()).await.unwrap();
    let id = conn.id();

    let heavy = Statement::new(
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 5000000) \
         SELECT COUNT(*) FROM c",
    );
    let short = Context::with_timeout(Duration::from_millis(5));
    let err = db
        .executor
        .query_one::<(i64,)>(&short, &mut conn, heavy, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::DeadlineExceeded { .. }), "got {err:?}");
    assert!(conn.is_broken());
    conn.release().await;

    let conn = db.pool.acquire(&ctx()).await.unwrap();
    assert_ne!(conn.id(), id);
    conn.release().await;
}

#[tokio::test]
async fn test_cancelled_context_fails_fast() {
    let db = TestDb::new().await;
    let mut conn = db.pool.acquire(&ctx()).await.unwrap();

    let cancelled = Context::background();
    cancelled.cancel();
    let err = db
        .executor
        .execute(&cancelled, &mut conn, INSERT_COMMENT, &params!["a", "b"])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Cancelled { .. }), "got {err:?}");
    // Nothing was sent, so the connection is still in a known state
    assert!(!conn.is_broken());
    conn.release().await;
}

#[tokio::test]
async fn test_values_of_every_kind_bind() {
    let db = TestDb::new().await;
    let ctx = ctx();
    let mut conn = db.pool.acquire(&ctx).await.unwrap();

    let params = vec![
        Value::Null,
        Value::Bool(true),
        Value::Int(-7),
        Value::Float(2.5),
        Value::from("text"),
        Value::Bytes(vec![0, 1, 2]),
    ];
    let row: (Option<i64>, bool, i64, f64, String, Vec<u8>) = db
        .executor
        .query_one(
            &ctx,
            &mut conn,
            Statement::new("SELECT ?, ?, ?, ?, ?, ?"),
            &params,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row, (None, true, -7, 2.5, "text".to_string(), vec![0, 1, 2]));
    conn.release().await;
}
