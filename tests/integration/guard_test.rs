//! Guarded execution against a real SQLite file.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use sqlguard::db::{SqliteClient, Value};
use sqlguard::error::SqlGuardError;
use sqlguard::query::GuardedExecutor;
use sqlguard::safety::{GuardMode, ReadOnlyGuard, Rejection};

use super::ShopDb;

fn guards() -> [ReadOnlyGuard; 2] {
    [
        ReadOnlyGuard::new(),
        ReadOnlyGuard::new().with_mode(GuardMode::Structural),
    ]
}

#[tokio::test]
async fn test_unbounded_select_is_capped() {
    let db = ShopDb::create().await;
    for guard in guards() {
        let executor = db.executor_with(guard).await;

        let result = executor.execute("SELECT name FROM products").await.unwrap();

        assert_eq!(result.columns, vec!["name".to_string()]);
        assert_eq!(result.row_count(), 200);
        assert_eq!(result.rows[0], vec![Value::Text("Product 1".to_string())]);
    }
}

#[tokio::test]
async fn test_large_table_never_exceeds_cap() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;

    let result = executor.execute("SELECT * FROM events").await.unwrap();

    assert_eq!(result.columns, vec!["id".to_string(), "kind".to_string()]);
    assert_eq!(result.row_count(), 200);
}

#[tokio::test]
async fn test_explicit_limit_is_respected() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;

    let small = executor
        .execute("SELECT id FROM events ORDER BY id LIMIT 5")
        .await
        .unwrap();
    assert_eq!(small.row_count(), 5);

    // An explicit limit above the cap is the caller's choice.
    let large = executor
        .execute("SELECT id FROM events LIMIT 450")
        .await
        .unwrap();
    assert_eq!(large.row_count(), 450);
}

#[tokio::test]
async fn test_aggregate_returns_single_row() {
    let db = ShopDb::create().await;
    for guard in guards() {
        let executor = db.executor_with(guard).await;

        let result = executor.execute("SELECT count(*) FROM orders").await.unwrap();

        assert_eq!(result.row_count(), 1);
        assert_eq!(result.rows[0], vec![Value::Int(4)]);
    }
}

#[tokio::test]
async fn test_group_by_is_not_capped() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;

    // 300 groups: nothing appended, so all of them come back.
    let result = executor
        .execute("SELECT id, name FROM products GROUP BY id")
        .await
        .unwrap();
    assert_eq!(result.row_count(), 300);

    let kinds = executor
        .execute("SELECT kind, count(*) AS n FROM events GROUP BY kind ORDER BY kind")
        .await
        .unwrap();
    assert_eq!(kinds.columns, vec!["kind".to_string(), "n".to_string()]);
    assert_eq!(
        kinds.rows,
        vec![
            vec![Value::Text("buy".to_string()), Value::Int(167)],
            vec![Value::Text("click".to_string()), Value::Int(167)],
            vec![Value::Text("view".to_string()), Value::Int(166)],
        ]
    );
}

#[tokio::test]
async fn test_revenue_join() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;

    let result = executor
        .execute(
            "SELECT p.name, sum(oi.quantity * oi.unit_price_cents) AS total_cents \
             FROM order_items oi JOIN products p ON p.id = oi.product_id \
             GROUP BY p.name ORDER BY total_cents DESC LIMIT 2",
        )
        .await
        .unwrap();

    assert_eq!(
        result.rows,
        vec![
            vec![Value::Text("Product 3".to_string()), Value::Int(150)],
            vec![Value::Text("Product 4".to_string()), Value::Int(120)],
        ]
    );
}

#[tokio::test]
async fn test_drop_is_rejected_and_table_survives() {
    let db = ShopDb::create().await;
    for guard in guards() {
        let executor = db.executor_with(guard).await;

        let err = executor.execute("DROP TABLE products").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::WriteOperationDenied));

        let result = executor.execute("SELECT count(*) FROM products").await.unwrap();
        assert_eq!(result.rows[0], vec![Value::Int(300)]);
    }
}

#[tokio::test]
async fn test_multiple_statements_are_rejected() {
    let db = ShopDb::create().await;
    for guard in guards() {
        let executor = db.executor_with(guard).await;

        let err = executor.execute("SELECT 1; SELECT 2").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::MultipleStatementsDenied));
    }
}

#[tokio::test]
async fn test_non_select_is_rejected() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;

    for sql in ["PRAGMA table_info(products)", "EXPLAIN SELECT 1", "VACUUM"] {
        let err = executor.execute(sql).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::NonSelectDenied), "SQL: {sql}");
    }
}

#[tokio::test]
async fn test_write_keyword_in_literal_is_rejected() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;

    let err = executor
        .execute("SELECT * FROM orders WHERE status = 'update pending'")
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(Rejection::WriteOperationDenied));
}

#[tokio::test]
async fn test_structural_mode_runs_keyword_literals() {
    let db = ShopDb::create().await;
    let executor = db
        .executor_with(ReadOnlyGuard::new().with_mode(GuardMode::Structural))
        .await;

    let result = executor
        .execute("SELECT id FROM orders WHERE status <> 'update pending' -- drop nothing")
        .await
        .unwrap();
    assert_eq!(result.row_count(), 4);

    let err = executor
        .execute("SELECT * INTO backup FROM products")
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(Rejection::WriteOperationDenied));
}

#[tokio::test]
async fn test_store_error_is_returned_verbatim() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;

    let err = executor.execute("SELECT nme FROM products").await.unwrap_err();

    match err {
        SqlGuardError::Query(message) => assert!(message.contains("no such column: nme")),
        other => panic!("Expected query error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;
    let sql = "SELECT id, name, unit_price_cents FROM products ORDER BY id";

    let first = executor.execute(sql).await.unwrap();
    let second = executor.execute(sql).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_executions() {
    let db = ShopDb::create().await;
    let executor = db.executor().await;

    let queries = (0..8).map(|i| {
        let executor = executor.clone();
        async move {
            if i % 2 == 0 {
                executor.execute("SELECT name FROM products").await
            } else {
                executor.execute("DELETE FROM products").await
            }
        }
    });
    let results = join_all(queries).await;

    for (i, result) in results.into_iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(result.unwrap().row_count(), 200);
        } else {
            assert_eq!(
                result.unwrap_err().rejection(),
                Some(Rejection::WriteOperationDenied)
            );
        }
    }

    let count = executor.execute("SELECT count(*) FROM products").await.unwrap();
    assert_eq!(count.rows[0], vec![Value::Int(300)]);
}

#[tokio::test]
async fn test_store_refuses_writes_that_slip_past_the_guard() {
    let db = ShopDb::create().await;
    let client = db.client().await;

    // Bypass the guard and talk to the read-only client directly.
    let err = sqlguard::db::DatabaseClient::execute_query(
        &client,
        "DELETE FROM products",
        Duration::from_secs(5),
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "Query Error");
    assert!(err.to_string().contains("readonly"));
}

#[tokio::test]
async fn test_timed_out_query_frees_its_connection() {
    let db = ShopDb::create().await;
    let mut config = db.config();
    config.max_connections = 1;
    let client = SqliteClient::connect(&config).await.unwrap();
    let executor = GuardedExecutor::new(Arc::new(client), ReadOnlyGuard::new())
        .with_timeout(Duration::from_millis(200));

    let err = executor
        .execute(
            "SELECT count(*) FROM (WITH RECURSIVE c(x) AS \
             (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 30000000) SELECT x FROM c)",
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out after 200ms"));

    let result = executor.execute("SELECT 1 AS one").await.unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
}
