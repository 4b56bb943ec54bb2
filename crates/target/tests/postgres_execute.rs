//! Statement execution against a PostgreSQL target.

use assert_matches::assert_matches;
use querypilot_core::output::QueryOutput;
use querypilot_target::{ActiveConnection, TargetPool};
use querypilot_core::connection::{ConnectionProfile, DbEngine};
use sqlx::PgPool;

async fn seeded(pool: PgPool) -> TargetPool {
    sqlx::raw_sql(
        "CREATE TABLE orders (id BIGINT PRIMARY KEY, customer TEXT, total NUMERIC(10, 2));
         INSERT INTO orders VALUES (1, 'ada', 12.50), (2, NULL, 3.00), (3, 'bob', 7.25);",
    )
    .execute(&pool)
    .await
    .unwrap();
    TargetPool::Postgres(pool)
}

#[sqlx::test(migrations = false)]
async fn test_select_returns_stringified_rows(pool: PgPool) {
    let target = seeded(pool).await;
    let output = target.execute("SELECT * FROM orders ORDER BY id").await;

    assert_matches!(output, QueryOutput::Select { columns, data, row_count } => {
        assert_eq!(columns, vec!["id", "customer", "total"]);
        assert_eq!(row_count, 3);
        assert_eq!(data[0], vec!["1", "ada", "12.50"]);
        assert_eq!(data[1][1], "", "NULL renders as an empty cell");
    });
}

#[sqlx::test(migrations = false)]
async fn test_empty_select_still_reports_columns(pool: PgPool) {
    let target = seeded(pool).await;
    let output = target
        .execute("SELECT id, customer FROM orders WHERE id < 0;")
        .await;

    assert_matches!(output, QueryOutput::Select { columns, row_count: 0, .. } => {
        assert_eq!(columns, vec!["id", "customer"]);
    });
}

#[sqlx::test(migrations = false)]
async fn test_mutation_reports_affected_rows(pool: PgPool) {
    let target = seeded(pool).await;
    let output = target.execute("DELETE FROM orders WHERE id > 1").await;
    assert_eq!(output, QueryOutput::status(2));

    let remaining = target.execute("SELECT COUNT(*) AS n FROM orders").await;
    assert_matches!(remaining, QueryOutput::Select { data, .. } => {
        assert_eq!(data, vec![vec!["1".to_string()]]);
    });
}

#[sqlx::test(migrations = false)]
async fn test_driver_errors_become_error_output(pool: PgPool) {
    let target = seeded(pool).await;
    let output = target.execute("SELECT missing_column FROM orders").await;
    assert_matches!(output, QueryOutput::Error { message } => {
        assert!(message.starts_with("Error executing query:"));
        assert!(message.contains("missing_column"));
    });
}

#[sqlx::test(migrations = false)]
async fn test_schema_description_is_cached_per_connection(pool: PgPool) {
    let target = seeded(pool).await;
    let active = ActiveConnection::new(
        ConnectionProfile {
            engine: DbEngine::Postgresql,
            host: "localhost".into(),
            port: 5432,
            user: "test".into(),
            password: String::new(),
            database: None,
        },
        target,
    );

    let schema = active.schema_description().await.unwrap();
    assert!(schema.contains("orders(id bigint, customer text, total numeric)"));

    active.pool.execute("CREATE TABLE refunds (id BIGINT)").await;
    let cached = active.schema_description().await.unwrap();
    assert!(!cached.contains("refunds"));

    active.schema.invalidate();
    let fresh = active.schema_description().await.unwrap();
    assert!(fresh.contains("refunds(id bigint)"));
}
