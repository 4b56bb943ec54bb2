use sqlx::PgPool;

/// All `id` columns must be bigint.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_pks_are_bigint(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, data_type
         FROM information_schema.columns
         WHERE column_name = 'id'
           AND table_schema = 'public'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rows.is_empty());
    for (table, data_type) in &rows {
        assert_eq!(data_type, "bigint", "Table {table}.id should be bigint");
    }
}

/// Every table must carry timestamptz `created_at` / `updated_at` and the
/// trigger that maintains `updated_at`.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_tables_have_timestamps_and_trigger(pool: PgPool) {
    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name
         FROM information_schema.tables
         WHERE table_schema = 'public'
           AND table_type = 'BASE TABLE'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for (table,) in &tables {
        for col in ["created_at", "updated_at"] {
            let (data_type,): (String,) = sqlx::query_as(
                "SELECT data_type FROM information_schema.columns
                 WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
            )
            .bind(table)
            .bind(col)
            .fetch_optional(&pool)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("Table {table} is missing column {col}"));
            assert_eq!(data_type, "timestamp with time zone", "{table}.{col}");
        }

        let trigger: Option<(String,)> = sqlx::query_as(
            "SELECT trigger_name FROM information_schema.triggers
             WHERE event_object_table = $1 AND trigger_name = $2",
        )
        .bind(table)
        .bind(format!("trg_{table}_updated_at"))
        .fetch_optional(&pool)
        .await
        .unwrap();
        assert!(trigger.is_some(), "Table {table} is missing its updated_at trigger");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_check(pool: PgPool) {
    querypilot_db::health_check(&pool).await.unwrap();
}
