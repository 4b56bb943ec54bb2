//! Schema descriptions handed to the SQL generator, with a TTL cache.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::TargetError;
use crate::pool::TargetPool;

/// How long a fetched schema description stays fresh.
pub const SCHEMA_TTL: Duration = Duration::from_secs(30 * 60);

/// Cached schema description for one connection.
#[derive(Debug)]
pub struct SchemaCache {
    ttl: Duration,
    entry: Mutex<Option<(String, Instant)>>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(SCHEMA_TTL)
    }
}

impl SchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Fresh cached description, if any.
    pub fn get(&self) -> Option<String> {
        let entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        entry
            .as_ref()
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(schema, _)| schema.clone())
    }

    pub fn put(&self, schema: String) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some((schema, Instant::now()));
    }

    pub fn invalidate(&self) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Return the cached description or load a fresh one from `pool`.
    pub async fn get_or_load(&self, pool: &TargetPool) -> Result<String, TargetError> {
        if let Some(schema) = self.get() {
            return Ok(schema);
        }
        let schema = describe_schema(pool).await?;
        tracing::debug!(bytes = schema.len(), "Schema description refreshed");
        self.put(schema.clone());
        Ok(schema)
    }
}

/// One `(table, column, type)` triple from `information_schema.columns`.
pub type ColumnRow = (String, String, String);

/// Render column rows as one line per table: `table(col type, ...)`.
pub fn render_schema(rows: Vec<ColumnRow>) -> String {
    let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (table, column, data_type) in rows {
        tables
            .entry(table)
            .or_default()
            .push(format!("{column} {data_type}"));
    }
    if tables.is_empty() {
        return "(no tables)".to_string();
    }
    tables
        .into_iter()
        .map(|(table, columns)| format!("{table}({})", columns.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Introspect the connected database.
pub async fn describe_schema(pool: &TargetPool) -> Result<String, TargetError> {
    let rows: Vec<ColumnRow> = match pool {
        TargetPool::Mysql(pool) => sqlx::query_as(
            "SELECT CAST(table_name AS CHAR), CAST(column_name AS CHAR), CAST(column_type AS CHAR)
             FROM information_schema.columns
             WHERE table_schema = DATABASE()
             ORDER BY table_name, ordinal_position",
        )
        .fetch_all(pool)
        .await,
        TargetPool::Postgres(pool) => sqlx::query_as(
            "SELECT CASE WHEN table_schema = 'public' THEN table_name::text
                         ELSE table_schema::text || '.' || table_name::text END,
                    column_name::text,
                    data_type::text
             FROM information_schema.columns
             WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
             ORDER BY table_schema, table_name, ordinal_position",
        )
        .fetch_all(pool)
        .await,
    }
    .map_err(|e| TargetError::Schema(e.to_string()))?;
    Ok(render_schema(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_groups_columns_by_table() {
        let rendered = render_schema(vec![
            ("users".into(), "id".into(), "bigint".into()),
            ("orders".into(), "id".into(), "bigint".into()),
            ("users".into(), "email".into(), "text".into()),
        ]);
        assert_eq!(rendered, "orders(id bigint)\nusers(id bigint, email text)");
        assert_eq!(render_schema(vec![]), "(no tables)");
    }

    #[test]
    fn cache_expires_and_invalidates() {
        let cache = SchemaCache::new(Duration::from_secs(60));
        assert!(cache.get().is_none());
        cache.put("users(id bigint)".into());
        assert_eq!(cache.get().as_deref(), Some("users(id bigint)"));
        cache.invalidate();
        assert!(cache.get().is_none());

        let expired = SchemaCache::new(Duration::ZERO);
        expired.put("x".into());
        assert!(expired.get().is_none());
    }
}
