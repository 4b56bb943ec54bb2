//! Driver pools for MySQL and PostgreSQL targets.

use std::time::Duration;

use querypilot_core::connection::{
    filter_user_databases, validate_database_name, ConnectError, ConnectErrorCode,
    ConnectionProfile, DbEngine,
};
use querypilot_core::output::QueryOutput;
use querypilot_core::sql_risk::returns_rows;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Executor, Statement};

use crate::classify::{classify_sqlx_error, execution_message};
use crate::rows::{column_names, placeholder_columns, row_to_strings};

/// Connections kept per target pool. Targets are interactive, not hot.
const MAX_TARGET_CONNECTIONS: u32 = 5;

/// How long to wait for a target server before reporting a timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Database used by PostgreSQL when the profile names none.
const PG_MAINTENANCE_DB: &str = "postgres";

/// A live pool against one target database.
#[derive(Debug, Clone)]
pub enum TargetPool {
    Mysql(MySqlPool),
    Postgres(PgPool),
}

impl TargetPool {
    /// Open a pool for `profile` and prove it works with `SELECT 1`.
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self, ConnectError> {
        profile.validate()?;
        let pool = match profile.engine {
            DbEngine::Mysql => {
                let mut options = MySqlConnectOptions::new()
                    .host(&profile.host)
                    .port(profile.port)
                    .username(&profile.user)
                    .password(&profile.password);
                if let Some(database) = profile.database.as_deref().filter(|d| !d.is_empty()) {
                    options = options.database(database);
                }
                MySqlPoolOptions::new()
                    .max_connections(MAX_TARGET_CONNECTIONS)
                    .acquire_timeout(CONNECT_TIMEOUT)
                    .connect_with(options)
                    .await
                    .map(Self::Mysql)
            }
            DbEngine::Postgresql => {
                let database = profile
                    .database
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .unwrap_or(PG_MAINTENANCE_DB);
                let options = PgConnectOptions::new()
                    .host(&profile.host)
                    .port(profile.port)
                    .username(&profile.user)
                    .password(&profile.password)
                    .database(database);
                PgPoolOptions::new()
                    .max_connections(MAX_TARGET_CONNECTIONS)
                    .acquire_timeout(CONNECT_TIMEOUT)
                    .connect_with(options)
                    .await
                    .map(Self::Postgres)
            }
        }
        .map_err(|e| classify_sqlx_error(&e, profile))?;

        pool.ping().await.map_err(|e| classify_sqlx_error(&e, profile))?;
        tracing::debug!(
            engine = %profile.engine,
            host = %profile.host,
            port = profile.port,
            "Target pool opened"
        );
        Ok(pool)
    }

    pub fn engine(&self) -> DbEngine {
        match self {
            Self::Mysql(_) => DbEngine::Mysql,
            Self::Postgres(_) => DbEngine::Postgresql,
        }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        match self {
            Self::Mysql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            Self::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        }
    }

    pub async fn close(&self) {
        match self {
            Self::Mysql(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
    }

    /// User databases on the server, system schemas removed.
    ///
    /// An empty list is reported as `NO_DATABASES`.
    pub async fn list_databases(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Vec<String>, ConnectError> {
        let names: Vec<String> = match self {
            Self::Mysql(pool) => {
                sqlx::query_scalar(
                    "SELECT CAST(schema_name AS CHAR) FROM information_schema.schemata ORDER BY schema_name",
                )
                .fetch_all(pool)
                .await
            }
            Self::Postgres(pool) => {
                sqlx::query_scalar(
                    "SELECT datname::text FROM pg_database WHERE datistemplate = false ORDER BY datname",
                )
                .fetch_all(pool)
                .await
            }
        }
        .map_err(|e| classify_sqlx_error(&e, profile))?;

        let databases = filter_user_databases(self.engine(), names);
        if databases.is_empty() {
            return Err(ConnectError::new(
                ConnectErrorCode::NoDatabases,
                "No user databases found on this server.",
            )
            .with_suggestion("Create a database first, then connect to it."));
        }
        Ok(databases)
    }

    /// `CREATE DATABASE` after validating the name.
    pub async fn create_database(
        &self,
        profile: &ConnectionProfile,
        name: &str,
    ) -> Result<(), ConnectError> {
        validate_database_name(name)?;
        // Identifiers cannot be bound; the name is restricted to [A-Za-z0-9_].
        let result = match self {
            Self::Mysql(pool) => sqlx::raw_sql(&format!("CREATE DATABASE `{name}`"))
                .execute(pool)
                .await
                .map(|_| ()),
            Self::Postgres(pool) => sqlx::raw_sql(&format!("CREATE DATABASE \"{name}\""))
                .execute(pool)
                .await
                .map(|_| ()),
        };
        result.map_err(|e| classify_sqlx_error(&e, &profile.with_database(name)))
    }

    /// Run one statement and shape its result.
    ///
    /// Driver failures become [`QueryOutput::Error`]; nothing is retried.
    pub async fn execute(&self, sql: &str) -> QueryOutput {
        let outcome = if returns_rows(sql) {
            self.fetch_table(sql).await
        } else {
            self.execute_status(sql).await
        };
        outcome.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Target statement failed");
            QueryOutput::error(execution_message(&e))
        })
    }

    async fn fetch_table(&self, sql: &str) -> Result<QueryOutput, sqlx::Error> {
        let (mut columns, data) = match self {
            Self::Mysql(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                let columns = rows.first().map(column_names).unwrap_or_default();
                (columns, rows.iter().map(row_to_strings).collect::<Vec<_>>())
            }
            Self::Postgres(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                let columns = rows.first().map(column_names).unwrap_or_default();
                (columns, rows.iter().map(row_to_strings).collect::<Vec<_>>())
            }
        };

        if columns.is_empty() {
            columns = match data.first() {
                Some(row) => placeholder_columns(row.len()),
                None => self.prepared_columns(sql).await,
            };
        }
        Ok(QueryOutput::select(columns, data))
    }

    /// Column names of a statement that returned no rows, via a prepare.
    async fn prepared_columns(&self, sql: &str) -> Vec<String> {
        let sql = sql.trim().trim_end_matches(';');
        let columns = match self {
            Self::Mysql(pool) => pool.prepare(sql).await.map(|stmt| {
                stmt.columns()
                    .iter()
                    .map(|c| sqlx::Column::name(c).to_string())
                    .collect()
            }),
            Self::Postgres(pool) => pool.prepare(sql).await.map(|stmt| {
                stmt.columns()
                    .iter()
                    .map(|c| sqlx::Column::name(c).to_string())
                    .collect()
            }),
        };
        columns.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Could not resolve columns of empty result");
            Vec::new()
        })
    }

    async fn execute_status(&self, sql: &str) -> Result<QueryOutput, sqlx::Error> {
        let affected = match self {
            Self::Mysql(pool) => sqlx::raw_sql(sql).execute(pool).await?.rows_affected(),
            Self::Postgres(pool) => sqlx::raw_sql(sql).execute(pool).await?.rows_affected(),
        };
        Ok(QueryOutput::status(affected))
    }
}
