use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use retentor_application::{DatabaseGateway, QueryRow};
use retentor_core::{AppError, AppResult};
use retentor_domain::{DeleteStatement, ReplicationMode};
use sqlx::mysql::{MySql, MySqlPool, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Executor, Row};
use tracing::debug;

/// MySQL-backed database gateway over a connection pool.
///
/// Statements go through the text protocol so every column value comes back
/// in its textual form.
#[derive(Clone)]
pub struct MySqlDatabaseGateway {
    connection_name: String,
    pool: MySqlPool,
    statement_timeout: Option<Duration>,
}

impl MySqlDatabaseGateway {
    /// Creates a gateway for one named connection.
    #[must_use]
    pub fn new(connection_name: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            connection_name: connection_name.into(),
            pool,
            statement_timeout: None,
        }
    }

    /// Bounds every gateway call by a timeout.
    #[must_use]
    pub fn with_statement_timeout(mut self, statement_timeout: Option<Duration>) -> Self {
        self.statement_timeout = statement_timeout;
        self
    }

    async fn acquire(&self, database: &str) -> AppResult<PoolConnection<MySql>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Query(format!(
                "failed to acquire connection '{}': {error}",
                self.connection_name
            ))
        })?;

        // An empty database keeps the connection default.
        if !database.is_empty() {
            let use_sql = format!("USE {}", quote_identifier(database));
            connection
                .execute(sqlx::raw_sql(use_sql.as_str()))
                .await
                .map_err(|error| query_error(use_sql.as_str(), &error))?;
        }

        Ok(connection)
    }

    async fn bounded<T, F>(&self, sql: &str, operation: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>> + Send,
    {
        match self.statement_timeout {
            Some(timeout) => tokio::time::timeout(timeout, operation)
                .await
                .map_err(|_| {
                    AppError::Query(format!(
                        "statement timed out after {}s on connection '{}': {sql}",
                        timeout.as_secs(),
                        self.connection_name
                    ))
                })?,
            None => operation.await,
        }
    }
}

#[async_trait]
impl DatabaseGateway for MySqlDatabaseGateway {
    async fn query(&self, sql: &str, database: &str) -> AppResult<Vec<QueryRow>> {
        debug!(connection = %self.connection_name, database, sql, "executing query");

        self.bounded(sql, async {
            let mut connection = self.acquire(database).await?;
            let rows = connection
                .fetch_all(sqlx::raw_sql(sql))
                .await
                .map_err(|error| query_error(sql, &error))?;

            rows.iter().map(query_row_from_mysql).collect()
        })
        .await
    }

    async fn execute(&self, sql: &str, database: &str) -> AppResult<()> {
        debug!(connection = %self.connection_name, database, sql, "executing statement");

        self.bounded(sql, async {
            let mut connection = self.acquire(database).await?;
            connection
                .execute(sqlx::raw_sql(sql))
                .await
                .map_err(|error| query_error(sql, &error))?;
            Ok(())
        })
        .await
    }

    async fn execute_delete(&self, statement: &DeleteStatement) -> AppResult<u64> {
        let sql = statement.sql();

        self.bounded(sql.as_str(), async {
            let mut connection = self.acquire(statement.database()).await?;

            if statement.replication() == ReplicationMode::Suppressed {
                // The session keeps binary logging off, so it must never be reused.
                connection.close_on_drop();
                connection
                    .execute(sqlx::raw_sql("SET SESSION sql_log_bin = 0"))
                    .await
                    .map_err(|error| query_error("SET SESSION sql_log_bin = 0", &error))?;
            }

            let result = connection
                .execute(sqlx::raw_sql(sql.as_str()))
                .await
                .map_err(|error| query_error(sql.as_str(), &error))?;

            Ok(result.rows_affected())
        })
        .await
    }
}

fn query_row_from_mysql(row: &MySqlRow) -> AppResult<QueryRow> {
    let mut query_row = QueryRow::new();
    for column in row.columns() {
        let value = row
            .try_get_unchecked::<Option<String>, _>(column.ordinal())
            .map_err(|error| {
                AppError::Query(format!(
                    "failed to read column '{}' as text: {error}",
                    column.name()
                ))
            })?;
        query_row.insert(column.name(), value);
    }

    Ok(query_row)
}

fn query_error(sql: &str, error: &sqlx::Error) -> AppError {
    match error {
        sqlx::Error::Database(database_error) => AppError::Query(format!(
            "{} ({}) while executing: {sql}",
            database_error.message(),
            database_error.code().as_deref().unwrap_or("no code")
        )),
        other => AppError::Query(format!("{other} while executing: {sql}")),
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}
