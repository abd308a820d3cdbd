use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use retentor_core::{AppError, AppResult};
use retentor_domain::DeleteStatement;
use tokio::sync::Mutex;

use crate::cleanup_ports::{DatabaseGateway, GatewayProvider, QueryRow};

/// In-process stand-in for one database connection.
///
/// Deletes drain `matching_rows` by at most the statement limit; with
/// `always_matching` the pool never shrinks. After each delete the next
/// `arrivals` entry is added back, standing in for rows that age into the
/// retention window mid-run.
#[derive(Default)]
pub(crate) struct FakeGateway {
    pub(crate) rows: Mutex<Vec<QueryRow>>,
    pub(crate) matching_rows: Mutex<u64>,
    pub(crate) arrivals: Mutex<VecDeque<u64>>,
    pub(crate) always_matching: bool,
    pub(crate) query_error: Option<String>,
    pub(crate) write_error: Option<String>,
    pub(crate) delete_error_after: Option<usize>,
    pub(crate) queries: Mutex<Vec<(String, String)>>,
    pub(crate) deletes: Mutex<Vec<DeleteStatement>>,
    pub(crate) writes: Mutex<Vec<(String, String)>>,
}

impl FakeGateway {
    pub(crate) fn with_matching_rows(matching_rows: u64) -> Self {
        Self {
            matching_rows: Mutex::new(matching_rows),
            ..Self::default()
        }
    }

    pub(crate) fn with_rows(rows: Vec<QueryRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub(crate) async fn delete_count(&self) -> usize {
        self.deletes.lock().await.len()
    }
}

#[async_trait]
impl DatabaseGateway for FakeGateway {
    async fn query(&self, sql: &str, database: &str) -> AppResult<Vec<QueryRow>> {
        self.queries
            .lock()
            .await
            .push((sql.to_owned(), database.to_owned()));
        if let Some(message) = &self.query_error {
            return Err(AppError::Query(message.clone()));
        }

        Ok(self.rows.lock().await.clone())
    }

    async fn execute(&self, sql: &str, database: &str) -> AppResult<()> {
        if let Some(message) = &self.write_error {
            return Err(AppError::Query(message.clone()));
        }

        self.writes
            .lock()
            .await
            .push((sql.to_owned(), database.to_owned()));
        Ok(())
    }

    async fn execute_delete(&self, statement: &DeleteStatement) -> AppResult<u64> {
        let mut deletes = self.deletes.lock().await;
        if self
            .delete_error_after
            .is_some_and(|allowed| deletes.len() >= allowed)
        {
            return Err(AppError::Query(
                "ERROR 1205 (HY000): Lock wait timeout exceeded".to_owned(),
            ));
        }
        deletes.push(statement.clone());

        let limit = u64::from(statement.row_limit());
        if self.always_matching {
            return Ok(limit);
        }

        let mut matching_rows = self.matching_rows.lock().await;
        let affected = (*matching_rows).min(limit);
        *matching_rows -= affected;
        if let Some(arrived) = self.arrivals.lock().await.pop_front() {
            *matching_rows += arrived;
        }
        Ok(affected)
    }
}

/// Resolves connection references from a fixed map.
#[derive(Default)]
pub(crate) struct FakeGatewayProvider {
    pub(crate) gateways: HashMap<String, Arc<FakeGateway>>,
    pub(crate) resolved: Mutex<Vec<String>>,
}

impl FakeGatewayProvider {
    pub(crate) fn with(entries: Vec<(&str, Arc<FakeGateway>)>) -> Self {
        Self {
            gateways: entries
                .into_iter()
                .map(|(name, gateway)| (name.to_owned(), gateway))
                .collect(),
            resolved: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GatewayProvider for FakeGatewayProvider {
    async fn gateway_for(
        &self,
        connection_reference: &str,
    ) -> AppResult<Arc<dyn DatabaseGateway>> {
        self.resolved
            .lock()
            .await
            .push(connection_reference.to_owned());

        self.gateways
            .get(connection_reference)
            .cloned()
            .map(|gateway| gateway as Arc<dyn DatabaseGateway>)
            .ok_or_else(|| {
                AppError::Query(format!(
                    "connection '{connection_reference}' is not configured"
                ))
            })
    }
}

/// Builds a well-formed configuration row.
pub(crate) fn policy_row(
    policy_id: i64,
    group_id: i64,
    connection: &str,
    table: &str,
    row_limit: u32,
) -> QueryRow {
    QueryRow::new()
        .with("config_id", Some(policy_id.to_string()))
        .with("login_path", Some(connection))
        .with("db_schema", Some("db"))
        .with("table_name", Some(table))
        .with(
            "where_condition",
            Some("created_at < NOW() - INTERVAL RETENSION DAY"),
        )
        .with("retension_days", Some("30"))
        .with("cleanup_group", Some("nightly"))
        .with("group_id", Some(group_id.to_string()))
        .with("status", Some("1"))
        .with("binlog_on_off", Some("1"))
        .with("delete_limit", Some(row_limit.to_string()))
}
