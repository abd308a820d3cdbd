use std::sync::Arc;

use retentor_core::{AppError, AppResult, PolicyId};
use retentor_domain::{ReplicationMode, RetentionDays, RetentionPolicy, RetentionPolicyInput};
use tracing::{info, warn};

use crate::cleanup_ports::{DatabaseGateway, QueryRow};
use crate::policy_store::PolicyStore;

/// One configuration row excluded at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRejection {
    /// Identifier of the row, when it could be parsed.
    pub policy_id: Option<PolicyId>,
    /// Why the row was excluded.
    pub reason: String,
}

/// Well-formed policies in execution order plus the rows that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedPolicies {
    /// Policies ordered by group id, then policy id.
    pub policies: Vec<RetentionPolicy>,
    /// Malformed rows.
    pub rejected: Vec<PolicyRejection>,
}

/// Reads active cleanup policies from the configuration store.
#[derive(Clone)]
pub struct PolicyLoader {
    gateway: Arc<dyn DatabaseGateway>,
    store: PolicyStore,
}

impl PolicyLoader {
    /// Creates a loader over the configuration store gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn DatabaseGateway>, store: PolicyStore) -> Self {
        Self { gateway, store }
    }

    /// Returns the configuration table location.
    #[must_use]
    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    /// Loads active policies, skipping malformed rows with a warning.
    ///
    /// A failing read is returned as-is since no policy can be trusted then.
    pub async fn load_active_policies(&self, group_id: Option<i64>) -> AppResult<LoadedPolicies> {
        match group_id {
            Some(group_id) => info!(group_id, "fetching cleanup policies for group"),
            None => info!("fetching all active cleanup policies"),
        }

        let rows = self
            .gateway
            .query(
                self.store.select_active_sql(group_id).as_str(),
                self.store.database(),
            )
            .await?;

        let mut loaded = LoadedPolicies::default();
        for row in rows {
            match policy_from_row(&row) {
                Ok(policy) => loaded.policies.push(policy),
                Err(error) => {
                    let policy_id = parse_policy_id(&row).ok();
                    warn!(
                        policy_id = ?policy_id.map(|id| id.as_i64()),
                        error = %error,
                        "skipping malformed cleanup policy"
                    );
                    loaded.rejected.push(PolicyRejection {
                        policy_id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        loaded
            .policies
            .sort_by_key(|policy| (policy.group_id(), policy.policy_id()));

        if loaded.policies.is_empty() {
            warn!("no cleanup policies found matching criteria");
        } else {
            info!(
                count = loaded.policies.len(),
                rejected = loaded.rejected.len(),
                "loaded cleanup policies"
            );
        }

        Ok(loaded)
    }
}

fn policy_from_row(row: &QueryRow) -> AppResult<RetentionPolicy> {
    let policy_id = parse_policy_id(row)?;
    let retention_days = RetentionDays::parse(required_text(row, "retension_days")?)?;

    RetentionPolicy::new(RetentionPolicyInput {
        policy_id,
        connection_reference: required_text(row, "login_path")?.to_owned(),
        schema: required_text(row, "db_schema")?.to_owned(),
        table: required_text(row, "table_name")?.to_owned(),
        predicate_template: required_text(row, "where_condition")?.to_owned(),
        retention_days,
        cleanup_group: optional_text(row, "cleanup_group")?.map(ToOwned::to_owned),
        group_id: parse_integer::<i64>(row, "group_id")?,
        is_active: parse_flag(row, "status")?,
        replication: ReplicationMode::from_flag(parse_flag(row, "binlog_on_off")?),
        row_limit: parse_integer::<u32>(row, "delete_limit")?,
    })
}

fn parse_policy_id(row: &QueryRow) -> AppResult<PolicyId> {
    parse_integer::<i64>(row, "config_id").map(PolicyId::new)
}

fn optional_text<'a>(row: &'a QueryRow, column: &str) -> AppResult<Option<&'a str>> {
    match row.get(column) {
        Some(value) => Ok(value.filter(|value| !is_null_marker(value))),
        None => Err(AppError::Validation(format!("missing column '{column}'"))),
    }
}

fn required_text<'a>(row: &'a QueryRow, column: &str) -> AppResult<&'a str> {
    optional_text(row, column)?
        .ok_or_else(|| AppError::Validation(format!("column '{column}' must not be NULL")))
}

fn parse_integer<T>(row: &QueryRow, column: &str) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = required_text(row, column)?;
    value.trim().parse::<T>().map_err(|error| {
        AppError::Validation(format!("invalid {column} value '{value}': {error}"))
    })
}

fn parse_flag(row: &QueryRow, column: &str) -> AppResult<bool> {
    match parse_integer::<i64>(row, column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(AppError::Validation(format!(
            "{column} must be 0 or 1, got {other}"
        ))),
    }
}

// Batch-mode client output spells NULL as `\N` or `NULL`.
fn is_null_marker(value: &str) -> bool {
    value == "\\N" || value == "NULL"
}
