use std::fmt::{Display, Formatter};

use retentor_core::{AppError, AppResult, NonEmptyString, PolicyId};
use serde::{Deserialize, Serialize};

use crate::predicate::{PredicateTemplate, RetentionDays};
use crate::statement::DeleteStatement;

/// Schema or table name that is safe to splice into a statement unquoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlIdentifier(String);

impl SqlIdentifier {
    /// Validates an identifier made of ASCII letters, digits, `_` and `$`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(AppError::Validation(
                "identifier must not be empty".to_owned(),
            ));
        }

        if !value
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '$'))
        {
            return Err(AppError::Validation(format!(
                "identifier '{value}' may only contain ASCII letters, digits, '_' and '$'"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for SqlIdentifier {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Whether deletes are written to the replication log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationMode {
    /// Deletes are binary-logged and replicate to downstream servers.
    Replicated,
    /// Binary logging is switched off for each delete statement.
    Suppressed,
}

impl ReplicationMode {
    /// Maps the stored `binlog_on_off` flag.
    #[must_use]
    pub fn from_flag(replicate: bool) -> Self {
        if replicate {
            Self::Replicated
        } else {
            Self::Suppressed
        }
    }

    /// Returns a human-readable label used in run logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Replicated => "ENABLED (replicate)",
            Self::Suppressed => "DISABLED (no replication)",
        }
    }
}

/// Input payload used to construct a validated retention policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicyInput {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Named connection that reaches the target database.
    pub connection_reference: String,
    /// Target schema name.
    pub schema: String,
    /// Target table name.
    pub table: String,
    /// WHERE fragment holding the retention placeholder.
    pub predicate_template: String,
    /// Retention window.
    pub retention_days: RetentionDays,
    /// Optional free-form grouping tag.
    pub cleanup_group: Option<String>,
    /// Numeric group used to select subsets of policies.
    pub group_id: i64,
    /// Active flag.
    pub is_active: bool,
    /// Replication logging behavior for deletes.
    pub replication: ReplicationMode,
    /// Maximum rows removed by one delete statement.
    pub row_limit: u32,
}

/// One validated retention rule for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    policy_id: PolicyId,
    connection_reference: NonEmptyString,
    schema: SqlIdentifier,
    table: SqlIdentifier,
    predicate_template: PredicateTemplate,
    retention_days: RetentionDays,
    cleanup_group: Option<String>,
    group_id: i64,
    is_active: bool,
    replication: ReplicationMode,
    row_limit: u32,
}

impl RetentionPolicy {
    /// Creates a validated retention policy.
    pub fn new(input: RetentionPolicyInput) -> AppResult<Self> {
        let RetentionPolicyInput {
            policy_id,
            connection_reference,
            schema,
            table,
            predicate_template,
            retention_days,
            cleanup_group,
            group_id,
            is_active,
            replication,
            row_limit,
        } = input;

        if row_limit == 0 {
            return Err(AppError::Validation(
                "row limit must be greater than zero".to_owned(),
            ));
        }

        let cleanup_group = cleanup_group.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            policy_id,
            connection_reference: NonEmptyString::new(connection_reference.trim())?,
            schema: SqlIdentifier::new(schema)?,
            table: SqlIdentifier::new(table)?,
            predicate_template: PredicateTemplate::new(predicate_template)?,
            retention_days,
            cleanup_group,
            group_id,
            is_active,
            replication,
            row_limit,
        })
    }

    /// Returns the policy identifier.
    #[must_use]
    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }

    /// Returns the named connection for the target database.
    #[must_use]
    pub fn connection_reference(&self) -> &NonEmptyString {
        &self.connection_reference
    }

    /// Returns the target schema.
    #[must_use]
    pub fn schema(&self) -> &SqlIdentifier {
        &self.schema
    }

    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &SqlIdentifier {
        &self.table
    }

    /// Returns `schema.table`.
    #[must_use]
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Returns the retention window.
    #[must_use]
    pub fn retention_days(&self) -> RetentionDays {
        self.retention_days
    }

    /// Returns the optional grouping tag.
    #[must_use]
    pub fn cleanup_group(&self) -> Option<&str> {
        self.cleanup_group.as_deref()
    }

    /// Returns the numeric group identifier.
    #[must_use]
    pub fn group_id(&self) -> i64 {
        self.group_id
    }

    /// Returns whether the policy is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the replication logging mode.
    #[must_use]
    pub fn replication(&self) -> ReplicationMode {
        self.replication
    }

    /// Returns the per-statement row limit.
    #[must_use]
    pub fn row_limit(&self) -> u32 {
        self.row_limit
    }

    /// Builds the bounded delete statement issued on every iteration.
    #[must_use]
    pub fn delete_statement(&self) -> DeleteStatement {
        DeleteStatement::new(
            self.schema.clone(),
            self.table.clone(),
            self.predicate_template.materialize(self.retention_days),
            self.row_limit,
            self.replication,
        )
    }
}

impl Display for RetentionPolicy {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "policy {} ({}.{}, retention {}d)",
            self.policy_id, self.schema, self.table, self.retention_days
        )
    }
}

#[cfg(test)]
mod tests {
    use retentor_core::PolicyId;

    use super::{ReplicationMode, RetentionPolicy, RetentionPolicyInput, SqlIdentifier};
    use crate::RetentionDays;

    fn input() -> RetentionPolicyInput {
        RetentionPolicyInput {
            policy_id: PolicyId::new(7),
            connection_reference: "orders_primary".to_owned(),
            schema: "db".to_owned(),
            table: "tbl".to_owned(),
            predicate_template: "created_at < NOW() - INTERVAL RETENSION DAY".to_owned(),
            retention_days: RetentionDays::new(30),
            cleanup_group: Some("  nightly ".to_owned()),
            group_id: 1,
            is_active: true,
            replication: ReplicationMode::Replicated,
            row_limit: 500,
        }
    }

    #[test]
    fn policy_renders_bounded_delete_statement() {
        let policy = RetentionPolicy::new(input());
        assert!(policy.is_ok());
        let policy = policy.unwrap_or_else(|_| unreachable!());

        assert_eq!(
            policy.delete_statement().to_string(),
            "DELETE FROM db.tbl WHERE created_at < NOW() - INTERVAL 30 DAY LIMIT 500;"
        );
        assert_eq!(policy.cleanup_group(), Some("nightly"));
        assert_eq!(policy.qualified_table(), "db.tbl");
    }

    #[test]
    fn zero_row_limit_is_rejected() {
        let mut input = input();
        input.row_limit = 0;
        assert!(RetentionPolicy::new(input).is_err());
    }

    #[test]
    fn blank_connection_reference_is_rejected() {
        let mut input = input();
        input.connection_reference = "  ".to_owned();
        assert!(RetentionPolicy::new(input).is_err());
    }

    #[test]
    fn identifiers_reject_statement_fragments() {
        assert!(SqlIdentifier::new("orders_2024").is_ok());
        assert!(SqlIdentifier::new("orders; DROP TABLE users").is_err());
        assert!(SqlIdentifier::new("db.tbl").is_err());
        assert!(SqlIdentifier::new("").is_err());
    }

    #[test]
    fn replication_flag_maps_to_mode() {
        assert_eq!(ReplicationMode::from_flag(true), ReplicationMode::Replicated);
        assert_eq!(ReplicationMode::from_flag(false), ReplicationMode::Suppressed);
    }
}
