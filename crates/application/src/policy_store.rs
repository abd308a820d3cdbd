use retentor_core::PolicyId;
use retentor_domain::SqlIdentifier;

/// Columns read from the configuration table, in select order.
const POLICY_COLUMNS: &[&str] = &[
    "config_id",
    "login_path",
    "db_schema",
    "table_name",
    "where_condition",
    "retension_days",
    "cleanup_group",
    "group_id",
    "status",
    "binlog_on_off",
    "delete_limit",
];

/// Location of the cleanup policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStore {
    database: SqlIdentifier,
    table: SqlIdentifier,
}

impl PolicyStore {
    /// Creates a store location.
    #[must_use]
    pub fn new(database: SqlIdentifier, table: SqlIdentifier) -> Self {
        Self { database, table }
    }

    /// Returns the configuration database name.
    #[must_use]
    pub fn database(&self) -> &str {
        self.database.as_str()
    }

    /// Returns the configuration table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Builds the select for active policies, optionally scoped to one group.
    #[must_use]
    pub fn select_active_sql(&self, group_id: Option<i64>) -> String {
        let group_filter = group_id
            .map(|group_id| format!(" AND group_id = {group_id}"))
            .unwrap_or_default();

        format!(
            "SELECT {} FROM {} WHERE status = 1 AND login_path IS NOT NULL{} ORDER BY group_id, config_id",
            POLICY_COLUMNS.join(", "),
            self.table,
            group_filter
        )
    }

    /// Builds the update that stamps `last_run_at` for one policy.
    #[must_use]
    pub fn touch_last_run_sql(&self, policy_id: PolicyId) -> String {
        format!(
            "UPDATE {} SET last_run_at = NOW() WHERE config_id = {}",
            self.table, policy_id
        )
    }
}
