use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::policy::{ReplicationMode, SqlIdentifier};

/// Bounded `DELETE` issued once per batch iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStatement {
    schema: SqlIdentifier,
    table: SqlIdentifier,
    predicate: String,
    row_limit: u32,
    replication: ReplicationMode,
}

impl DeleteStatement {
    /// Creates a statement from an already materialized predicate.
    #[must_use]
    pub fn new(
        schema: SqlIdentifier,
        table: SqlIdentifier,
        predicate: String,
        row_limit: u32,
        replication: ReplicationMode,
    ) -> Self {
        Self {
            schema,
            table,
            predicate,
            row_limit,
            replication,
        }
    }

    /// Database the statement runs against.
    #[must_use]
    pub fn database(&self) -> &str {
        self.schema.as_str()
    }

    /// Returns the row limit of one execution.
    #[must_use]
    pub fn row_limit(&self) -> u32 {
        self.row_limit
    }

    /// Returns the replication logging mode for this statement.
    #[must_use]
    pub fn replication(&self) -> ReplicationMode {
        self.replication
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> String {
        self.to_string()
    }
}

impl Display for DeleteStatement {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "DELETE FROM {}.{} WHERE {} LIMIT {};",
            self.schema, self.table, self.predicate, self.row_limit
        )
    }
}
