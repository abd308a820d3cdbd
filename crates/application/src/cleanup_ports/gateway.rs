use std::collections::BTreeMap;

use async_trait::async_trait;
use retentor_core::AppResult;
use retentor_domain::DeleteStatement;

/// One result row keyed by column name, values kept as raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRow {
    values: BTreeMap<String, Option<String>>,
}

impl QueryRow {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one column value; `None` stands for SQL `NULL`.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.insert(column, value.map(Into::into));
        self
    }

    /// Sets one column value.
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        self.values.insert(column.into(), value);
    }

    /// Returns `None` for an absent column, `Some(None)` for `NULL`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.values.get(column).map(Option::as_deref)
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for QueryRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(column, value)| (column.into(), value.map(Into::into)))
                .collect(),
        }
    }
}

/// Executes caller-built SQL against a named database.
///
/// Implementations do not parse or validate SQL and do not retry; failures
/// surface as query errors carrying the server diagnostic.
#[async_trait]
pub trait DatabaseGateway: Send + Sync {
    /// Runs a read query and returns rows in server order.
    async fn query(&self, sql: &str, database: &str) -> AppResult<Vec<QueryRow>>;

    /// Runs a write statement without inspecting its result.
    async fn execute(&self, sql: &str, database: &str) -> AppResult<()>;

    /// Runs one bounded delete and returns the server-reported affected rows.
    ///
    /// Replication suppression, when requested, applies to this statement only.
    async fn execute_delete(&self, statement: &DeleteStatement) -> AppResult<u64>;
}
