use chrono::{DateTime, Utc};
use retentor_core::PolicyId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Totals produced by one batch-delete loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Rows removed across all iterations.
    pub rows_deleted: u64,
    /// Delete statements issued, including the converging empty one.
    pub iterations: u32,
    /// Delete statements that removed at least one row.
    pub productive_batches: u32,
    /// The loop stopped on the iteration cap while rows were still matching.
    pub cap_reached: bool,
}

/// Final state of one policy within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOutcome {
    /// The batch loop completed or stopped on the iteration cap.
    Succeeded,
    /// Connection resolution or a delete statement failed.
    Failed,
    /// Statement was only rendered and logged.
    DryRun,
}

/// Result of executing one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRunResult {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// `schema.table` the policy prunes.
    pub table: String,
    /// Final outcome.
    pub outcome: PolicyOutcome,
    /// Rows deleted; zero for dry runs and failures.
    pub rows_deleted: u64,
    /// Delete statements issued.
    pub iterations: u32,
    /// Delete statements that removed at least one row.
    pub productive_batches: u32,
    /// Whether the iteration cap stopped the loop.
    pub cap_reached: bool,
    /// Error detail for failed policies.
    pub error: Option<String>,
}

impl PolicyRunResult {
    /// Builds a successful result from a delete outcome.
    #[must_use]
    pub fn succeeded(policy_id: PolicyId, table: String, outcome: DeleteOutcome) -> Self {
        Self {
            policy_id,
            table,
            outcome: PolicyOutcome::Succeeded,
            rows_deleted: outcome.rows_deleted,
            iterations: outcome.iterations,
            productive_batches: outcome.productive_batches,
            cap_reached: outcome.cap_reached,
            error: None,
        }
    }

    /// Builds a failed result.
    ///
    /// Statements issued before the failure are still counted; the partial
    /// row total in `progress` is not carried over.
    #[must_use]
    pub fn failed(
        policy_id: PolicyId,
        table: String,
        progress: DeleteOutcome,
        error: impl Into<String>,
    ) -> Self {
        Self {
            policy_id,
            table,
            outcome: PolicyOutcome::Failed,
            rows_deleted: 0,
            iterations: progress.iterations,
            productive_batches: progress.productive_batches,
            cap_reached: false,
            error: Some(error.into()),
        }
    }

    /// Builds a dry-run result.
    #[must_use]
    pub fn dry_run(policy_id: PolicyId, table: String) -> Self {
        Self {
            policy_id,
            table,
            outcome: PolicyOutcome::DryRun,
            rows_deleted: 0,
            iterations: 0,
            productive_batches: 0,
            cap_reached: false,
            error: None,
        }
    }
}

/// Aggregated result of one cleanup invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Correlation identifier for this invocation.
    pub run_id: Uuid,
    /// Whether deletes were simulated.
    pub dry_run: bool,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Completion timestamp, set by [`RunSummary::finish`].
    pub finished_at: Option<DateTime<Utc>>,
    /// Well-formed policies attempted.
    pub total_policies: usize,
    /// Policies that completed, including dry runs and capped loops.
    pub succeeded: usize,
    /// Policies that failed.
    pub failed: usize,
    /// Malformed rows skipped at load time.
    pub rejected: usize,
    /// Policies that stopped on the iteration cap.
    pub capped: usize,
    /// Rows deleted across all policies.
    pub total_rows_deleted: u64,
    /// Per-policy results in execution order.
    pub results: Vec<PolicyRunResult>,
}

impl RunSummary {
    /// Starts an empty summary.
    #[must_use]
    pub fn start(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            total_policies: 0,
            succeeded: 0,
            failed: 0,
            rejected: 0,
            capped: 0,
            total_rows_deleted: 0,
            results: Vec::new(),
        }
    }

    /// Folds one policy result into the totals.
    pub fn record(&mut self, result: PolicyRunResult) {
        self.total_policies += 1;
        match result.outcome {
            PolicyOutcome::Succeeded | PolicyOutcome::DryRun => self.succeeded += 1,
            PolicyOutcome::Failed => self.failed += 1,
        }
        if result.cap_reached {
            self.capped += 1;
        }
        self.total_rows_deleted = self.total_rows_deleted.saturating_add(result.rows_deleted);
        self.results.push(result);
    }

    /// Stamps the completion time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Returns true when at least one policy failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
