use retentor_core::{AppError, AppResult};
use retentor_domain::{DeleteOutcome, RetentionPolicy};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cleanup_ports::DatabaseGateway;

/// Iteration cap applied when none is configured.
pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

/// A delete statement failed part way through the batch loop.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct BatchDeleteError {
    /// Gateway failure that stopped the loop.
    pub error: AppError,
    /// Loop progress up to the failure; `iterations` includes the failed
    /// statement.
    pub progress: DeleteOutcome,
}

/// Deletes rows matching a policy in bounded batches until none are left.
///
/// The loop runs to a fixpoint: rows that age into the retention window while
/// it runs are picked up by later iterations. It stops when one statement
/// affects zero rows or when the iteration cap is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDeleter {
    max_iterations: u32,
}

impl Default for BatchDeleter {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl BatchDeleter {
    /// Creates a deleter with an explicit iteration cap.
    pub fn new(max_iterations: u32) -> AppResult<Self> {
        if max_iterations == 0 {
            return Err(AppError::Validation(
                "max_iterations must be greater than zero".to_owned(),
            ));
        }

        Ok(Self { max_iterations })
    }

    /// Returns the iteration cap.
    #[must_use]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Runs the batch loop for one policy against its target gateway.
    ///
    /// Any statement failure aborts the loop; rows already removed are only
    /// reported in the error log.
    pub async fn run(
        &self,
        gateway: &dyn DatabaseGateway,
        policy: &RetentionPolicy,
    ) -> Result<DeleteOutcome, BatchDeleteError> {
        let statement = policy.delete_statement();
        let mut outcome = DeleteOutcome::default();

        loop {
            if outcome.iterations >= self.max_iterations {
                outcome.cap_reached = true;
                warn!(
                    policy_id = %policy.policy_id(),
                    max_iterations = self.max_iterations,
                    rows_deleted = outcome.rows_deleted,
                    "reached maximum iterations, stopping with partial total"
                );
                break;
            }

            outcome.iterations += 1;
            debug!(iteration = outcome.iterations, statement = %statement, "executing batch delete");

            let affected = match gateway.execute_delete(&statement).await {
                Ok(affected) => affected,
                Err(error) => {
                    error!(
                        policy_id = %policy.policy_id(),
                        table = %policy.qualified_table(),
                        statement = %statement,
                        iteration = outcome.iterations,
                        rows_deleted_before_failure = outcome.rows_deleted,
                        error = %error,
                        "batch delete failed"
                    );
                    return Err(BatchDeleteError {
                        error,
                        progress: outcome,
                    });
                }
            };

            if affected == 0 {
                info!(
                    rows_deleted = outcome.rows_deleted,
                    iterations = outcome.iterations,
                    "no more rows to delete"
                );
                break;
            }

            outcome.productive_batches += 1;
            outcome.rows_deleted = outcome.rows_deleted.saturating_add(affected);
            info!(
                iteration = outcome.iterations,
                deleted = affected,
                total = outcome.rows_deleted,
                "deleted batch"
            );
        }

        Ok(outcome)
    }
}
