use std::sync::Arc;

use retentor_core::AppResult;
use retentor_domain::{DeleteOutcome, PolicyRunResult, RetentionPolicy, RunSummary};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::batch_deleter::BatchDeleter;
use crate::cleanup_ports::{DatabaseGateway, GatewayProvider};
use crate::policy_loader::PolicyLoader;
use crate::policy_store::PolicyStore;

/// Runs every active policy in retrieval order and aggregates the results.
#[derive(Clone)]
pub struct CleanupService {
    config_gateway: Arc<dyn DatabaseGateway>,
    loader: PolicyLoader,
    gateway_provider: Arc<dyn GatewayProvider>,
    deleter: BatchDeleter,
}

impl CleanupService {
    /// Creates a cleanup service over the configuration store and target connections.
    #[must_use]
    pub fn new(
        config_gateway: Arc<dyn DatabaseGateway>,
        store: PolicyStore,
        gateway_provider: Arc<dyn GatewayProvider>,
    ) -> Self {
        Self {
            loader: PolicyLoader::new(config_gateway.clone(), store),
            config_gateway,
            gateway_provider,
            deleter: BatchDeleter::default(),
        }
    }

    /// Replaces the default batch deleter.
    #[must_use]
    pub fn with_batch_deleter(mut self, deleter: BatchDeleter) -> Self {
        self.deleter = deleter;
        self
    }

    /// Loads policies and applies each one.
    ///
    /// Only a failed policy load aborts the run; per-policy failures are
    /// recorded in the summary and processing moves on.
    pub async fn run(&self, group_id: Option<i64>, dry_run: bool) -> AppResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("cleanup_run", run_id = %run_id, dry_run);

        async move {
            info!(group_id = ?group_id, "cleanup run started");
            if dry_run {
                info!("dry run: no data will be deleted");
            }

            let loaded = self.loader.load_active_policies(group_id).await?;
            let mut summary = RunSummary::start(run_id, dry_run);
            summary.rejected = loaded.rejected.len();

            let total = loaded.policies.len();
            for (index, policy) in loaded.policies.iter().enumerate() {
                let span = info_span!(
                    "policy",
                    policy_id = %policy.policy_id(),
                    table = %policy.qualified_table()
                );
                let result = self
                    .run_policy(policy, index + 1, total, dry_run)
                    .instrument(span)
                    .await;
                summary.record(result);
            }

            summary.finish();
            log_summary(&summary);
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn run_policy(
        &self,
        policy: &RetentionPolicy,
        position: usize,
        total: usize,
        dry_run: bool,
    ) -> PolicyRunResult {
        let statement = policy.delete_statement();
        info!(
            position,
            total,
            schema = %policy.schema(),
            table = %policy.table(),
            retention_days = %policy.retention_days(),
            row_limit = policy.row_limit(),
            binary_log = policy.replication().label(),
            statement = %statement,
            "processing cleanup policy"
        );

        if dry_run {
            info!(statement = %statement, "dry run: skipping deletion");
            return PolicyRunResult::dry_run(policy.policy_id(), policy.qualified_table());
        }

        let gateway = match self
            .gateway_provider
            .gateway_for(policy.connection_reference().as_str())
            .await
        {
            Ok(gateway) => gateway,
            Err(error) => {
                error!(
                    connection = %policy.connection_reference(),
                    error = %error,
                    "failed to resolve target connection"
                );
                return PolicyRunResult::failed(
                    policy.policy_id(),
                    policy.qualified_table(),
                    DeleteOutcome::default(),
                    error.to_string(),
                );
            }
        };

        match self.deleter.run(gateway.as_ref(), policy).await {
            Ok(outcome) => {
                info!(
                    rows_deleted = outcome.rows_deleted,
                    iterations = outcome.iterations,
                    cap_reached = outcome.cap_reached,
                    "cleanup policy completed"
                );
                self.touch_last_run(policy).await;
                PolicyRunResult::succeeded(policy.policy_id(), policy.qualified_table(), outcome)
            }
            Err(failure) => {
                error!(
                    statement = %statement,
                    iterations = failure.progress.iterations,
                    error = %failure.error,
                    "cleanup policy failed"
                );
                PolicyRunResult::failed(
                    policy.policy_id(),
                    policy.qualified_table(),
                    failure.progress,
                    failure.error.to_string(),
                )
            }
        }
    }

    async fn touch_last_run(&self, policy: &RetentionPolicy) {
        let store = self.loader.store();
        let sql = store.touch_last_run_sql(policy.policy_id());
        match self
            .config_gateway
            .execute(sql.as_str(), store.database())
            .await
        {
            Ok(()) => debug!("updated last_run_at"),
            Err(error) => warn!(error = %error, "failed to update last_run_at"),
        }
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        total_policies = summary.total_policies,
        succeeded = summary.succeeded,
        failed = summary.failed,
        rejected = summary.rejected,
        capped = summary.capped,
        total_rows_deleted = summary.total_rows_deleted,
        "cleanup summary"
    );

    for result in summary.results.iter().filter(|result| result.error.is_some()) {
        warn!(
            policy_id = %result.policy_id,
            table = %result.table,
            error = result.error.as_deref().unwrap_or_default(),
            "policy failed; safe to re-run"
        );
    }
}
