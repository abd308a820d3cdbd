//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod policy;
mod predicate;
mod run;
mod statement;

pub use policy::{ReplicationMode, RetentionPolicy, RetentionPolicyInput, SqlIdentifier};
pub use predicate::{PredicateTemplate, RETENTION_PLACEHOLDER, RetentionDays};
pub use run::{DeleteOutcome, PolicyOutcome, PolicyRunResult, RunSummary};
pub use statement::DeleteStatement;
