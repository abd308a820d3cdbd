//! Application services and ports.

#![forbid(unsafe_code)]

mod batch_deleter;
mod cleanup_ports;
mod cleanup_service;
mod policy_loader;
mod policy_store;

#[cfg(test)]
mod test_fakes;

pub use batch_deleter::{BatchDeleteError, BatchDeleter, DEFAULT_MAX_ITERATIONS};
pub use cleanup_ports::{DatabaseGateway, GatewayProvider, QueryRow};
pub use cleanup_service::CleanupService;
pub use policy_loader::{LoadedPolicies, PolicyLoader, PolicyRejection};
pub use policy_store::PolicyStore;
