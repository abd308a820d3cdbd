//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod mysql_database_gateway;
mod mysql_gateway_registry;

pub use mysql_database_gateway::MySqlDatabaseGateway;
pub use mysql_gateway_registry::{ConnectionSettings, DEFAULT_MAX_CONNECTIONS, MySqlGatewayRegistry};
