mod gateway;
mod provider;

pub use gateway::{DatabaseGateway, QueryRow};
pub use provider::GatewayProvider;
