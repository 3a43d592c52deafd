//! Node Balancer Library

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::{BalancerError, BalancerResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
