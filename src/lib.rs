//! Sanitizing reverse-proxy gateway library.

pub mod config;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod sanitize;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use sanitize::{FieldRule, RuleSet};
