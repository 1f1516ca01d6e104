//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → RuleSet::from_config (typed rules, shared via Arc)
//!
//! On reload signal (file change or SIGHUP):
//!     watcher.rs / lifecycle::signals detect it
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<RuleSet>
//!     → the next request observes the new rules
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - A failed reload keeps the previous rules in force

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_config_from_str, ConfigError};
pub use schema::{
    CookiePolicyConfig, FieldRuleConfig, FieldType, GatewayConfig, HeaderPolicyConfig,
    ObservabilityConfig, ServerConfig, TimeoutConfig, UpstreamConfig,
};
