//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (`maxlen` > 0)
//! - Check the upstream is an absolute `http` URL
//! - Check header names in policies are legal HTTP header names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::{FieldRuleConfig, GatewayConfig, HeaderPolicyConfig};

/// A single semantic problem in the configuration, tagged with its dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }

    match Url::parse(&config.upstream.url) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::new(
            "upstream.url",
            format!("unsupported scheme '{}', only http is supported", url.scheme()),
        )),
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::new("upstream.url", "missing host"))
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("upstream.url", e.to_string())),
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    for (name, rule) in &config.fields {
        check_rule(&format!("fields.{}", name), rule, &mut errors);
    }
    if let Some(rule) = &config.default_field {
        check_rule("default_field", rule, &mut errors);
    }
    if let Some(rule) = &config.sanitize_headers {
        check_rule("sanitize_headers", rule, &mut errors);
    }
    if let Some(rule) = &config.sanitize_field_names {
        check_rule("sanitize_field_names", rule, &mut errors);
    }

    check_header_policy("header_in", &config.header_in, &mut errors);
    check_header_policy("header_out", &config.header_out, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_rule(path: &str, rule: &FieldRuleConfig, errors: &mut Vec<ValidationError>) {
    if rule.maxlen == Some(0) {
        errors.push(ValidationError::new(
            format!("{}.maxlen", path),
            "must be greater than 0",
        ));
    }
}

fn check_header_policy(path: &str, policy: &HeaderPolicyConfig, errors: &mut Vec<ValidationError>) {
    let names = policy
        .set
        .keys()
        .map(|n| ("set", n))
        .chain(policy.del.iter().map(|n| ("del", n)))
        .chain(policy.only.iter().map(|n| ("only", n)));

    for (stage, name) in names {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("{}.{}", path, stage),
                format!("'{}' is not a valid header name", name),
            ));
        }
    }

    for (name, value) in &policy.set {
        if axum::http::HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                format!("{}.set.{}", path, name),
                "value is not a valid header value",
            ));
        }
    }
}
