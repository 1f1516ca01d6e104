//! Configuration schema definitions.
//!
//! This module defines the complete configuration document for the gateway.
//! All types derive Serde traits for deserialization from the TOML file.
//! The field rules here are the raw, as-written form; they are compiled into
//! a typed [`RuleSet`](crate::sanitize::RuleSet) once per load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings.
    pub server: ServerConfig,

    /// The single upstream origin.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Per-field sanitization rules keyed by field name.
    pub fields: BTreeMap<String, FieldRuleConfig>,

    /// Rule applied to any field without an entry in `fields`.
    pub default_field: Option<FieldRuleConfig>,

    /// Rule applied to every inbound header value.
    pub sanitize_headers: Option<FieldRuleConfig>,

    /// Rule applied to the names of query and form fields.
    pub sanitize_field_names: Option<FieldRuleConfig>,

    /// Policy for headers sent to the upstream.
    pub header_in: HeaderPolicyConfig,

    /// Policy for headers returned to the client.
    pub header_out: HeaderPolicyConfig,

    /// Policy for cookies sent to the upstream.
    pub cookie_in: CookiePolicyConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Absolute URL of the origin. Only scheme and authority are used.
    pub url: String,

    /// Optional command line of a co-located upstream process to supervise.
    pub exec: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000/".to_string(),
            exec: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a proxied request/response in seconds.
    pub request_secs: u64,

    /// Idle upstream connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 10,
            idle_secs: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// One field rule as written in the config file.
///
/// Every sub-option is optional; `None` means the step is skipped.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FieldRuleConfig {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub maxlen: Option<usize>,
    pub strip_chars: Option<String>,
    pub strip_quotation: Option<bool>,
    pub strip_binary: Option<bool>,
    pub strip_html: Option<bool>,
    pub strip_sqlia: Option<bool>,
}

/// Declared type of a field. Unknown names deserialize to [`FieldType::Unset`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Numeric,
    Email,
    Ip,
    Url,
    Path,
    Filename,
    Unixtime,
    Absent,
    #[default]
    #[serde(other)]
    Unset,
}

impl FieldType {
    /// Lowercase name used in config files and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Numeric => "numeric",
            FieldType::Email => "email",
            FieldType::Ip => "ip",
            FieldType::Url => "url",
            FieldType::Path => "path",
            FieldType::Filename => "filename",
            FieldType::Unixtime => "unixtime",
            FieldType::Absent => "absent",
            FieldType::Unset => "unset",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header set/del/only policy as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HeaderPolicyConfig {
    /// Headers set unconditionally, replacing any existing value.
    pub set: BTreeMap<String, String>,
    /// Headers removed.
    pub del: Vec<String>,
    /// If non-empty, every header not listed is removed.
    pub only: Vec<String>,
}

/// Cookie set/del/only policy as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CookiePolicyConfig {
    /// Cookies appended to the request.
    pub set: BTreeMap<String, String>,
    /// Cookie names removed.
    pub del: Vec<String>,
    /// If non-empty, every cookie not listed is removed.
    pub only: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_is_unset() {
        let rule: FieldRuleConfig = toml::from_str(r#"type = "uuid""#).unwrap();
        assert_eq!(rule.field_type, FieldType::Unset);
    }

    #[test]
    fn test_missing_type_is_unset() {
        let rule: FieldRuleConfig = toml::from_str("maxlen = 3").unwrap();
        assert_eq!(rule.field_type, FieldType::Unset);
        assert_eq!(rule.maxlen, Some(3));
        assert_eq!(rule.strip_html, None);
    }

    #[test]
    fn test_full_document() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            url = "http://10.0.0.1:3000"

            [fields.q]
            type = "text"
            strip_html = true

            [default_field]
            type = "numeric"

            [header_in]
            set = { "X-A" = "1" }
            only = ["X-B"]

            [cookie_in]
            del = ["x"]
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.url, "http://10.0.0.1:3000");
        assert_eq!(config.fields["q"].field_type, FieldType::Text);
        assert_eq!(config.fields["q"].strip_html, Some(true));
        assert_eq!(config.default_field.unwrap().field_type, FieldType::Numeric);
        assert_eq!(config.header_in.set["X-A"], "1");
        assert_eq!(config.header_in.only, vec!["X-B".to_string()]);
        assert!(config.header_out.set.is_empty());
        assert_eq!(config.cookie_in.del, vec!["x".to_string()]);
        assert!(config.sanitize_headers.is_none());
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }
}
