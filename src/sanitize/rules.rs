//! Typed rule set and the field rule resolver.
//!
//! A [`RuleSet`] is compiled once from a validated
//! [`GatewayConfig`](crate::config::GatewayConfig) and is never mutated
//! afterwards. Reloads build a new one and swap it in whole.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::schema::{FieldRuleConfig, FieldType, GatewayConfig};
use crate::filter::{CookiePolicy, HeaderPolicy};

/// Sanitization policy for one field.
///
/// Options that were absent in the config compile to "off".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    pub field_type: FieldType,
    pub maxlen: Option<usize>,
    pub strip_chars: Option<String>,
    pub strip_quotation: bool,
    pub strip_binary: bool,
    pub strip_html: bool,
    pub strip_sqlia: bool,
}

impl FieldRule {
    /// A rule of the given type with every optional step off.
    pub fn of_type(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::default()
        }
    }
}

impl From<&FieldRuleConfig> for FieldRule {
    fn from(config: &FieldRuleConfig) -> Self {
        Self {
            field_type: config.field_type,
            maxlen: config.maxlen.filter(|max| *max > 0),
            strip_chars: config.strip_chars.clone().filter(|chars| !chars.is_empty()),
            strip_quotation: config.strip_quotation.unwrap_or(false),
            strip_binary: config.strip_binary.unwrap_or(false),
            strip_html: config.strip_html.unwrap_or(false),
            strip_sqlia: config.strip_sqlia.unwrap_or(false),
        }
    }
}

/// The complete, immutable policy applied to one request/response round trip.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: HashMap<String, FieldRule>,
    default_field: Option<FieldRule>,
    header_rule: Option<FieldRule>,
    name_rule: Option<FieldRule>,
    headers_in: HeaderPolicy,
    headers_out: HeaderPolicy,
    cookies_in: CookiePolicy,
}

impl RuleSet {
    /// Compile the rule-related parts of a configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            fields: config
                .fields
                .iter()
                .map(|(name, rule)| (name.clone(), FieldRule::from(rule)))
                .collect(),
            default_field: config.default_field.as_ref().map(FieldRule::from),
            header_rule: config.sanitize_headers.as_ref().map(FieldRule::from),
            name_rule: config.sanitize_field_names.as_ref().map(FieldRule::from),
            headers_in: HeaderPolicy::from_config(&config.header_in),
            headers_out: HeaderPolicy::from_config(&config.header_out),
            cookies_in: CookiePolicy::from_config(&config.cookie_in),
        }
    }

    /// Resolve the rule for a field: exact name, else the default rule, else none.
    ///
    /// `None` means the field passes through untouched.
    pub fn resolve(&self, field_name: &str) -> Option<&FieldRule> {
        self.fields
            .get(field_name)
            .or(self.default_field.as_ref())
    }

    /// Rule applied to every inbound header value, if configured.
    pub fn header_rule(&self) -> Option<&FieldRule> {
        self.header_rule.as_ref()
    }

    /// Rule applied to field names, if configured.
    pub fn name_rule(&self) -> Option<&FieldRule> {
        self.name_rule.as_ref()
    }

    pub fn headers_in(&self) -> &HeaderPolicy {
        &self.headers_in
    }

    pub fn headers_out(&self) -> &HeaderPolicy {
        &self.headers_out
    }

    pub fn cookies_in(&self) -> &CookiePolicy {
        &self.cookies_in
    }

    /// Number of explicitly named field rules.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Builder used by tests and the CLI to add a single field rule.
    pub fn with_field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// Builder for the default-fallback rule.
    pub fn with_default(mut self, rule: FieldRule) -> Self {
        self.default_field = Some(rule);
        self
    }

    /// JSON summary of the compiled rules, for the `check` command.
    pub fn summary(&self) -> serde_json::Value {
        let fields: BTreeMap<&String, &FieldRule> = self.fields.iter().collect();
        serde_json::json!({
            "fields": fields,
            "default_field": self.default_field,
            "sanitize_headers": self.header_rule,
            "sanitize_field_names": self.name_rule,
            "header_in": self.headers_in.summary(),
            "header_out": self.headers_out.summary(),
            "cookie_in": self.cookies_in.summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_resolve_exact_then_default_then_none() {
        let rules = RuleSet::default().with_field("q", FieldRule::of_type(FieldType::Text));
        assert_eq!(rules.resolve("q").unwrap().field_type, FieldType::Text);
        assert!(rules.resolve("other").is_none());

        let rules = rules.with_default(FieldRule::of_type(FieldType::Numeric));
        assert_eq!(rules.resolve("q").unwrap().field_type, FieldType::Text);
        assert_eq!(rules.resolve("other").unwrap().field_type, FieldType::Numeric);
    }

    #[test]
    fn test_field_names_are_case_sensitive() {
        let rules = RuleSet::default().with_field("q", FieldRule::of_type(FieldType::Text));
        assert!(rules.resolve("Q").is_none());
    }

    #[test]
    fn test_from_config() {
        let config = load_config_from_str(
            r#"
            [fields.amount]
            type = "numeric"

            [fields.comment]
            type = "text"
            maxlen = 10
            strip_chars = ""
            strip_html = true

            [sanitize_headers]
            strip_sqlia = true
            "#,
        )
        .unwrap();
        let rules = RuleSet::from_config(&config);

        assert_eq!(rules.field_count(), 2);
        let comment = rules.resolve("comment").unwrap();
        assert_eq!(comment.maxlen, Some(10));
        assert_eq!(comment.strip_chars, None);
        assert!(comment.strip_html);
        assert!(!comment.strip_binary);
        assert!(rules.header_rule().unwrap().strip_sqlia);
        assert!(rules.name_rule().is_none());
        assert!(rules.headers_in().is_empty());
    }

    #[test]
    fn test_summary_lists_fields() {
        let rules = RuleSet::default().with_field("q", FieldRule::of_type(FieldType::Ip));
        let summary = rules.summary();
        assert_eq!(summary["fields"]["q"]["field_type"], "ip");
        assert!(summary["default_field"].is_null());
    }
}
