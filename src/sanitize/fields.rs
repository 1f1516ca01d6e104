//! Request sanitizer: per-field type dispatch and query/form rewriting.

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::config::schema::FieldType;
use crate::observability::metrics;
use crate::sanitize::ladder::{self, FORMAT_PREFIX_LADDER, NAME_LADDER, TEXT_LADDER};
use crate::sanitize::rules::{FieldRule, RuleSet};
use crate::sanitize::validate;

/// Run the ladder for the rule's declared type over one value.
pub fn sanitize_value(rule: &FieldRule, value: &str) -> String {
    match rule.field_type {
        FieldType::Text => ladder::run(TEXT_LADDER, rule, value),
        FieldType::Numeric => ladder::whitelist_digits(value),
        FieldType::Email => ladder::validate_or_blank(
            ladder::run(FORMAT_PREFIX_LADDER, rule, value),
            validate::is_email,
        ),
        FieldType::Ip => ladder::validate_or_blank(value.to_string(), validate::is_ip),
        FieldType::Url => ladder::validate_or_blank(
            ladder::run(FORMAT_PREFIX_LADDER, rule, value),
            validate::is_url,
        ),
        FieldType::Path => ladder::validate_or_blank(
            ladder::run(FORMAT_PREFIX_LADDER, rule, value),
            validate::is_request_uri,
        ),
        FieldType::Filename => {
            validate::safe_filename(&ladder::run(FORMAT_PREFIX_LADDER, rule, value))
        }
        FieldType::Unixtime => {
            ladder::validate_or_blank(value.to_string(), validate::is_unix_time)
        }
        FieldType::Absent => String::new(),
        FieldType::Unset => value.to_string(),
    }
}

/// Sanitize one field name/value pair against the active rules.
///
/// The value is transformed by its resolved rule (or passed through when no
/// rule resolves); the name by the field-name rule, if one is configured.
pub fn sanitize_field(rules: &RuleSet, name: &str, value: &str) -> (String, String) {
    let new_value = match rules.resolve(name) {
        Some(rule) => apply_rule(rule, name, value),
        None => value.to_string(),
    };
    let new_name = rename(rules, name).unwrap_or_else(|| name.to_string());
    (new_name, new_value)
}

fn apply_rule(rule: &FieldRule, name: &str, value: &str) -> String {
    let sanitized = sanitize_value(rule, value);
    audit_value(name, rule.field_type, value, &sanitized);
    sanitized
}

/// The rewritten field name, or `None` when the name rule is off or leaves
/// the name as it was.
fn rename(rules: &RuleSet, name: &str) -> Option<String> {
    let rule = rules.name_rule()?;
    let sanitized = ladder::run(NAME_LADDER, rule, name);
    if sanitized == name {
        return None;
    }
    tracing::info!(original = ?name, sanitized = ?sanitized, "Field name rewritten");
    Some(sanitized)
}

fn audit_value(name: &str, field_type: FieldType, original: &str, sanitized: &str) {
    if original == sanitized {
        return;
    }
    let blanked = sanitized.is_empty() && field_type != FieldType::Absent;
    if blanked {
        metrics::record_blanked(field_type.as_str());
        tracing::warn!(
            field = %name,
            field_type = %field_type,
            original = ?original,
            "Rejected value blanked"
        );
    } else {
        tracing::info!(
            field = %name,
            field_type = %field_type,
            original = ?original,
            sanitized = ?sanitized,
            "Field value sanitized"
        );
    }
}

/// Result of rewriting a form-encoded string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRewrite {
    /// Re-encoded fields, sorted by key.
    pub encoded: Vec<u8>,
    /// Number of name/value pairs parsed from the input.
    pub field_count: usize,
}

/// One `name=value` segment, split but not yet decoded.
struct RawPair<'a> {
    name: &'a [u8],
    value: Option<&'a [u8]>,
}

fn split_pairs(input: &[u8]) -> impl Iterator<Item = RawPair<'_>> {
    input
        .split(|b| *b == b'&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.iter().position(|b| *b == b'=') {
            Some(eq) => RawPair {
                name: &segment[..eq],
                value: Some(&segment[eq + 1..]),
            },
            None => RawPair {
                name: segment,
                value: None,
            },
        })
}

/// Percent-decode one component byte-wise, with `+` as space.
fn decode_component(raw: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|b| if *b == b'+' { b' ' } else { *b })
        .collect();
    urlencoding::decode_binary(&spaced).into_owned()
}

fn encode_component(value: &str) -> Vec<u8> {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .into_bytes()
}

/// Parse `input` as `application/x-www-form-urlencoded`, sanitize every pair
/// and re-encode.
///
/// Pairs are gathered into a multi-map keyed by the decoded (possibly
/// rewritten) name, so repeated keys keep all their values in input order
/// while keys come out in byte order. Original key ordering is not preserved.
///
/// Only components a rule touches are decoded to text and re-encoded. A name
/// the name rule leaves alone, and the value of a field no rule resolves for,
/// are emitted with their original bytes.
pub fn sanitize_form(rules: &RuleSet, input: &[u8]) -> FormRewrite {
    let mut fields: BTreeMap<Vec<u8>, Vec<Vec<u8>>> = BTreeMap::new();
    let mut field_count = 0;

    for pair in split_pairs(input) {
        field_count += 1;
        let decoded_name = decode_component(pair.name);
        let name = String::from_utf8_lossy(&decoded_name).into_owned();

        let (sort_key, mut segment) = match rename(rules, &name) {
            Some(new_name) => {
                let encoded = encode_component(&new_name);
                (new_name.into_bytes(), encoded)
            }
            None => (decoded_name, pair.name.to_vec()),
        };

        let value = match rules.resolve(&name) {
            Some(rule) => {
                let decoded = decode_component(pair.value.unwrap_or_default());
                let value = String::from_utf8_lossy(&decoded);
                Some(encode_component(&apply_rule(rule, &name, &value)))
            }
            None => pair.value.map(<[u8]>::to_vec),
        };
        if let Some(value) = value {
            segment.push(b'=');
            segment.extend_from_slice(&value);
        }

        fields.entry(sort_key).or_default().push(segment);
    }

    let segments: Vec<Vec<u8>> = fields.into_values().flatten().collect();
    FormRewrite {
        encoded: segments.join(&b'&'),
        field_count,
    }
}

/// Rewrite a raw query string.
pub fn sanitize_query(rules: &RuleSet, query: &str) -> String {
    // Splitting on ASCII delimiters keeps the raw segments valid UTF-8.
    match String::from_utf8(sanitize_form(rules, query.as_bytes()).encoded) {
        Ok(query) => query,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Rewrite a form-encoded body. Returns `None` when nothing parsed, in which
/// case the original body must be forwarded untouched.
pub fn sanitize_body(rules: &RuleSet, body: &[u8]) -> Option<Vec<u8>> {
    let rewrite = sanitize_form(rules, body);
    if rewrite.field_count == 0 {
        None
    } else {
        Some(rewrite.encoded)
    }
}
