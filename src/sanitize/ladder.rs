//! Validator ladder: the stateless string transforms and their fixed orderings.
//!
//! Each step is a pure function. A ladder is an ordered slice of [`Step`]s;
//! [`run`] applies the steps the rule enables, in slice order. Order matters:
//! truncation bounds the cost of later pattern matching, and control bytes are
//! removed before markup so they cannot be used to split a tag.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::sanitize::rules::FieldRule;

/// Token substituted for every SQL keyword once the heuristic fires.
pub const SQL_REDACTION: &str = "******";

/// Characters kept by [`whitelist_digits`].
const DIGIT_WHITELIST: &str = "0123456789,.";

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

static SQL_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)update|select|insert|delete|drop|truncate|rename").expect("static regex")
});

/// Keyword pairs whose co-occurrence marks a value as SQL-bearing.
/// Checked against the lowercased value by plain substring containment.
const SQL_PAIRS: &[(&[&str], &str)] = &[
    (&["select"], "from"),
    (&["update"], "set"),
    (&["insert"], "into"),
    (&["delete"], "from"),
    (&["drop", "truncate", "rename"], "table"),
];

/// One transform in a ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Truncate,
    StripChars,
    StripQuotation,
    StripBinary,
    StripHtml,
    StripSqlia,
}

/// Ladder for `text` fields and for inbound header values.
pub const TEXT_LADDER: &[Step] = &[
    Step::Truncate,
    Step::StripChars,
    Step::StripQuotation,
    Step::StripBinary,
    Step::StripHtml,
    Step::StripSqlia,
];

/// Prefix shared by `email`, `url`, `path` and `filename` before their final check.
pub const FORMAT_PREFIX_LADDER: &[Step] = &[Step::Truncate, Step::StripChars, Step::StripBinary];

/// Ladder applied to field names.
pub const NAME_LADDER: &[Step] = &[
    Step::StripChars,
    Step::StripQuotation,
    Step::StripBinary,
    Step::StripHtml,
];

/// Apply every step of `ladder` that `rule` enables, in order.
pub fn run(ladder: &[Step], rule: &FieldRule, value: &str) -> String {
    ladder
        .iter()
        .fold(value.to_string(), |acc, step| apply(*step, rule, acc))
}

fn apply(step: Step, rule: &FieldRule, value: String) -> String {
    match step {
        Step::Truncate => truncate(&value, rule.maxlen),
        Step::StripChars => match rule.strip_chars.as_deref() {
            Some(charset) => strip_blacklist_chars(&value, charset),
            None => value,
        },
        Step::StripQuotation if rule.strip_quotation => strip_quotation(&value),
        Step::StripBinary if rule.strip_binary => strip_binary(&value),
        Step::StripHtml if rule.strip_html => strip_html(&value),
        Step::StripSqlia if rule.strip_sqlia => redact_sql_keywords(&value),
        _ => value,
    }
}

/// Keep at most `maxlen` bytes. The cut backs off to a character boundary.
pub fn truncate(value: &str, maxlen: Option<usize>) -> String {
    match maxlen {
        Some(max) if value.len() > max => {
            let mut end = max;
            while !value.is_char_boundary(end) {
                end -= 1;
            }
            value[..end].to_string()
        }
        _ => value.to_string(),
    }
}

/// Remove every character that appears in `charset`.
pub fn strip_blacklist_chars(value: &str, charset: &str) -> String {
    value.chars().filter(|c| !charset.contains(*c)).collect()
}

/// Remove all double quotes.
pub fn strip_quotation(value: &str) -> String {
    value.replace('"', "")
}

/// Remove ASCII control characters (including DEL), then trim whitespace.
pub fn strip_binary(value: &str) -> String {
    let kept: String = value
        .chars()
        .filter(|c| (*c as u32) >= 0x20 && *c != '\x7f')
        .collect();
    kept.trim().to_string()
}

/// Remove angle-bracket delimited tags, keeping the text between them.
///
/// Removal repeats until no tag remains. Whitespace exposed at either end
/// by a removed tag is trimmed.
pub fn strip_html(value: &str) -> String {
    let mut current = value.to_string();
    let mut changed = false;
    while MARKUP_TAG.is_match(&current) {
        current = MARKUP_TAG.replace_all(&current, "").into_owned();
        changed = true;
    }
    if changed {
        current.trim().to_string()
    } else {
        current
    }
}

/// Whether the value carries one of the SQL keyword pairs.
pub fn looks_like_sql(value: &str) -> bool {
    let lower = value.to_lowercase();
    SQL_PAIRS.iter().any(|(verbs, object)| {
        lower.contains(object) && verbs.iter().any(|verb| lower.contains(verb))
    })
}

/// Redact SQL keywords when the value looks like a statement.
///
/// This is a containment heuristic, not a parser: it over-matches ordinary
/// prose and misses obfuscated SQL.
pub fn redact_sql_keywords(value: &str) -> String {
    if looks_like_sql(value) {
        SQL_KEYWORD.replace_all(value, SQL_REDACTION).into_owned()
    } else {
        value.to_string()
    }
}

/// Keep only digits, commas and dots.
pub fn whitelist_digits(value: &str) -> String {
    value.chars().filter(|c| DIGIT_WHITELIST.contains(*c)).collect()
}

/// Return the value unchanged if `predicate` accepts it, otherwise an empty string.
pub fn validate_or_blank(value: String, predicate: impl Fn(&str) -> bool) -> String {
    if predicate(&value) {
        value
    } else {
        String::new()
    }
}
