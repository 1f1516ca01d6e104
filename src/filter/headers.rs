//! Header set/del/only policy and inbound header value sanitization.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::schema::HeaderPolicyConfig;
use crate::observability::metrics;
use crate::sanitize::ladder::{self, TEXT_LADDER};
use crate::sanitize::rules::FieldRule;

/// Which leg of the round trip a header policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → upstream.
    Inbound,
    /// Upstream → client.
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        }
    }
}

/// Compiled header policy. Names are lowercase [`HeaderName`]s, so matching is
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct HeaderPolicy {
    set: Vec<(HeaderName, HeaderValue)>,
    del: Vec<HeaderName>,
    only: Vec<HeaderName>,
}

impl HeaderPolicy {
    /// Compile from config. Invalid names or values are skipped; validation
    /// rejects them before a config is accepted.
    pub fn from_config(config: &HeaderPolicyConfig) -> Self {
        Self {
            set: config
                .set
                .iter()
                .filter_map(|(name, value)| {
                    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
                    let value = HeaderValue::from_str(value).ok()?;
                    Some((name, value))
                })
                .collect(),
            del: parse_names(&config.del),
            only: parse_names(&config.only),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.del.is_empty() && self.only.is_empty()
    }

    /// Run set → del → only over a header snapshot.
    ///
    /// `only` runs last, so it removes a header that `set` just added unless
    /// that header is itself allow-listed.
    pub fn apply(&self, headers: HeaderMap, direction: Direction) -> HeaderMap {
        let headers = self.stage_set(headers, direction);
        let headers = self.stage_del(headers, direction);
        self.stage_only(headers, direction)
    }

    fn stage_set(&self, mut headers: HeaderMap, direction: Direction) -> HeaderMap {
        for (name, value) in &self.set {
            headers.insert(name.clone(), value.clone());
            tracing::info!(direction = direction.as_str(), header = %name, value = ?value, "Set header");
        }
        headers
    }

    fn stage_del(&self, mut headers: HeaderMap, direction: Direction) -> HeaderMap {
        for name in &self.del {
            if headers.remove(name).is_some() {
                record_removed(name, direction);
            }
        }
        headers
    }

    fn stage_only(&self, mut headers: HeaderMap, direction: Direction) -> HeaderMap {
        if self.only.is_empty() {
            return headers;
        }
        let rejected: Vec<HeaderName> = headers
            .keys()
            .filter(|name| !self.only.contains(name))
            .cloned()
            .collect();
        for name in rejected {
            headers.remove(&name);
            record_removed(&name, direction);
        }
        headers
    }

    pub(crate) fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "set": self.set.iter()
                .map(|(n, v)| (n.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "del": self.del.iter().map(HeaderName::as_str).collect::<Vec<_>>(),
            "only": self.only.iter().map(HeaderName::as_str).collect::<Vec<_>>(),
        })
    }
}

fn parse_names(names: &[String]) -> Vec<HeaderName> {
    names
        .iter()
        .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
        .collect()
}

fn record_removed(name: &HeaderName, direction: Direction) {
    metrics::record_header_removed(direction.as_str());
    tracing::info!(direction = direction.as_str(), header = %name, "Remove header");
}

/// URL-decode every header value and run it through the text ladder using
/// `rule`'s options. Values are written back decoded.
///
/// A value whose decoded bytes are not UTF-8 is kept byte-for-byte unless the
/// ladder removes something from it.
///
/// A sanitized value that is not a legal header value (a decoded control byte
/// when `strip_binary` is off) has its control bytes removed before writing.
pub fn sanitize_values(headers: HeaderMap, rule: &FieldRule) -> HeaderMap {
    let mut sanitized = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let decoded = urlencoding::decode_binary(value.as_bytes());
        let text = String::from_utf8_lossy(&decoded);
        let cleaned = ladder::run(TEXT_LADDER, rule, &text);

        let new_value = if cleaned == text && std::str::from_utf8(&decoded).is_err() {
            // Not text and nothing removed: keep the bytes as sent.
            Ok(value.clone())
        } else {
            HeaderValue::from_bytes(cleaned.as_bytes()).or_else(|_| {
                HeaderValue::from_bytes(ladder::strip_binary(&cleaned).as_bytes())
            })
        };
        match new_value {
            Ok(new_value) => {
                if &new_value != value {
                    tracing::info!(header = %name, original = ?value, sanitized = ?new_value, "Header value sanitized");
                }
                sanitized.append(name.clone(), new_value);
            }
            Err(_) => {
                tracing::warn!(header = %name, original = ?value, "Header value dropped after sanitization");
            }
        }
    }
    sanitized
}
